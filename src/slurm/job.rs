use chrono::Utc;
use log::info;
use serde::Serialize;
use tinytemplate::{format_unescaped, TinyTemplate};

use crate::error::SubmitError;
use crate::request::params::JobParameters;
use crate::workdir::OutputPaths;

/// Scheduler resources and the program a movie job runs
///
/// The defaults are what every movie job has always asked for: one k80 on the gpu partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResources {
    pub partition: String,
    pub gres: String,
    pub ntasks_per_node: u32,
    pub executable: String,
}

impl Default for JobResources {
    fn default() -> Self {
        JobResources {
            partition: "gpu".to_string(),
            gres: "gpu:k80:1".to_string(),
            ntasks_per_node: 1,
            executable: "_colmig_DPD_P_A_u_makemovie".to_string(),
        }
    }
}

/// A rendered job script, fed to sbatch on stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobScript {
    pub name: String,
    pub body: String,
}

impl JobScript {
    pub fn render(
        params: &JobParameters,
        paths: &OutputPaths,
        resources: &JobResources,
    ) -> Result<JobScript, SubmitError> {
        let name = params.job_name();
        info!("Rendering job script {}", &name);

        let header = render_header(&name, paths, resources)?;
        let command = render_command(paths, resources)?;
        let job = JobTemplate { header, command };

        Ok(JobScript { name, body: job.join() })
    }
}

/// All rendered sections of a job script
struct JobTemplate {
    header: Header,
    command: Command,
}

impl JobTemplate {
    fn join(self) -> String {
        // order is important, sbatch stops reading directives at the first command
        [self.header.content, self.command.content].concat()
    }
}

/// Rendered SBATCH header
///
/// Directives sbatch reads [before executable commands](https://slurm.schedmd.com/sbatch.html#SECTION_DESCRIPTION):
/// - partition
/// - generic resource (the GPU)
/// - tasks per node
/// - scheduler output file, with `%j` left for sbatch to fill in
struct Header {
    content: String,
}

/// Rendered movie command, appending to the dataset output file
struct Command {
    content: String,
}

/// Rendering context for header
#[derive(Serialize)]
struct HeaderContext {
    job_name: String,
    partition: String,
    gres: String,
    ntasks_per_node: u32,
    scheduler_output: String,
    time_now: String,
}

/// Rendering context for command
#[derive(Serialize)]
struct CommandContext {
    executable: String,
    output_file: String,
}

/// Paths go into a shell script, not HTML
fn templates() -> TinyTemplate<'static> {
    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);
    tt
}

/// Render the SBATCH header using TinyTemplate
fn render_header(name: &str, paths: &OutputPaths, resources: &JobResources) -> Result<Header, SubmitError> {
    /// included header template
    static HEADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/header.txt"));
    let mut tt = templates();
    tt.add_template("header", HEADER)?;

    let context = HeaderContext {
        job_name: name.to_string(),
        partition: resources.partition.clone(),
        gres: resources.gres.clone(),
        ntasks_per_node: resources.ntasks_per_node,
        scheduler_output: directive_quote(&paths.scheduler_output.display().to_string()),
        time_now: Utc::now().to_string(),
    };

    Ok(Header { content: tt.render("header", &context)? })
}

/// Render the movie command using TinyTemplate
fn render_command(paths: &OutputPaths, resources: &JobResources) -> Result<Command, SubmitError> {
    /// included command template
    static COMMAND: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/command.txt"));
    let mut tt = templates();
    tt.add_template("command", COMMAND)?;

    let context = CommandContext {
        executable: resources.executable.clone(),
        output_file: shell_quote(&paths.file.display().to_string()),
    };

    Ok(Command { content: tt.render("command", &context)? })
}

/// Characters that never need quoting in a shell word or an sbatch directive
fn is_plain(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+,:=@%".contains(c))
}

/// Quote `value` as a single POSIX shell word
fn shell_quote(value: &str) -> String {
    if is_plain(value) {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Quote an `#SBATCH` option value; sbatch splits directives on whitespace but honours double quotes
fn directive_quote(value: &str) -> String {
    if is_plain(value) {
        return value.to_string();
    }
    format!("\"{value}\"")
}
