use std::io::{self, Write};
use std::process::{Command, Stdio};

use log::{info, warn};

use crate::error::SubmitError;
use crate::slurm::job::JobScript;

/// A job the scheduler accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub name: String,
    /// `None` when the acknowledgement wasn't the usual `Submitted batch job <id>`
    pub id: Option<u64>,
}

/// Something that can queue a job script
pub trait Scheduler {
    /// Queue `script` with `env` set in the job's environment
    fn submit(&self, script: &JobScript, env: &[(&'static str, String)]) -> Result<JobHandle, SubmitError>;
}

/// Submit through the sbatch command line
///
/// The script goes to sbatch on stdin. sbatch exports the submitting environment by default, so
/// the job variables are set on the sbatch process itself.
pub struct Sbatch {
    pub program: String,
}

impl Scheduler for Sbatch {
    fn submit(&self, script: &JobScript, env: &[(&'static str, String)]) -> Result<JobHandle, SubmitError> {
        let spawn_error = |source: io::Error| {
            warn!("Can't run {}: {}", &self.program, source);
            SubmitError::Spawn { program: self.program.clone(), source }
        };

        let mut sbatch = Command::new(&self.program);
        let cmd = sbatch
            .arg(format!("--job-name={}", &script.name))
            .envs(env.iter().map(|(k, v)| (*k, v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        info!("Running sbatch process");
        info!("{:?}", &cmd);

        let mut child = cmd.spawn().map_err(spawn_error)?;
        // sbatch may exit without reading the script; its status wins over a broken pipe
        let written = match child.stdin.take() {
            // dropping stdin closes the pipe so sbatch sees the end of the script
            Some(mut stdin) => stdin.write_all(script.body.as_bytes()),
            None => Ok(()),
        };
        let output = child.wait_with_output().map_err(spawn_error)?;

        let acknowledgement = String::from_utf8_lossy(&output.stdout);
        print!("{acknowledgement}");

        if !output.status.success() {
            warn!("sbatch exited with {}", output.status);
            return Err(SubmitError::Rejected { job_name: script.name.clone(), code: output.status.code() });
        }
        written.map_err(spawn_error)?;

        let id = parse_job_id(&acknowledgement);
        match id {
            Some(id) => info!("SLURM job id: {id}"),
            None => warn!("Can't find a job id in sbatch output {:?}", acknowledgement.trim()),
        }
        Ok(JobHandle { name: script.name.clone(), id })
    }
}

/// Print what would be submitted instead of submitting it
pub struct DryRun {
    pub program: String,
}

impl Scheduler for DryRun {
    fn submit(&self, script: &JobScript, env: &[(&'static str, String)]) -> Result<JobHandle, SubmitError> {
        info!("--dry-run set, not submitting {}", &script.name);
        let vars: Vec<String> = env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        println!("{} {} --job-name={} <<EOF", vars.join(" "), &self.program, &script.name);
        print!("{}", &script.body);
        println!("EOF");
        Ok(JobHandle { name: script.name.clone(), id: None })
    }
}

/// Read the job id out of sbatch's `Submitted batch job <id>` line
///
/// `--parsable` output (`<id>` or `<id>;<cluster>`) is accepted too.
pub fn parse_job_id(output: &str) -> Option<u64> {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty())?;
    let marker = "job ";
    let id = match line.find(marker) {
        Some(idx) => &line[idx + marker.len()..],
        None => line.split(';').next()?,
    };
    id.trim().parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_from_acknowledgement() {
        assert_eq!(parse_job_id("Submitted batch job 4242\n"), Some(4242));
    }

    #[test]
    fn job_id_from_parsable_output() {
        assert_eq!(parse_job_id("4242\n"), Some(4242));
        assert_eq!(parse_job_id("4242;cluster\n"), Some(4242));
    }

    #[test]
    fn no_job_id_in_noise() {
        assert_eq!(parse_job_id(""), None);
        assert_eq!(parse_job_id("sbatch: queued and waiting"), None);
    }

    #[test]
    fn dry_run_never_has_an_id() {
        let script = JobScript { name: "u_mov_X".to_string(), body: "#!/bin/bash\n".to_string() };
        let scheduler = DryRun { program: "sbatch".to_string() };
        let handle = scheduler.submit(&script, &[("DATA", "X".to_string())]).unwrap();
        assert_eq!(handle, JobHandle { name: "u_mov_X".to_string(), id: None });
    }

    #[cfg(unix)]
    mod process {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;

        use tempfile::tempdir;

        use super::*;

        /// Write an executable shell script standing in for sbatch
        fn fake_sbatch(dir: &Path, body: &str) -> String {
            let path = dir.join("sbatch");
            fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path.display().to_string()
        }

        fn script() -> JobScript {
            JobScript { name: "u_mov_X".to_string(), body: "#!/bin/bash\necho movie\n".to_string() }
        }

        #[test]
        fn script_and_environment_reach_sbatch() {
            let tmp = tempdir().unwrap();
            let seen = tmp.path().join("seen");
            let program = fake_sbatch(
                tmp.path(),
                &format!(
                    "cat > {seen}.body\nprintf '%s %s %s\\n' \"$1\" \"$DATA\" \"$FRAME_PERIOD\" > {seen}.args\necho 'Submitted batch job 17'\n",
                    seen = seen.display()
                ),
            );

            let env = vec![("DATA", "X".to_string()), ("FRAME_PERIOD", "5".to_string())];
            let handle = Sbatch { program }.submit(&script(), &env).unwrap();

            assert_eq!(handle.id, Some(17));
            let body = fs::read_to_string(tmp.path().join("seen.body")).unwrap();
            assert_eq!(body, "#!/bin/bash\necho movie\n");
            let args = fs::read_to_string(tmp.path().join("seen.args")).unwrap();
            assert_eq!(args, "--job-name=u_mov_X X 5\n");
        }

        #[test]
        fn rejection_keeps_exit_status() {
            let tmp = tempdir().unwrap();
            let program = fake_sbatch(tmp.path(), "cat > /dev/null\necho 'sbatch: error: invalid partition' >&2\nexit 3\n");

            let err = Sbatch { program }.submit(&script(), &[]).unwrap_err();
            assert!(matches!(err, SubmitError::Rejected { code: Some(3), .. }));
            assert_eq!(err.exit_code(), 3);
        }

        #[test]
        fn early_exit_keeps_exit_status() {
            let tmp = tempdir().unwrap();
            let program = fake_sbatch(tmp.path(), "exit 3\n");
            // larger than a pipe buffer, so the write can't finish before sbatch is gone
            let script = JobScript { name: "u_mov_X".to_string(), body: "# frame\n".repeat(64 * 1024) };

            let err = Sbatch { program }.submit(&script, &[]).unwrap_err();
            assert!(matches!(err, SubmitError::Rejected { code: Some(3), .. }));
            assert_eq!(err.exit_code(), 3);
        }

        #[test]
        fn missing_binary_is_a_spawn_error() {
            let tmp = tempdir().unwrap();
            let program = tmp.path().join("no-sbatch-here").display().to_string();

            let err = Sbatch { program }.submit(&script(), &[]).unwrap_err();
            assert!(matches!(err, SubmitError::Spawn { .. }));
            assert_eq!(err.exit_code(), 1);
        }
    }
}
