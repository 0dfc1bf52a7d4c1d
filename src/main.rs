use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};

use crate::error::SubmitError;
use crate::request::params::JobParameters;
use crate::slurm::job::JobResources;
use crate::slurm::submit::{DryRun, Sbatch, Scheduler};
use crate::submitter::{Outcome, NO_DATA_MESSAGE};
use crate::workdir::WorkingDirectory;

mod error;
mod request;
mod slurm;
mod submitter;
mod workdir;

/// Submit a u_makemovie job for the dataset named by $DATA
///
/// INITIAL_FRAME, FRAME_PERIOD and FRAME_MAXIMUM (defaults 0, 1, 1000) are passed to the job
/// through its environment.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Args {
    /// Root holding data/<DATA>/out and sub/out
    #[arg(long, env = "MAKEMOVIE_BASE_DIR", default_value = ".")]
    base_dir: PathBuf,
    /// sbatch binary used to submit the job
    #[arg(long, env = "MAKEMOVIE_SBATCH", default_value = "sbatch")]
    sbatch: String,
    /// Movie binary the job runs
    #[arg(long, env = "MAKEMOVIE_EXECUTABLE", default_value = "_colmig_DPD_P_A_u_makemovie")]
    executable: String,
    /// SLURM partition
    #[arg(long, env = "MAKEMOVIE_PARTITION", default_value = "gpu")]
    partition: String,
    /// Generic resource request
    #[arg(long, env = "MAKEMOVIE_GRES", default_value = "gpu:k80:1")]
    gres: String,
    /// Prepare output and print the job instead of submitting it
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    process::exit(match run(args) {
        Ok(Outcome::NoData) => {
            println!("{NO_DATA_MESSAGE}");
            0
        }
        Ok(Outcome::Submitted(handle)) => {
            info!("{} queued with id {:?}", handle.name, handle.id);
            0
        }
        Err(err) => {
            eprintln!("makemovie: {err:#}");
            err.downcast_ref::<SubmitError>().map_or(1, SubmitError::exit_code)
        }
    });
}

fn run(args: Args) -> anyhow::Result<Outcome> {
    let params = JobParameters::from_env().context("can't read job parameters")?;

    let wd = WorkingDirectory { path: args.base_dir };
    let resources = JobResources {
        partition: args.partition,
        gres: args.gres,
        executable: args.executable,
        ..JobResources::default()
    };
    let scheduler: Box<dyn Scheduler> = if args.dry_run {
        Box::new(DryRun { program: args.sbatch })
    } else {
        Box::new(Sbatch { program: args.sbatch })
    };

    info!("Working directory {}", wd.path.display());
    submitter::submit(params, &wd, &resources, scheduler.as_ref()).map_err(|err| {
        warn!("Submission failed: {err}");
        anyhow::Error::new(err).context("can't submit movie job")
    })
}
