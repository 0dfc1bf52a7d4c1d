//! The submission pipeline
//!
//! Read parameters, prepare the dataset output, render the job script, submit it. Each step runs
//! once and the first failure ends the run.

use log::info;

use crate::error::SubmitError;
use crate::request::params::JobParameters;
use crate::slurm::job::{JobResources, JobScript};
use crate::slurm::submit::{JobHandle, Scheduler};
use crate::workdir::WorkingDirectory;

pub const NO_DATA_MESSAGE: &str = "No data name submitted.";

/// How a run ended without error
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// DATA was unset or empty, nothing was touched
    NoData,
    Submitted(JobHandle),
}

pub fn submit(
    params: Option<JobParameters>,
    wd: &WorkingDirectory,
    resources: &JobResources,
    scheduler: &dyn Scheduler,
) -> Result<Outcome, SubmitError> {
    let params = match params {
        Some(params) => params,
        None => return Ok(Outcome::NoData),
    };

    let paths = wd.output_paths(&params);
    paths.prepare()?;

    let script = JobScript::render(&params, &paths, resources)?;
    let handle = scheduler.submit(&script, &params.environment())?;
    info!("Submitted {}", &handle.name);

    Ok(Outcome::Submitted(handle))
}
