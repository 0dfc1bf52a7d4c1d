use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop a submission after a dataset name was given
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("{name} must be an integer, got {value:?}")]
    InvalidFrame { name: &'static str, value: String },

    #[error("{name} is not valid Unicode: {value:?}")]
    NotUnicode { name: &'static str, value: String },

    #[error("can't create output directory {}", path.display())]
    CreateOutputDir { path: PathBuf, source: io::Error },

    #[error("can't truncate output file {}", path.display())]
    TruncateOutput { path: PathBuf, source: io::Error },

    #[error("can't render job script: {0}")]
    Render(#[from] tinytemplate::error::Error),

    #[error("can't run scheduler {program}")]
    Spawn { program: String, source: io::Error },

    /// The scheduler ran but refused the job; its own stderr already reached the user
    #[error("scheduler rejected job {job_name} ({})", describe_status(*code))]
    Rejected { job_name: String, code: Option<i32> },
}

impl SubmitError {
    /// Exit status the process should finish with
    ///
    /// A rejection passes the scheduler's own code through so callers see what sbatch said.
    pub fn exit_code(&self) -> i32 {
        match self {
            SubmitError::InvalidFrame { .. } | SubmitError::NotUnicode { .. } => 2,
            SubmitError::Rejected { code: Some(code), .. } => *code,
            _ => 1,
        }
    }
}

fn describe_status(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}
