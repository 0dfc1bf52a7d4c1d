use std::collections::HashMap;
use std::env;
use std::ffi::OsString;

use log::info;

use crate::error::SubmitError;

pub const DATA: &str = "DATA";
pub const INITIAL_FRAME: &str = "INITIAL_FRAME";
pub const FRAME_PERIOD: &str = "FRAME_PERIOD";
pub const FRAME_MAXIMUM: &str = "FRAME_MAXIMUM";

/// Parameters of one movie job
///
/// Only `data` is required. The frame window falls back to the defaults below when the variable
/// is unset or empty, and is always exported into the job environment either way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobParameters {
    pub data: String,
    pub initial_frame: i64,
    pub frame_period: i64,
    pub frame_maximum: i64,
}

impl JobParameters {
    pub const DEFAULT_INITIAL_FRAME: i64 = 0;
    pub const DEFAULT_FRAME_PERIOD: i64 = 1;
    pub const DEFAULT_FRAME_MAXIMUM: i64 = 1000;

    /// Read parameters from the process environment
    ///
    /// A variable that is set but not valid Unicode is an error, never silently unset.
    pub fn from_env() -> Result<Option<JobParameters>, SubmitError> {
        let mut vars = HashMap::new();
        for key in [DATA, INITIAL_FRAME, FRAME_PERIOD, FRAME_MAXIMUM] {
            let value = unicode_value(key, env::var_os(key))?;
            // nothing else matters without a dataset name
            if key == DATA && value.as_deref().map_or(true, str::is_empty) {
                break;
            }
            if let Some(value) = value {
                vars.insert(key, value);
            }
        }
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Read parameters through `lookup`, returning `None` when no dataset name is set
    pub fn from_lookup<F>(lookup: F) -> Result<Option<JobParameters>, SubmitError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data = match non_empty(&lookup, DATA) {
            Some(data) => data,
            None => {
                info!("{DATA} is unset or empty");
                return Ok(None);
            }
        };

        let params = JobParameters {
            data,
            initial_frame: read_frame(&lookup, INITIAL_FRAME, Self::DEFAULT_INITIAL_FRAME)?,
            frame_period: read_frame(&lookup, FRAME_PERIOD, Self::DEFAULT_FRAME_PERIOD)?,
            frame_maximum: read_frame(&lookup, FRAME_MAXIMUM, Self::DEFAULT_FRAME_MAXIMUM)?,
        };
        info!("Job parameters: {:?}", &params);
        Ok(Some(params))
    }

    /// Scheduler job name, also the stem of every output file
    pub fn job_name(&self) -> String {
        format!("u_mov_{}", self.data)
    }

    /// Variables exported into the submitted job, in a fixed order
    pub fn environment(&self) -> Vec<(&'static str, String)> {
        vec![
            (DATA, self.data.clone()),
            (INITIAL_FRAME, self.initial_frame.to_string()),
            (FRAME_PERIOD, self.frame_period.to_string()),
            (FRAME_MAXIMUM, self.frame_maximum.to_string()),
        ]
    }
}

fn unicode_value(key: &'static str, value: Option<OsString>) -> Result<Option<String>, SubmitError> {
    match value {
        None => Ok(None),
        Some(value) => value
            .into_string()
            .map(Some)
            .map_err(|raw| SubmitError::NotUnicode { name: key, value: raw.to_string_lossy().into_owned() }),
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.is_empty())
}

fn read_frame<F>(lookup: &F, key: &'static str, default: i64) -> Result<i64, SubmitError>
where
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup, key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<i64>()
            .map_err(|_| SubmitError::InvalidFrame { name: key, value }),
    }
}
