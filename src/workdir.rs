use std::fs::{self, File};
use std::path::PathBuf;

use log::{info, warn};

use crate::error::SubmitError;
use crate::request::params::JobParameters;

/// Root under which dataset output and scheduler logs live
///
/// ```text
/// <path>/data/<DATA>/out/u_mov_<DATA>.out   job output, appended to by the movie binary
/// <path>/sub/out/u_mov_<DATA>.<jobid>.out   written by the scheduler itself
/// ```
#[derive(Debug, Clone)]
pub struct WorkingDirectory {
    pub path: PathBuf,
}

/// Output locations of one dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub dir: PathBuf,
    pub file: PathBuf,
    /// Contains a literal `%j`, substituted by the scheduler with the job id
    pub scheduler_output: PathBuf,
}

impl WorkingDirectory {
    pub fn output_paths(&self, params: &JobParameters) -> OutputPaths {
        let name = params.job_name();
        let dir = self.path.join("data").join(&params.data).join("out");
        let file = dir.join(format!("{name}.out"));
        let scheduler_output = self.path.join("sub").join("out").join(format!("{name}.%j.out"));
        OutputPaths { dir, file, scheduler_output }
    }
}

impl OutputPaths {
    /// Create the output directory and leave an empty output file in it
    ///
    /// Safe to repeat: an existing directory is kept and an existing file is cut back to zero.
    pub fn prepare(&self) -> Result<(), SubmitError> {
        info!("Creating output directory {}", self.dir.display());
        fs::create_dir_all(&self.dir).map_err(|source| {
            warn!("Can't create output directory {}: {}", self.dir.display(), source);
            SubmitError::CreateOutputDir { path: self.dir.clone(), source }
        })?;

        info!("Truncating output file {}", self.file.display());
        File::create(&self.file).map_err(|source| {
            warn!("Can't truncate output file {}: {}", self.file.display(), source);
            SubmitError::TruncateOutput { path: self.file.clone(), source }
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::tempdir;

    use super::*;

    fn params(data: &str) -> JobParameters {
        JobParameters {
            data: data.to_string(),
            initial_frame: 0,
            frame_period: 1,
            frame_maximum: 1000,
        }
    }

    #[test]
    fn paths_follow_dataset_name() {
        let wd = WorkingDirectory { path: PathBuf::from("/scratch/movies") };
        let paths = wd.output_paths(&params("X"));
        assert_eq!(paths.dir, Path::new("/scratch/movies/data/X/out"));
        assert_eq!(paths.file, Path::new("/scratch/movies/data/X/out/u_mov_X.out"));
        assert_eq!(paths.scheduler_output, Path::new("/scratch/movies/sub/out/u_mov_X.%j.out"));
    }

    #[test]
    fn prepare_creates_missing_parents() {
        let tmp = tempdir().unwrap();
        let wd = WorkingDirectory { path: tmp.path().join("nested") };
        let paths = wd.output_paths(&params("X"));

        paths.prepare().unwrap();

        assert!(paths.dir.is_dir());
        assert_eq!(fs::metadata(&paths.file).unwrap().len(), 0);
    }

    #[test]
    fn prepare_is_repeatable_and_truncates() {
        let tmp = tempdir().unwrap();
        let wd = WorkingDirectory { path: tmp.path().to_path_buf() };
        let paths = wd.output_paths(&params("X"));

        paths.prepare().unwrap();
        fs::write(&paths.file, "frame 1\nframe 2\n").unwrap();
        paths.prepare().unwrap();

        assert_eq!(fs::read_to_string(&paths.file).unwrap(), "");
    }

    #[test]
    fn prepare_fails_when_base_is_a_file() {
        let tmp = tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        let wd = WorkingDirectory { path: blocker };

        let err = wd.output_paths(&params("X")).prepare().unwrap_err();
        assert!(matches!(err, SubmitError::CreateOutputDir { .. }));
        assert_eq!(err.exit_code(), 1);
    }
}
