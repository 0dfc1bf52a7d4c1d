//! Render movie job scripts and hand them to SLURM

/// Render the job script from templates and job parameters
pub mod job;

/// Submit rendered scripts with sbatch (or pretend to)
pub mod submit;
