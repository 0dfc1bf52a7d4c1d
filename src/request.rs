//! Read job parameters from the submitting environment

/// DATA and the frame window forwarded to the movie job
pub mod params;
