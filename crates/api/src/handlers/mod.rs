pub mod cookies;
pub mod generation;
pub mod jobs;
