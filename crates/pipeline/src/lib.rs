//! Job orchestration and artifact ingestion.
//!
//! Components, leaf first:
//!
//! - [`registry::JobRegistry`]: the authoritative, concurrency-safe job store.
//! - [`resources::ResourceManager`]: one automation session per job, always
//!   released.
//! - [`monitor::ProgressMonitor`]: bounded polling that decides completion.
//! - [`ingest::ArtifactPipeline`]: copies discovered media into the durable
//!   store, tolerating per-item loss.
//! - [`orchestrator::JobOrchestrator`]: runs the whole lifecycle for a job
//!   as a background task.

pub mod error;
pub mod fetch;
pub mod ingest;
pub mod monitor;
pub mod orchestrator;
pub mod registry;
pub mod resources;

pub use error::{JobError, RegistryError, ResourceError};
pub use ingest::{ArtifactPipeline, IngestReport};
pub use monitor::{MonitorConfig, MonitorOutcome, ProgressMonitor};
pub use orchestrator::{AuthPolicy, GenerationRequest, JobOrchestrator, OrchestratorConfig};
pub use registry::JobRegistry;
pub use resources::{ResourceHandle, ResourceManager};
