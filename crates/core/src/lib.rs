//! Domain model and collaborator seams for flowgen.
//!
//! Holds the job record and its lifecycle states, the artifact types that
//! flow from UI discovery into durable storage, and the traits behind which
//! the browser automation ([`driver::UiDriver`]) and object storage
//! ([`store::DurableStore`]) live.

pub mod artifact;
pub mod driver;
pub mod error;
pub mod job;
pub mod store;
pub mod types;
