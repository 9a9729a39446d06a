//! Artifacts: media discovered in the remote UI and their durable copies.
//!
//! An [`ArtifactReference`] is what the driver finds on the page (an
//! ephemeral URL plus an optional poster). An [`Artifact`] is what the
//! pipeline produces after copying the bytes into durable storage.

use serde::{Deserialize, Serialize};

use crate::types::JobId;

/// Content type for every ingested video.
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Content type for images whose header does not identify them as PNG.
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Content type for PNG images.
pub const PNG_CONTENT_TYPE: &str = "image/png";

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// Media class of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Video,
    Image,
}

impl ArtifactKind {
    /// Prefix used in the durable key (`video_1.mp4`, `image_2.jpg`).
    pub fn label(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Image => "image",
        }
    }
}

// ---------------------------------------------------------------------------
// Reference (ephemeral)
// ---------------------------------------------------------------------------

/// A generated item as found in the UI.
///
/// `sequence_index` is 1-based and assigned in discovery order. The poster,
/// when present, is ingested as an image with the same index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReference {
    pub source_url: String,
    pub poster_url: Option<String>,
    pub kind: ArtifactKind,
    pub sequence_index: u32,
}

impl ArtifactReference {
    pub fn video(index: u32, source_url: impl Into<String>, poster_url: Option<String>) -> Self {
        Self {
            source_url: source_url.into(),
            poster_url,
            kind: ArtifactKind::Video,
            sequence_index: index,
        }
    }
}

// ---------------------------------------------------------------------------
// Artifact (durable)
// ---------------------------------------------------------------------------

/// A durable copy of a generated item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Publicly resolvable URL returned by the store.
    pub durable_url: String,
    /// Object key inside the store.
    pub key: String,
    pub kind: ArtifactKind,
    pub sequence_index: u32,
}

/// Build the durable key `<namespace>/<job_id>/<kind>_<index>.<ext>`.
///
/// Keys are unique per `(job_id, kind, index)`, which keeps two artifacts of
/// the same job from colliding.
pub fn artifact_key(
    namespace: &str,
    job_id: JobId,
    kind: ArtifactKind,
    index: u32,
    extension: &str,
) -> String {
    let namespace = namespace.trim_matches('/');
    if namespace.is_empty() {
        format!("{job_id}/{}_{index}.{extension}", kind.label())
    } else {
        format!("{namespace}/{job_id}/{}_{index}.{extension}", kind.label())
    }
}
