//! Copying discovered media into the durable store.
//!
//! Every reference (and every poster) is ingested independently and
//! concurrently. A failed download or upload loses that one item; the batch
//! still returns whatever made it. Only a failure to enumerate the
//! references at all is an error.

use std::sync::Arc;

use flowgen_core::artifact::{
    artifact_key, Artifact, ArtifactKind, ArtifactReference, JPEG_CONTENT_TYPE, PNG_CONTENT_TYPE,
    VIDEO_CONTENT_TYPE,
};
use flowgen_core::driver::UiDriver;
use flowgen_core::store::{DurableStore, StoreError};
use flowgen_core::types::JobId;
use futures::future::join_all;
use image::ImageFormat;

use crate::error::IngestError;
use crate::fetch::{ArtifactFetcher, FetchError};

/// What one ingest pass stored, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub videos: Vec<Artifact>,
    pub images: Vec<Artifact>,
    /// Items that were discovered but could not be stored.
    pub failed: usize,
}

impl IngestReport {
    pub fn is_empty(&self) -> bool {
        self.videos.is_empty() && self.images.is_empty()
    }

    /// Items found on the page, stored or not.
    pub fn discovered(&self) -> usize {
        self.videos.len() + self.images.len() + self.failed
    }

    pub fn video_urls(&self) -> Vec<String> {
        self.videos.iter().map(|a| a.durable_url.clone()).collect()
    }

    pub fn image_urls(&self) -> Vec<String> {
        self.images.iter().map(|a| a.durable_url.clone()).collect()
    }
}

#[derive(Debug, thiserror::Error)]
enum ItemError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One downloadable item: a video source or a poster image.
struct Item<'a> {
    kind: ArtifactKind,
    index: u32,
    url: &'a str,
}

pub struct ArtifactPipeline {
    store: Arc<dyn DurableStore>,
    fetcher: Arc<dyn ArtifactFetcher>,
    namespace: String,
}

impl ArtifactPipeline {
    pub fn new(
        store: Arc<dyn DurableStore>,
        fetcher: Arc<dyn ArtifactFetcher>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            store,
            fetcher,
            namespace: namespace.into(),
        }
    }

    /// Discover references on the page and ingest them.
    pub async fn ingest_from(
        &self,
        driver: &dyn UiDriver,
        job_id: JobId,
    ) -> Result<IngestReport, IngestError> {
        let references = driver.discover_artifacts().await?;
        tracing::info!(%job_id, count = references.len(), "Artifacts discovered");
        Ok(self.ingest(job_id, &references).await)
    }

    pub async fn ingest(&self, job_id: JobId, references: &[ArtifactReference]) -> IngestReport {
        let items: Vec<Item<'_>> = references
            .iter()
            .flat_map(|r| {
                let source = Item {
                    kind: r.kind,
                    index: r.sequence_index,
                    url: r.source_url.as_str(),
                };
                let poster = r.poster_url.as_deref().map(|url| Item {
                    kind: ArtifactKind::Image,
                    index: r.sequence_index,
                    url,
                });
                std::iter::once(source).chain(poster)
            })
            .collect();

        let results = join_all(items.iter().map(|item| self.ingest_item(job_id, item))).await;

        let mut report = IngestReport::default();
        for (item, result) in items.iter().zip(results) {
            match result {
                Ok(artifact) => match artifact.kind {
                    ArtifactKind::Video => report.videos.push(artifact),
                    ArtifactKind::Image => report.images.push(artifact),
                },
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        %job_id,
                        kind = item.kind.label(),
                        index = item.index,
                        url = item.url,
                        error = %e,
                        "Artifact dropped"
                    );
                }
            }
        }

        tracing::info!(
            %job_id,
            videos = report.videos.len(),
            images = report.images.len(),
            failed = report.failed,
            "Artifact ingestion finished"
        );
        report
    }

    /// Best-effort removal of stored artifacts. Returns how many were removed.
    pub async fn delete_artifacts(&self, artifacts: &[Artifact]) -> usize {
        let mut removed = 0;
        for artifact in artifacts {
            match self.store.delete(&artifact.key).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(key = %artifact.key, error = %e, "Artifact delete failed"),
            }
        }
        removed
    }

    async fn ingest_item(&self, job_id: JobId, item: &Item<'_>) -> Result<Artifact, ItemError> {
        let bytes = self.fetcher.fetch(item.url).await?;
        let (content_type, extension) = classify(item.kind, &bytes);
        let key = artifact_key(&self.namespace, job_id, item.kind, item.index, extension);

        tracing::debug!(%job_id, %key, size = bytes.len(), "Uploading artifact");
        let durable_url = self.store.put(&key, bytes, content_type).await?;

        Ok(Artifact {
            durable_url,
            key,
            kind: item.kind,
            sequence_index: item.index,
        })
    }
}

/// Content type and file extension for an item's bytes.
fn classify(kind: ArtifactKind, bytes: &[u8]) -> (&'static str, &'static str) {
    match kind {
        ArtifactKind::Video => (VIDEO_CONTENT_TYPE, "mp4"),
        ArtifactKind::Image => match image::guess_format(bytes) {
            Ok(ImageFormat::Png) => (PNG_CONTENT_TYPE, "png"),
            _ => (JPEG_CONTENT_TYPE, "jpg"),
        },
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use flowgen_core::driver::{DriverError, LaunchOptions, UiDriverFactory};
    use flowgen_driver::scripted::{Script, ScriptedFactory};
    use flowgen_storage::MemoryStore;

    use super::*;
    use crate::fetch::StaticFetcher;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];

    fn reference(index: u32) -> ArtifactReference {
        ArtifactReference::video(
            index,
            format!("https://cdn/v{index}.mp4"),
            Some(format!("https://cdn/p{index}.jpg")),
        )
    }

    fn pipeline(fetcher: StaticFetcher) -> (ArtifactPipeline, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let pipeline = ArtifactPipeline::new(store.clone(), Arc::new(fetcher), "videos");
        (pipeline, store)
    }

    #[tokio::test]
    async fn poster_failure_drops_only_that_item() {
        // Poster #2 is not downloadable.
        let fetcher = StaticFetcher::new()
            .with("https://cdn/v1.mp4", b"v1".to_vec())
            .with("https://cdn/v2.mp4", b"v2".to_vec())
            .with("https://cdn/p1.jpg", JPEG_HEADER.to_vec());
        let (pipeline, store) = pipeline(fetcher);
        let job_id = JobId::new_v4();

        let report = pipeline.ingest(job_id, &[reference(1), reference(2)]).await;

        assert_eq!(report.videos.len(), 2);
        assert_eq!(report.videos[0].sequence_index, 1);
        assert_eq!(report.videos[1].sequence_index, 2);
        assert_eq!(report.images.len(), 1);
        assert_eq!(report.images[0].sequence_index, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(
            report.video_urls(),
            [
                format!("memory://videos/{job_id}/video_1.mp4"),
                format!("memory://videos/{job_id}/video_2.mp4"),
            ]
        );

        let video = store
            .get(&format!("videos/{job_id}/video_1.mp4"))
            .await
            .unwrap();
        assert_eq!(video.content_type, "video/mp4");
        assert_eq!(store.len().await, 3);
    }

    #[tokio::test]
    async fn upload_failure_drops_only_that_item() {
        let fetcher = StaticFetcher::new()
            .with("https://cdn/v1.mp4", b"v1".to_vec())
            .with("https://cdn/p1.jpg", JPEG_HEADER.to_vec());
        let (pipeline, store) = pipeline(fetcher);
        store.fail_uploads_ending_with("video_1.mp4").await;

        let report = pipeline.ingest(JobId::new_v4(), &[reference(1)]).await;

        assert!(report.videos.is_empty());
        assert_eq!(report.images.len(), 1);
        assert!(!report.is_empty());
    }

    #[tokio::test]
    async fn png_posters_are_sniffed() {
        let fetcher = StaticFetcher::new()
            .with("https://cdn/v1.mp4", b"v1".to_vec())
            .with("https://cdn/p1.jpg", PNG_HEADER.to_vec());
        let (pipeline, store) = pipeline(fetcher);
        let job_id = JobId::new_v4();

        let report = pipeline.ingest(job_id, &[reference(1)]).await;

        let image = &report.images[0];
        assert_eq!(image.key, format!("videos/{job_id}/image_1.png"));
        assert_eq!(store.get(&image.key).await.unwrap().content_type, "image/png");
    }

    #[test]
    fn unknown_image_bytes_default_to_jpeg() {
        assert_eq!(classify(ArtifactKind::Image, b"garbage"), ("image/jpeg", "jpg"));
        assert_eq!(classify(ArtifactKind::Image, JPEG_HEADER), ("image/jpeg", "jpg"));
        assert_eq!(classify(ArtifactKind::Video, PNG_HEADER), ("video/mp4", "mp4"));
    }

    #[tokio::test]
    async fn nothing_discovered_is_an_empty_report() {
        let (pipeline, _) = pipeline(StaticFetcher::new());
        let report = pipeline.ingest(JobId::new_v4(), &[]).await;
        assert!(report.is_empty());
        assert_eq!(report.failed, 0);
    }

    #[tokio::test]
    async fn discovery_failure_is_an_error() {
        let (pipeline, _) = pipeline(StaticFetcher::new());
        let driver = ScriptedFactory::new(Script::new().fail_discovery())
            .launch(JobId::nil(), &LaunchOptions::default())
            .await
            .unwrap();

        assert_matches!(
            pipeline.ingest_from(driver.as_ref(), JobId::nil()).await,
            Err(IngestError::Discovery(DriverError::Command { status: 500, .. }))
        );
    }

    #[tokio::test]
    async fn delete_artifacts_removes_stored_objects() {
        let fetcher = StaticFetcher::new()
            .with("https://cdn/v1.mp4", b"v1".to_vec())
            .with("https://cdn/p1.jpg", JPEG_HEADER.to_vec());
        let (pipeline, store) = pipeline(fetcher);
        let report = pipeline.ingest(JobId::new_v4(), &[reference(1)]).await;

        let all: Vec<Artifact> = report.videos.into_iter().chain(report.images).collect();
        assert_eq!(pipeline.delete_artifacts(&all).await, 2);
        assert!(store.is_empty().await);
    }
}
