//! Poll-based completion detection.
//!
//! The remote page has no completion event. [`ProgressMonitor::run`] polls an
//! ordered list of [`ProbeStrategy`]s at a fixed interval until one reports
//! the completion marker, enough artifacts show up on the page, or the
//! deadline passes.

use std::sync::LazyLock;
use std::time::Duration;

use flowgen_core::driver::{ProbeStrategy, UiDriver};
use flowgen_events::ProgressReporter;
use regex::Regex;
use tokio::time::Instant;

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{1,3}(?:\.\d+)?\s*%").expect("valid regex"));

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    /// Total time budget for one `run`.
    pub deadline: Duration,
    /// Wait after the completion marker so trailing media can render.
    pub completion_grace: Duration,
    pub completion_marker: String,
    /// Artifact count that counts as complete when no percentage is shown.
    pub min_artifacts: usize,
    /// Probed in order; the first one with a percentage wins the tick.
    pub strategies: Vec<ProbeStrategy>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            deadline: Duration::from_secs(300),
            completion_grace: Duration::from_secs(3),
            completion_marker: "100%".to_string(),
            min_artifacts: 2,
            strategies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorOutcome {
    Complete,
    TimedOut,
}

impl MonitorOutcome {
    pub fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }
}

pub struct ProgressMonitor {
    config: MonitorConfig,
}

impl ProgressMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub async fn run(&self, driver: &dyn UiDriver, reporter: &ProgressReporter) -> MonitorOutcome {
        let job_id = reporter.job_id();
        let started = Instant::now();
        let mut ticks: u32 = 0;

        loop {
            if started.elapsed() >= self.config.deadline {
                tracing::warn!(%job_id, ticks, "Progress monitoring deadline reached");
                reporter.report(format!(
                    "Progress monitoring timed out after {} seconds",
                    self.config.deadline.as_secs()
                ));
                return MonitorOutcome::TimedOut;
            }
            ticks += 1;

            match self.probe(driver).await {
                Some((strategy, text)) => {
                    tracing::debug!(%job_id, strategy, progress = %text, "Progress probe matched");
                    reporter.report(format!("Video generation progress: {text}"));

                    if text.contains(&self.config.completion_marker) {
                        reporter.report("Video generation complete!");
                        tokio::time::sleep(self.config.completion_grace).await;
                        return MonitorOutcome::Complete;
                    }
                }
                None => {
                    let count = match driver.discover_artifacts().await {
                        Ok(refs) => refs.len(),
                        Err(e) => {
                            tracing::debug!(%job_id, error = %e, "Artifact count failed");
                            0
                        }
                    };
                    if count >= self.config.min_artifacts {
                        tracing::info!(%job_id, count, "Artifacts present without progress text");
                        reporter.report("Videos appear to be ready!");
                        return MonitorOutcome::Complete;
                    }
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// First strategy yielding a percentage this tick, with that text.
    async fn probe(&self, driver: &dyn UiDriver) -> Option<(&str, String)> {
        for strategy in &self.config.strategies {
            let texts = match driver.query_progress_probe(strategy).await {
                Ok(texts) => texts,
                Err(e) => {
                    tracing::trace!(strategy = %strategy.name, error = %e, "Probe failed");
                    continue;
                }
            };
            if let Some(found) = texts.iter().find_map(|t| percentage(t)) {
                return Some((strategy.name.as_str(), found));
            }
        }
        None
    }
}

/// The percentage figure inside `text`, if any, with inner spacing removed
/// (`"100 %"` becomes `"100%"`).
fn percentage(text: &str) -> Option<String> {
    PERCENT_RE
        .find(text)
        .map(|m| m.as_str().chars().filter(|c| !c.is_whitespace()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_extracts_the_figure() {
        assert_eq!(percentage("Generating 55%").as_deref(), Some("55%"));
        assert_eq!(percentage("12.5 %").as_deref(), Some("12.5%"));
        assert_eq!(percentage("Done: 100 %").as_deref(), Some("100%"));
        assert_eq!(percentage("100%").as_deref(), Some("100%"));
        assert_eq!(percentage("Rendering"), None);
        assert_eq!(percentage(""), None);
    }

    #[test]
    fn defaults_match_the_polling_protocol() {
        let config = MonitorConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.deadline, Duration::from_secs(300));
        assert_eq!(config.completion_grace, Duration::from_secs(3));
        assert_eq!(config.min_artifacts, 2);
        assert!(MonitorOutcome::Complete.is_complete());
        assert!(!MonitorOutcome::TimedOut.is_complete());
    }
}
