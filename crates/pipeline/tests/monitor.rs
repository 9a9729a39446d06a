//! Progress monitor behaviour against scripted probe sequences.
//!
//! All tests run on a paused clock, so the real polling intervals cost
//! nothing and elapsed time can be asserted exactly.

use std::time::Duration;

use flowgen_core::driver::{LaunchOptions, UiDriver, UiDriverFactory};
use flowgen_core::types::JobId;
use flowgen_driver::scripted::{Script, ScriptedFactory};
use flowgen_driver::selectors::default_probe_strategies;
use flowgen_events::progress_channel;
use flowgen_pipeline::{MonitorConfig, MonitorOutcome, ProgressMonitor};
use tokio::time::Instant;

async fn driver(script: Script) -> Box<dyn UiDriver> {
    ScriptedFactory::new(script)
        .launch(JobId::nil(), &LaunchOptions::default())
        .await
        .unwrap()
}

fn monitor(deadline: Duration) -> ProgressMonitor {
    ProgressMonitor::new(MonitorConfig {
        deadline,
        strategies: default_probe_strategies(),
        ..MonitorConfig::default()
    })
}

/// Run the monitor and return its outcome, the virtual time it took and
/// every progress line it reported.
async fn run(monitor: &ProgressMonitor, driver: &dyn UiDriver) -> (MonitorOutcome, Duration, Vec<String>) {
    let (reporter, mut rx) = progress_channel(JobId::nil());
    let started = Instant::now();
    let outcome = monitor.run(driver, &reporter).await;
    let elapsed = started.elapsed();
    drop(reporter);

    let mut lines = Vec::new();
    while let Some(line) = rx.recv().await {
        lines.push(line);
    }
    (outcome, elapsed, lines)
}

// ---------------------------------------------------------------------------
// Test: Percentage sequence ends in completion after the grace period
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn hundred_percent_completes_after_grace() {
    let driver = driver(
        Script::new().probe("percentage_label", &[&["10%"], &["55%"], &["100%"]]),
    )
    .await;

    let (outcome, elapsed, lines) = run(&monitor(Duration::from_secs(300)), driver.as_ref()).await;

    assert_eq!(outcome, MonitorOutcome::Complete);
    // Ticks at 0s, 2s and 4s, then 3s of grace.
    assert_eq!(elapsed, Duration::from_secs(7));
    assert_eq!(
        lines,
        [
            "Video generation progress: 10%",
            "Video generation progress: 55%",
            "Video generation progress: 100%",
            "Video generation complete!",
        ]
    );
}

// ---------------------------------------------------------------------------
// Test: No signal at all times out at the deadline
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn silence_times_out_after_three_ticks() {
    let driver = driver(Script::new()).await;

    let (outcome, elapsed, lines) = run(&monitor(Duration::from_secs(6)), driver.as_ref()).await;

    assert_eq!(outcome, MonitorOutcome::TimedOut);
    assert!(!outcome.is_complete());
    assert_eq!(elapsed, Duration::from_secs(6));
    assert_eq!(lines, ["Progress monitoring timed out after 6 seconds"]);
}

// ---------------------------------------------------------------------------
// Test: The first strategy with a percentage wins the tick
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn first_matching_strategy_wins_each_tick() {
    let driver = driver(
        Script::new()
            .probe("percentage_label", &[&["Rendering"]])
            .probe("progress_class", &[&["40%"]])
            .probe("percentage_class", &[&["100%"]]),
    )
    .await;

    let (outcome, _, lines) = run(&monitor(Duration::from_secs(300)), driver.as_ref()).await;

    // Tick one stops at `progress_class`; `percentage_class` is only reached
    // on tick two, once the earlier strategies have run dry.
    assert_eq!(outcome, MonitorOutcome::Complete);
    assert_eq!(
        lines,
        [
            "Video generation progress: 40%",
            "Video generation progress: 100%",
            "Video generation complete!",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn spaced_hundred_percent_label_completes() {
    let driver = driver(Script::new().probe("percentage_label", &[&["80 %"], &["100 %"]])).await;

    let (outcome, elapsed, lines) = run(&monitor(Duration::from_secs(300)), driver.as_ref()).await;

    assert_eq!(outcome, MonitorOutcome::Complete);
    assert_eq!(elapsed, Duration::from_secs(5));
    assert_eq!(
        lines,
        [
            "Video generation progress: 80%",
            "Video generation progress: 100%",
            "Video generation complete!",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn non_percentage_text_is_not_progress() {
    let driver = driver(Script::new().probe("percentage_label", &[&["Queued"], &["Almost done"]])).await;

    let (outcome, _, lines) = run(&monitor(Duration::from_secs(4)), driver.as_ref()).await;

    assert_eq!(outcome, MonitorOutcome::TimedOut);
    assert_eq!(lines.len(), 1);
}

// ---------------------------------------------------------------------------
// Test: Artifact count fallback
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn enough_artifacts_complete_without_percentage() {
    let driver = driver(Script::new().generated_videos(2)).await;

    let (outcome, elapsed, lines) = run(&monitor(Duration::from_secs(300)), driver.as_ref()).await;

    assert_eq!(outcome, MonitorOutcome::Complete);
    assert_eq!(elapsed, Duration::ZERO);
    assert_eq!(lines, ["Videos appear to be ready!"]);
}

#[tokio::test(start_paused = true)]
async fn single_artifact_is_below_threshold() {
    let driver = driver(Script::new().generated_videos(1)).await;

    let (outcome, _, _) = run(&monitor(Duration::from_secs(4)), driver.as_ref()).await;

    assert_eq!(outcome, MonitorOutcome::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn discovery_errors_count_as_nothing_found() {
    let driver = driver(Script::new().generated_videos(3).fail_discovery()).await;

    let (outcome, _, _) = run(&monitor(Duration::from_secs(4)), driver.as_ref()).await;

    assert_eq!(outcome, MonitorOutcome::TimedOut);
}
