use super::test_helpers::*;
use crate::error::Error;
use crate::types::{
    AbortReason, Event, PipelineState, RunId, RunOutcome, RunReport, Trigger, TriggerOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;


/// Trigger a scan and wait (bounded) for its report
async fn run_to_completion(harness: &Harness, trigger: Trigger) -> RunReport {
    let outcome = harness.pipeline.trigger(trigger).unwrap();
    assert!(matches!(outcome, TriggerOutcome::Started(_)));
    tokio::time::timeout(Duration::from_secs(5), harness.pipeline.wait_idle())
        .await
        .expect("run did not finish")
        .expect("finished run has a report")
}

/// Poll (bounded) until `check` holds
async fn eventually(check: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never held");
}

/// Names of the files left in `dir`
fn file_names(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn abort_reason(report: &RunReport) -> Option<AbortReason> {
    report.outcome.abort_reason()
}
