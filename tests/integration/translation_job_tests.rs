/*!
 * End-to-end tests for the translation job manager
 */

use std::sync::Arc;

use subai::errors::TranslationError;
use subai::hub::{NotificationHub, Severity};
use subai::providers::mock::MockBackend;
use subai::store::{MemoryTrackStore, TrackStore};
use subai::translation::{JobManager, JobOptions, JobOutcome, JobStatus};
use tokio_test::assert_ok;

use crate::common::{self, RecordingStore};

fn manager_with(store: Arc<dyn TrackStore>, backend: Arc<MockBackend>) -> Arc<JobManager> {
    common::init_logger();
    Arc::new(JobManager::new(
        store,
        backend,
        Arc::new(NotificationHub::default()),
        JobOptions::default(),
    ))
}

fn translated(text: &str) -> String {
    format!("[fr] {}", text)
}

#[tokio::test]
async fn test_translate_with45Cues_shouldSaveAfterEveryBatch() {
    let store = RecordingStore::new();
    let backend = Arc::new(MockBackend::working());
    let manager = manager_with(store.clone(), backend.clone());
    let mut observer = manager.hub().subscribe();

    let outcome = assert_ok!(manager.translate("tt1", &common::sample_track(45)).await);

    let JobOutcome::Completed(content) = outcome else {
        panic!("expected a completed job");
    };
    assert_eq!(store.counts_for("tt1_fr"), vec![20, 40, 45]);
    assert_eq!(backend.call_count(), 3);
    assert_eq!(store.read("tt1_fr").await.unwrap(), content);

    let texts = common::cue_texts(&content);
    assert_eq!(texts.len(), 45);
    assert!(texts.iter().enumerate().all(|(i, t)| *t == translated(&format!("Line {}", i + 1))));

    let states = common::drain_states(&mut observer);
    let progress: Vec<usize> = states
        .iter()
        .filter(|s| s.status == JobStatus::Translating)
        .map(|s| s.translated_cues)
        .collect();
    assert_eq!(progress, vec![0, 20, 40, 45]);

    let last = states.last().unwrap();
    assert_eq!(last.status, JobStatus::Done);
    assert_eq!(last.translated_cues, 45);
    assert_eq!(last.total_batches, 3);
    assert_eq!(last.percent(), 100);
    assert!(manager.current_media().is_none());
}

#[tokio::test]
async fn test_translate_withNumberedBlocks_shouldRestartNumberingPerBatch() {
    let backend = Arc::new(MockBackend::working());
    let manager = manager_with(Arc::new(MemoryTrackStore::new()), backend.clone());

    manager.translate("tt1", &common::sample_track(45)).await.unwrap();

    let blocks = backend.blocks();
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0].lines().count(), 20);
    assert_eq!(blocks[0].lines().next(), Some("[1] Line 1"));
    assert_eq!(blocks[1].lines().next(), Some("[1] Line 21"));
    assert_eq!(blocks[2].lines().count(), 5);
    assert_eq!(blocks[2].lines().last(), Some("[5] Line 45"));
}

#[tokio::test]
async fn test_translate_withFailingSecondBatch_shouldKeepSourceTextForThatBatch() {
    let store = RecordingStore::new();
    let backend = Arc::new(MockBackend::working().fail_on_calls(&[2]));
    let manager = manager_with(store.clone(), backend);

    let outcome = manager.translate("tt1", &common::sample_track(45)).await.unwrap();
    let JobOutcome::Completed(content) = outcome else {
        panic!("expected a completed job");
    };

    let texts = common::cue_texts(&content);
    assert_eq!(texts[0], translated("Line 1"));
    assert_eq!(texts[20], "Line 21");
    assert_eq!(texts[39], "Line 40");
    assert_eq!(texts[40], translated("Line 41"));
    assert_eq!(store.counts_for("tt1_fr"), vec![20, 40, 45]);

    assert_eq!(manager.hub().current_state().status, JobStatus::Done);
    assert!(manager
        .hub()
        .recent_logs()
        .iter()
        .any(|e| e.severity == Severity::Warn && e.message.contains("Batch 2/3")));
}

#[tokio::test]
async fn test_translate_withUnreachableBackend_shouldFinishWithSourceText() {
    let backend = Arc::new(MockBackend::failing());
    let manager = manager_with(Arc::new(MemoryTrackStore::new()), backend.clone());

    let outcome = manager.translate("tt1", &common::sample_track(3)).await.unwrap();
    let JobOutcome::Completed(content) = outcome else {
        panic!("expected a completed job");
    };
    assert_eq!(common::cue_texts(&content), vec!["Line 1", "Line 2", "Line 3"]);
    assert_eq!(manager.hub().current_state().status, JobStatus::Done);
}

#[tokio::test]
async fn test_translate_withShortOrEmptyAnswers_shouldFallBackPerCue() {
    let backend = Arc::new(MockBackend::drop_lines());
    let manager = manager_with(Arc::new(MemoryTrackStore::new()), backend);
    let JobOutcome::Completed(content) = manager.translate("tt1", &common::sample_track(3)).await.unwrap() else {
        panic!("expected a completed job");
    };
    assert_eq!(common::cue_texts(&content), vec![translated("Line 1"), "Line 2".to_string(), "Line 3".to_string()]);

    let backend = Arc::new(MockBackend::empty());
    let manager = manager_with(Arc::new(MemoryTrackStore::new()), backend);
    let JobOutcome::Completed(content) = manager.translate("tt1", &common::sample_track(2)).await.unwrap() else {
        panic!("expected a completed job");
    };
    assert_eq!(common::cue_texts(&content), vec!["Line 1", "Line 2"]);
}

#[tokio::test]
async fn test_translate_withMalformedTrack_shouldFailWithoutSaving() {
    let store = RecordingStore::new();
    let backend = Arc::new(MockBackend::working());
    let manager = manager_with(store.clone(), backend.clone());

    let result = manager.translate("tt1", "<html>503 Service Unavailable</html>").await;

    assert!(matches!(result, Err(TranslationError::MalformedTrack(_))));
    assert!(store.writes().is_empty());
    assert_eq!(backend.call_count(), 0);
    assert_eq!(manager.hub().current_state().status, JobStatus::Error);
    assert!(manager.current_media().is_none());
}

#[tokio::test]
async fn test_translate_withReadOnlyStore_shouldStopWithStoreError() {
    let backend = Arc::new(MockBackend::working());
    let manager = manager_with(RecordingStore::failing(), backend.clone());

    let result = manager.translate("tt1", &common::sample_track(45)).await;

    assert!(matches!(result, Err(TranslationError::StoreUnavailable(_))));
    assert_eq!(backend.call_count(), 1);
    assert_eq!(manager.hub().current_state().status, JobStatus::Error);
    assert!(manager.current_media().is_none());
    assert!(manager
        .hub()
        .recent_logs()
        .iter()
        .any(|e| e.severity == Severity::Error));
}

#[tokio::test]
async fn test_translate_withStoredTrack_shouldAnswerFromCache() {
    let store = Arc::new(MemoryTrackStore::new());
    store.write("tt1_fr", "1\n00:00:01,000 --> 00:00:02,000\nBonjour\n").await.unwrap();
    let backend = Arc::new(MockBackend::working());
    let manager = manager_with(store, backend.clone());

    let outcome = manager.translate("tt1", &common::sample_track(10)).await.unwrap();

    match outcome {
        JobOutcome::Cached(content) => assert!(content.contains("Bonjour")),
        other => panic!("expected a cache hit, got {:?}", other),
    }
    assert_eq!(backend.call_count(), 0);
    let state = manager.hub().current_state();
    assert_eq!(state.status, JobStatus::Done);
    assert!(state.is_for("tt1"));
}

#[tokio::test]
async fn test_translate_withSameMediaInFlight_shouldNotStartSecondJob() {
    let store = RecordingStore::new();
    let backend = Arc::new(MockBackend::working().gated());
    let manager = manager_with(store.clone(), backend.clone());

    let first = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.translate("tt1", &common::sample_track(45)).await })
    };
    backend.wait_for_calls(1).await;

    let second = manager.translate("tt1", &common::sample_track(45)).await.unwrap();
    assert_eq!(second, JobOutcome::AlreadyRunning);
    assert!(manager.is_running("tt1"));

    backend.release(10);
    let first = first.await.unwrap().unwrap();
    assert!(matches!(first, JobOutcome::Completed(_)));
    assert_eq!(backend.call_count(), 3);
    assert_eq!(store.counts_for("tt1_fr"), vec![20, 40, 45]);
}

#[tokio::test]
async fn test_translate_withOtherMediaRequested_shouldSupersedeAndDiscardPartial() {
    let store = RecordingStore::new();
    let backend = Arc::new(MockBackend::working().gated());
    let manager = manager_with(store.clone(), backend.clone());

    let job_a = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.translate("tt1", &common::sample_track(45)).await })
    };

    // First batch of A goes through and is saved
    backend.wait_for_calls(1).await;
    backend.release(1);
    backend.wait_for_calls(2).await;
    assert_eq!(store.counts_for("tt1_fr"), vec![20]);
    assert!(manager.translation_available("tt1").await.unwrap());

    let job_b = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.translate("tt2", &common::sample_track(30)).await })
    };
    backend.wait_for_calls(3).await;
    assert_eq!(manager.current_media().as_deref(), Some("tt2"));

    // A's pending call finishes first, then notices it was superseded
    backend.release(1);
    let result_a = job_a.await.unwrap();
    assert!(matches!(result_a, Err(TranslationError::Cancelled(ref media)) if media == "tt1"));
    assert!(!store.exists("tt1_fr").await.unwrap());
    assert!(!manager.translation_available("tt1").await.unwrap());
    assert_eq!(store.counts_for("tt1_fr"), vec![20]);

    backend.release(10);
    let result_b = job_b.await.unwrap().unwrap();
    let JobOutcome::Completed(content) = result_b else {
        panic!("expected B to complete");
    };
    assert_eq!(common::cue_texts(&content).len(), 30);
    assert_eq!(store.counts_for("tt2_fr"), vec![20, 30]);

    let state = manager.hub().current_state();
    assert!(state.is_for("tt2"));
    assert_eq!(state.status, JobStatus::Done);
}

#[tokio::test]
async fn test_translate_withFirstMediaRequestedAgain_shouldKeepOnlyNewestTrack() {
    let store = RecordingStore::new();
    let backend = Arc::new(MockBackend::working().gated());
    let manager = manager_with(store.clone(), backend.clone());

    let spawn_job = |media: &'static str, cues: usize| {
        let manager = manager.clone();
        tokio::spawn(async move { manager.translate(media, &common::sample_track(cues)).await })
    };

    // A saves its first batch and waits on the second call
    let first_a = spawn_job("tt1", 45);
    backend.wait_for_calls(1).await;
    backend.release(1);
    backend.wait_for_calls(2).await;
    assert_eq!(store.counts_for("tt1_fr"), vec![20]);

    // B supersedes A, then A is requested again before A noticed
    let job_b = spawn_job("tt2", 30);
    backend.wait_for_calls(3).await;
    let second_a = spawn_job("tt1", 45);
    backend.wait_for_calls(4).await;
    assert_eq!(manager.current_media().as_deref(), Some("tt1"));

    backend.release(20);
    let result_first = first_a.await.unwrap();
    assert!(matches!(result_first, Err(TranslationError::Cancelled(ref media)) if media == "tt1"));
    let result_b = job_b.await.unwrap();
    assert!(matches!(result_b, Err(TranslationError::Cancelled(ref media)) if media == "tt2"));
    let JobOutcome::Completed(content) = second_a.await.unwrap().unwrap() else {
        panic!("expected the second run of A to complete");
    };

    assert_eq!(store.counts_for("tt1_fr"), vec![20, 20, 40, 45]);
    assert!(store.counts_for("tt2_fr").is_empty());
    assert!(!store.exists("tt2_fr").await.unwrap());

    let stored = assert_ok!(store.read("tt1_fr").await);
    assert_eq!(stored, content);
    let texts = common::cue_texts(&stored);
    assert_eq!(texts.len(), 45);
    assert_eq!(texts[44], translated("Line 45"));
    assert!(manager.cached("tt1").await.unwrap().is_some());

    let state = manager.hub().current_state();
    assert!(state.is_for("tt1"));
    assert_eq!(state.status, JobStatus::Done);
    assert!(manager.current_media().is_none());
}

#[tokio::test]
async fn test_cancel_current_withRunningJob_shouldReturnToIdle() {
    let store = RecordingStore::new();
    let backend = Arc::new(MockBackend::working().gated());
    let manager = manager_with(store.clone(), backend.clone());

    let job = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.translate("tt1", &common::sample_track(45)).await })
    };
    backend.wait_for_calls(1).await;
    assert!(manager.cancel_current());
    backend.release(10);

    let result = job.await.unwrap();
    assert!(matches!(result, Err(TranslationError::Cancelled(_))));
    assert!(store.writes().is_empty());
    assert!(manager.current_media().is_none());

    let state = manager.hub().current_state();
    assert_eq!(state.status, JobStatus::Idle);
    assert!(state.cancel_requested);
}

#[tokio::test]
async fn test_cached_withPartialOfRunningJob_shouldNotReportComplete() {
    let store = RecordingStore::new();
    let backend = Arc::new(MockBackend::working().gated());
    let manager = manager_with(store.clone(), backend.clone());

    let job = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.translate("tt1", &common::sample_track(45)).await })
    };
    backend.wait_for_calls(1).await;
    backend.release(1);
    backend.wait_for_calls(2).await;

    assert!(store.exists("tt1_fr").await.unwrap());
    assert!(manager.cached("tt1").await.unwrap().is_none());

    backend.release(10);
    job.await.unwrap().unwrap();
    let complete = manager.cached("tt1").await.unwrap().unwrap();
    assert_eq!(common::cue_texts(&complete).len(), 45);
}
