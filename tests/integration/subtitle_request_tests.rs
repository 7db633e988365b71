/*!
 * Tests for the subtitle request flow: search, fallback and background translation
 */

use std::sync::Arc;

use subai::app_config::Config;
use subai::app_controller::{Controller, TRANSLATED_DESCRIPTOR_ID, TRANSLATED_DESCRIPTOR_TITLE};
use subai::media::MediaId;
use subai::providers::SubtitleSource;
use subai::providers::mock::{MockBackend, MockFetcher, MockSource};
use subai::store::{MemoryTrackStore, TrackStore};
use subai::translation::JobStatus;

use crate::common;

const FALLBACK_URL: &str = "https://subs.test/os/7.srt";

struct Harness {
    controller: Controller,
    backend: Arc<MockBackend>,
    fetcher: Arc<MockFetcher>,
    store: Arc<MemoryTrackStore>,
}

fn harness(source: MockSource, fetcher: MockFetcher, backend: MockBackend) -> Harness {
    common::init_logger();
    let backend = Arc::new(backend);
    let fetcher = Arc::new(fetcher);
    let store = Arc::new(MemoryTrackStore::new());
    let controller = Controller::with_components(
        Config::default(),
        vec![Arc::new(source) as Arc<dyn SubtitleSource>],
        fetcher.clone(),
        backend.clone(),
        store.clone(),
    )
    .unwrap();
    Harness {
        controller,
        backend,
        fetcher,
        store,
    }
}

fn english_only() -> MockSource {
    MockSource::new("os").with_results("eng", &["7", "8"])
}

fn ids(subtitles: &[subai::providers::SubtitleDescriptor]) -> Vec<&str> {
    subtitles.iter().map(|s| s.id.as_str()).collect()
}

#[tokio::test]
async fn test_request_withTargetSubtitles_shouldReturnThemWithoutJob() {
    let h = harness(
        MockSource::new("os").with_results("fre", &["1", "2"]),
        MockFetcher::new(),
        MockBackend::working(),
    );

    let outcome = h.controller.handle_request("tt0133093", Some("fr")).await;

    assert_eq!(ids(&outcome.subtitles), vec!["os - 1", "os - 2"]);
    assert!(outcome.subtitles.iter().all(|s| s.lang == "fre"));
    assert!(outcome.job.is_none());
    assert_eq!(h.backend.call_count(), 0);
}

#[tokio::test]
async fn test_request_withoutLanguage_shouldUseConfiguredTarget() {
    let h = harness(
        MockSource::new("os").with_results("fre", &["1"]),
        MockFetcher::new(),
        MockBackend::working(),
    );

    let subtitles = h.controller.request_subtitles("tt1", None).await;
    assert_eq!(ids(&subtitles), vec!["os - 1"]);

    let subtitles = h.controller.request_subtitles("tt1", Some("not-a-language")).await;
    assert_eq!(ids(&subtitles), vec!["os - 1"]);
}

#[tokio::test]
async fn test_request_withInvalidMediaId_shouldReturnNothing() {
    let h = harness(english_only(), MockFetcher::new(), MockBackend::working());
    assert!(h.controller.request_subtitles("nm0000206", Some("fr")).await.is_empty());
    assert!(h.controller.request_subtitles("tt1:1", Some("fr")).await.is_empty());
}

#[tokio::test]
async fn test_request_withOnlyFallback_shouldListFallbackAndTranslateInBackground() {
    let h = harness(
        english_only(),
        MockFetcher::new().with_body(FALLBACK_URL, common::sample_track(25)),
        MockBackend::working(),
    );

    let outcome = h.controller.handle_request("tt1", Some("fr")).await;
    assert_eq!(ids(&outcome.subtitles), vec!["os_en_7", "os_en_8"]);
    assert!(outcome.subtitles.iter().all(|s| s.lang == "eng"));

    let content = outcome.job.expect("a job should start").await.unwrap().unwrap();
    assert_eq!(common::cue_texts(&content).len(), 25);
    assert_eq!(h.fetcher.fetched(), vec![FALLBACK_URL.to_string()]);
    assert!(h.store.exists("tt1_fr").await.unwrap());
    assert_eq!(h.controller.current_state().status, JobStatus::Done);

    // Next request is served the translated track first
    let outcome = h.controller.handle_request("tt1", Some("fr")).await;
    assert!(outcome.job.is_none());
    assert_eq!(ids(&outcome.subtitles), vec![TRANSLATED_DESCRIPTOR_ID, "os_en_7", "os_en_8"]);
    let translated = &outcome.subtitles[0];
    assert_eq!(translated.url, "http://127.0.0.1:7000/subtitles/tt1_fr.srt");
    assert_eq!(translated.lang, "fre");
    assert_eq!(translated.title.as_deref(), Some(TRANSLATED_DESCRIPTOR_TITLE));
    assert_eq!(h.backend.call_count(), 2);
}

#[tokio::test]
async fn test_request_whileJobRuns_shouldNotStartAnotherAndServePartial() {
    let h = harness(
        english_only(),
        MockFetcher::new().with_body(FALLBACK_URL, common::sample_track(45)),
        MockBackend::working().gated(),
    );

    let first = h.controller.handle_request("tt1", Some("fr")).await;
    let job = first.job.expect("a job should start");
    h.backend.wait_for_calls(1).await;

    // Nothing saved yet
    let second = h.controller.handle_request("tt1", Some("fr")).await;
    assert!(second.job.is_none());
    assert_eq!(ids(&second.subtitles), vec!["os_en_7", "os_en_8"]);

    // First batch saved, the growing track is offered
    h.backend.release(1);
    h.backend.wait_for_calls(2).await;
    let third = h.controller.handle_request("tt1", Some("fr")).await;
    assert!(third.job.is_none());
    assert_eq!(third.subtitles[0].id, TRANSLATED_DESCRIPTOR_ID);

    h.backend.release(10);
    assert!(job.await.unwrap().is_some());
    assert_eq!(h.backend.call_count(), 3);
    assert_eq!(h.fetcher.fetched().len(), 1);
}

#[tokio::test]
async fn test_request_withBackendNotReady_shouldOnlyListFallback() {
    let h = harness(
        english_only(),
        MockFetcher::new().with_body(FALLBACK_URL, common::sample_track(5)),
        MockBackend::working(),
    );
    h.backend.set_ready(false);

    let outcome = h.controller.handle_request("tt1", Some("fr")).await;

    assert!(outcome.job.is_none());
    assert_eq!(ids(&outcome.subtitles), vec!["os_en_7", "os_en_8"]);
    assert!(h.fetcher.fetched().is_empty());
}

#[tokio::test]
async fn test_request_withUndownloadableTrack_shouldReportErrorAndAllowRetry() {
    let h = harness(english_only(), MockFetcher::new(), MockBackend::working());

    let outcome = h.controller.handle_request("tt1", Some("fr")).await;
    assert!(outcome.job.expect("a job should start").await.unwrap().is_none());
    assert_eq!(h.controller.current_state().status, JobStatus::Error);
    assert!(h.controller.jobs().current_media().is_none());

    let retry = h.controller.handle_request("tt1", Some("fr")).await;
    assert!(retry.job.is_some());
}

#[tokio::test]
async fn test_request_withOtherLanguage_shouldNotTranslate() {
    let h = harness(
        english_only(),
        MockFetcher::new().with_body(FALLBACK_URL, common::sample_track(5)),
        MockBackend::working(),
    );

    let outcome = h.controller.handle_request("tt1", Some("de")).await;

    assert!(outcome.job.is_none());
    assert_eq!(ids(&outcome.subtitles), vec!["os_en_7", "os_en_8"]);
}

#[tokio::test]
async fn test_request_withNothingAnywhere_shouldReturnEmpty() {
    let h = harness(MockSource::new("os"), MockFetcher::new(), MockBackend::working());
    assert!(h.controller.request_subtitles("tt1", Some("fr")).await.is_empty());
    assert!(h.controller.request_subtitles("tt1", Some("en")).await.is_empty());
}

#[tokio::test]
async fn test_cache_commands_withStoredTracks_shouldListAndRemove() {
    let h = harness(english_only(), MockFetcher::new(), MockBackend::working());
    h.store.write("tt1_fr", "x").await.unwrap();
    h.store.write("tt2_1_3_fr", "y").await.unwrap();

    assert_eq!(h.controller.cached_tracks().await.unwrap(), vec!["tt1_fr", "tt2_1_3_fr"]);

    h.controller.remove_cached("tt2:1:3").await.unwrap();
    assert_eq!(h.controller.cached_tracks().await.unwrap(), vec!["tt1_fr"]);
    assert!(h.controller.remove_cached("bogus").await.is_err());

    assert_eq!(h.controller.clear_cache().await.unwrap(), 1);
    assert!(h.controller.cached_tracks().await.unwrap().is_empty());
}

#[test]
fn test_track_url_withEpisode_shouldUseFilesystemKey() {
    let h = harness(english_only(), MockFetcher::new(), MockBackend::working());
    assert_eq!(
        h.controller.track_url(&MediaId::for_episode("tt0944947", 1, 2)),
        "http://127.0.0.1:7000/subtitles/tt0944947_1_2_fr.srt"
    );
}
