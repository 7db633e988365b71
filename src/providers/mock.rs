/*!
 * Mock implementations for testing.
 *
 * - `MockBackend` - scripted translation backend:
 *   - `MockBackend::working()` - answers every block with tagged lines
 *   - `MockBackend::failing()` - every call is unavailable
 *   - `.fail_on_calls(&[2])` - only the listed calls fail
 *   - `.gated()` - each call waits for a permit released by the test
 * - `MockSource` - canned search results per language
 * - `MockFetcher` - canned track bodies per URL
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::errors::{ProviderError, TranslationError};
use crate::language_utils::LanguagePreference;
use crate::media::MediaId;
use crate::translation::backend::TranslationBackend;
use crate::translation::batch::strip_marker;

use super::{SubtitleDescriptor, SubtitleSource, TrackFetcher};

/// Behavior mode for the mock backend
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// Always fails with an error
    Failing,
    /// Answers only the first line of each block
    DropLines,
    /// Returns an empty response
    Empty,
    /// Simulates slow response (for timeout testing)
    Slow { delay_ms: u64 },
}

/// Mock backend for testing the job loop
#[derive(Debug)]
pub struct MockBackend {
    behavior: MockBehavior,
    /// 1-based call numbers that fail regardless of behavior
    fail_on: HashSet<usize>,
    ready: AtomicBool,
    calls: AtomicUsize,
    blocks: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockBackend {
    /// Create a new mock backend with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            fail_on: HashSet::new(),
            ready: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
            blocks: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn drop_lines() -> Self {
        Self::new(MockBehavior::DropLines)
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Fail the given 1-based calls
    pub fn fail_on_calls(mut self, calls: &[usize]) -> Self {
        self.fail_on.extend(calls.iter().copied());
        self
    }

    /// Hold every call until [`MockBackend::release`] grants it
    pub fn gated(mut self) -> Self {
        self.gate = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// Let `calls` more gated calls through
    pub fn release(&self, calls: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(calls);
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Calls started so far, including gated ones
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Blocks received, in call order
    pub fn blocks(&self) -> Vec<String> {
        self.blocks.lock().clone()
    }

    /// Wait until at least `calls` calls have started
    pub async fn wait_for_calls(&self, calls: usize) {
        while self.call_count() < calls {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    /// The answer a working backend gives for `block`
    pub fn translate_lines(block: &str) -> String {
        block
            .lines()
            .enumerate()
            .map(|(i, line)| format!("[{}] [fr] {}", i + 1, strip_marker(line)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl TranslationBackend for MockBackend {
    async fn translate_block(&self, numbered_text: &str) -> Result<String, TranslationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.blocks.lock().push(numbered_text.to_string());

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|_| ProviderError::ConnectionError("gate closed".to_string()))?;
            permit.forget();
        }

        if self.fail_on.contains(&call) {
            return Err(ProviderError::ConnectionError(format!("call {} refused", call)).into());
        }

        match self.behavior {
            MockBehavior::Working => Ok(Self::translate_lines(numbered_text)),
            MockBehavior::Failing => {
                Err(ProviderError::ConnectionError("mock backend is down".to_string()).into())
            }
            MockBehavior::DropLines => Ok(Self::translate_lines(numbered_text)
                .lines()
                .next()
                .unwrap_or_default()
                .to_string()),
            MockBehavior::Empty => Ok(String::new()),
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(Self::translate_lines(numbered_text))
            }
        }
    }

    async fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn name(&self) -> String {
        "mock".to_string()
    }
}

/// Search source with canned results keyed by ISO 639-2/B code
#[derive(Debug, Default)]
pub struct MockSource {
    name: String,
    results: HashMap<String, Vec<SubtitleDescriptor>>,
    failing: bool,
    searches: AtomicUsize,
}

impl MockSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Answer searches for `lang` with descriptors for `ids`
    pub fn with_results(mut self, lang: &str, ids: &[&str]) -> Self {
        let descriptors = ids
            .iter()
            .map(|id| SubtitleDescriptor {
                id: id.to_string(),
                url: format!("https://subs.test/{}/{}.srt", self.name, id),
                lang: lang.to_string(),
                source: Some(self.name.clone()),
                title: None,
                rating: None,
            })
            .collect();
        self.results.insert(lang.to_string(), descriptors);
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubtitleSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(
        &self,
        _media: &MediaId,
        language: &LanguagePreference,
    ) -> Result<Vec<SubtitleDescriptor>, ProviderError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(ProviderError::ApiError {
                status_code: 503,
                message: "mock source is down".to_string(),
            });
        }
        Ok(self.results.get(language.part2b()).cloned().unwrap_or_default())
    }
}

/// Fetcher serving canned bodies
#[derive(Debug, Default)]
pub struct MockFetcher {
    bodies: HashMap<String, String>,
    fetched: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.bodies.insert(url.into(), body.into());
        self
    }

    /// URLs requested so far
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl TrackFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ProviderError> {
        self.fetched.lock().push(url.to_string());
        self.bodies.get(url).cloned().ok_or_else(|| ProviderError::ApiError {
            status_code: 404,
            message: format!("no body for {}", url),
        })
    }
}
