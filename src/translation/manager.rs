/*!
 * Translation job manager.
 *
 * Owns the single current job. A claim for a different media item flags the
 * running job for cancellation and takes its place; a claim for the media
 * already in flight is refused. Jobs translate batch by batch, persist the
 * accumulated track after every batch and publish progress through the hub.
 *
 * Cancellation is cooperative and sampled at batch boundaries: before a
 * batch starts and again before its result is persisted, so a superseded job
 * wastes at most the backend call it was waiting on.
 */

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::errors::TranslationError;
use crate::hub::{LogEntry, NotificationHub, Severity};
use crate::store::{TrackStore, entry_key};
use crate::subtitle_processor::{self, Cue};

use super::backend::TranslationBackend;
use super::batch::{align_translation, batch_count, build_numbered_block, partition};
use super::job::{JobSnapshot, JobStatus};

/// Job tuning
#[derive(Debug, Clone)]
pub struct JobOptions {
    /// Cues per backend call
    pub batch_size: usize,
    /// Language code used in entry keys (`tt1_fr`)
    pub target_language: String,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            batch_size: 20,
            target_language: "fr".to_string(),
        }
    }
}

/// Permission to run one job, handed out by [`JobManager::claim`]
#[derive(Debug)]
pub struct JobTicket {
    media_id: String,
    generation: u64,
    cancel: Arc<AtomicBool>,
}

impl JobTicket {
    pub fn media_id(&self) -> &str {
        &self.media_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// Result of a claim
#[derive(Debug)]
pub enum Claim {
    Started(JobTicket),
    /// A job for the same media is in flight
    AlreadyRunning,
}

/// Result of [`JobManager::translate`]
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// A stored translation answered the request
    Cached(String),
    /// A job ran to the end; holds the persisted track
    Completed(String),
    /// The media is already being translated
    AlreadyRunning,
}

#[derive(Debug)]
struct ActiveJob {
    media_id: String,
    generation: u64,
    cancel: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct Tracker {
    current: Option<ActiveJob>,
    // media id -> generation whose partial entry is on disk
    partial_owners: HashMap<String, u64>,
}

/// Single-job translation engine
pub struct JobManager {
    store: Arc<dyn TrackStore>,
    backend: Arc<dyn TranslationBackend>,
    hub: Arc<NotificationHub>,
    options: JobOptions,
    tracker: Mutex<Tracker>,
    // Serializes persist and cleanup against each other
    persist_lock: tokio::sync::Mutex<()>,
    next_generation: AtomicU64,
}

impl JobManager {
    pub fn new(
        store: Arc<dyn TrackStore>,
        backend: Arc<dyn TranslationBackend>,
        hub: Arc<NotificationHub>,
        options: JobOptions,
    ) -> Self {
        let options = JobOptions {
            batch_size: options.batch_size.max(1),
            ..options
        };
        Self {
            store,
            backend,
            hub,
            options,
            tracker: Mutex::new(Tracker::default()),
            persist_lock: tokio::sync::Mutex::new(()),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    pub fn backend(&self) -> &Arc<dyn TranslationBackend> {
        &self.backend
    }

    pub fn store(&self) -> &Arc<dyn TrackStore> {
        &self.store
    }

    pub fn options(&self) -> &JobOptions {
        &self.options
    }

    /// Store key of the translated track for `media_id`
    pub fn entry_key(&self, media_id: &str) -> String {
        entry_key(media_id, &self.options.target_language)
    }

    /// Media id of the job in flight
    pub fn current_media(&self) -> Option<String> {
        self.tracker.lock().current.as_ref().map(|j| j.media_id.clone())
    }

    pub fn is_running(&self, media_id: &str) -> bool {
        self.tracker
            .lock()
            .current
            .as_ref()
            .is_some_and(|j| j.media_id == media_id)
    }

    /// Take the current slot for `media_id`, superseding any other job
    pub fn claim(&self, media_id: &str) -> Claim {
        let mut tracker = self.tracker.lock();

        let superseded = match &tracker.current {
            Some(active) if active.media_id == media_id => {
                debug!("Job for {} already running, claim refused", media_id);
                return Claim::AlreadyRunning;
            }
            Some(active) => {
                active.cancel.store(true, Ordering::SeqCst);
                Some(active.media_id.clone())
            }
            None => None,
        };

        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = Arc::new(AtomicBool::new(false));
        tracker.current = Some(ActiveJob {
            media_id: media_id.to_string(),
            generation,
            cancel: cancel.clone(),
        });
        self.hub.publish_state(JobSnapshot::started(media_id));
        drop(tracker);

        if let Some(previous) = superseded {
            self.log(
                Severity::Info,
                format!("Cancelling translation of {} in favour of {}", previous, media_id),
            );
        }

        Claim::Started(JobTicket {
            media_id: media_id.to_string(),
            generation,
            cancel,
        })
    }

    /// Flag the current job for cancellation without starting another one
    pub fn cancel_current(&self) -> bool {
        let tracker = self.tracker.lock();
        let Some(active) = &tracker.current else {
            return false;
        };
        active.cancel.store(true, Ordering::SeqCst);

        let mut snapshot = self.hub.current_state();
        if snapshot.is_for(&active.media_id) {
            snapshot.cancel_requested = true;
            self.hub.publish_state(snapshot);
        }
        true
    }

    /// Complete translated track for `media_id`, if one is stored.
    ///
    /// Partial entries of a running or superseded job are not reported.
    pub async fn cached(&self, media_id: &str) -> Result<Option<String>, TranslationError> {
        if self.tracker.lock().partial_owners.contains_key(media_id) {
            return Ok(None);
        }
        let key = self.entry_key(media_id);
        if !self.store.exists(&key).await? {
            return Ok(None);
        }
        Ok(Some(self.store.read(&key).await?))
    }

    /// Whether a track can be served for `media_id`: a complete one, or the
    /// growing partial of the job in flight
    pub async fn translation_available(&self, media_id: &str) -> Result<bool, TranslationError> {
        {
            let tracker = self.tracker.lock();
            if let Some(owner) = tracker.partial_owners.get(media_id) {
                let owned_by_current = tracker
                    .current
                    .as_ref()
                    .is_some_and(|j| j.generation == *owner);
                if !owned_by_current {
                    return Ok(false);
                }
            }
        }
        Ok(self.store.exists(&self.entry_key(media_id)).await?)
    }

    /// Cache check, claim and run in one call
    pub async fn translate(&self, media_id: &str, raw_track: &str) -> Result<JobOutcome, TranslationError> {
        if self.is_running(media_id) {
            return Ok(JobOutcome::AlreadyRunning);
        }

        if let Some(content) = self.cached(media_id).await? {
            info!("Using cached translation for {}", media_id);
            self.report_cached(media_id);
            return Ok(JobOutcome::Cached(content));
        }

        match self.claim(media_id) {
            Claim::AlreadyRunning => Ok(JobOutcome::AlreadyRunning),
            Claim::Started(ticket) => self
                .run_translation(ticket, raw_track)
                .await
                .map(JobOutcome::Completed),
        }
    }

    /// Report a cache hit as Done, unless another job owns the state
    pub fn report_cached(&self, media_id: &str) {
        let tracker = self.tracker.lock();
        if tracker.current.is_none() {
            self.hub.publish_state(JobSnapshot::cached(media_id));
        }
    }

    /// End a claimed job that failed before translation started
    pub fn report_failure(&self, ticket: JobTicket, reason: &str) {
        self.log(
            Severity::Error,
            format!("Translation of {} failed: {}", ticket.media_id, reason),
        );
        let mut snapshot = JobSnapshot::started(&ticket.media_id);
        snapshot.status = JobStatus::Error;
        self.finish(&ticket, snapshot);
    }

    /// Translate `raw_track` for a claimed job.
    ///
    /// Returns the persisted track on success. `Cancelled` means the job was
    /// superseded and its partial entry removed.
    pub async fn run_translation(&self, ticket: JobTicket, raw_track: &str) -> Result<String, TranslationError> {
        let key = self.entry_key(&ticket.media_id);

        let cues = match subtitle_processor::parse(raw_track) {
            Ok(cues) => cues,
            Err(e) => {
                self.log(
                    Severity::Error,
                    format!("Cannot parse source track for {}: {}", ticket.media_id, e),
                );
                let mut snapshot = JobSnapshot::started(&ticket.media_id);
                snapshot.status = JobStatus::Error;
                self.finish(&ticket, snapshot);
                return Err(e.into());
            }
        };

        let batch_size = self.options.batch_size;
        let mut snapshot = JobSnapshot {
            media_id: Some(ticket.media_id.clone()),
            status: JobStatus::Translating,
            total_cues: cues.len(),
            total_batches: batch_count(cues.len(), batch_size),
            ..JobSnapshot::default()
        };
        self.log(
            Severity::Info,
            format!(
                "Translating {}: {} cues in {} batches with {}",
                ticket.media_id,
                snapshot.total_cues,
                snapshot.total_batches,
                self.backend.name()
            ),
        );
        self.publish(&ticket, &snapshot);

        let mut translated: Vec<Cue> = Vec::with_capacity(cues.len());

        for (batch_idx, batch) in partition(&cues, batch_size).into_iter().enumerate() {
            if ticket.is_cancelled() {
                return Err(self.abandon(&ticket, &key).await);
            }

            let batch_num = batch_idx + 1;
            snapshot.current_batch = batch_num;
            debug!("Batch {}/{} for {}", batch_num, snapshot.total_batches, ticket.media_id);

            let block = build_numbered_block(batch);
            match self.backend.translate_block(&block).await {
                Ok(response) => translated.extend(align_translation(batch, &response)),
                Err(e) => {
                    self.log(
                        Severity::Warn,
                        format!(
                            "Batch {}/{} for {} kept its source text: {}",
                            batch_num, snapshot.total_batches, ticket.media_id, e
                        ),
                    );
                    translated.extend(batch.iter().cloned());
                }
            }

            match self.persist(&ticket, &key, &translated).await {
                Ok(()) => {}
                Err(TranslationError::Cancelled(_)) => {
                    return Err(self.abandon(&ticket, &key).await);
                }
                Err(e) => {
                    self.log(
                        Severity::Error,
                        format!("Cannot save progress for {}: {}", ticket.media_id, e),
                    );
                    self.discard_partial(&ticket, &key).await;
                    snapshot.status = JobStatus::Error;
                    self.finish(&ticket, snapshot);
                    return Err(e);
                }
            }

            snapshot.translated_cues = translated.len();
            self.publish(&ticket, &snapshot);
            info!(
                "Saved {}/{} cues for {} ({}%)",
                snapshot.translated_cues,
                snapshot.total_cues,
                ticket.media_id,
                snapshot.percent()
            );
        }

        let content = subtitle_processor::serialize(&translated);
        self.tracker.lock().partial_owners.remove(&ticket.media_id);

        snapshot.status = JobStatus::Done;
        self.log(
            Severity::Info,
            format!("Translation of {} finished ({} cues)", ticket.media_id, snapshot.total_cues),
        );
        self.finish(&ticket, snapshot);

        Ok(content)
    }

    async fn persist(&self, ticket: &JobTicket, key: &str, cues: &[Cue]) -> Result<(), TranslationError> {
        let _guard = self.persist_lock.lock().await;
        if ticket.is_cancelled() {
            return Err(TranslationError::Cancelled(ticket.media_id.clone()));
        }

        self.store.write(key, &subtitle_processor::serialize(cues)).await?;
        self.tracker
            .lock()
            .partial_owners
            .insert(ticket.media_id.clone(), ticket.generation);
        Ok(())
    }

    /// Drop the partial entry of a superseded job and end it quietly
    async fn abandon(&self, ticket: &JobTicket, key: &str) -> TranslationError {
        self.discard_partial(ticket, key).await;

        let mut tracker = self.tracker.lock();
        if tracker
            .current
            .as_ref()
            .is_some_and(|j| j.generation == ticket.generation)
        {
            // Cancelled without a successor
            tracker.current = None;
            let mut snapshot = self.hub.current_state();
            snapshot.status = JobStatus::Idle;
            snapshot.cancel_requested = true;
            self.hub.publish_state(snapshot);
        }
        drop(tracker);

        self.log(
            Severity::Info,
            format!("Translation of {} cancelled, partial track discarded", ticket.media_id),
        );
        TranslationError::Cancelled(ticket.media_id.clone())
    }

    /// Delete the entry if this job wrote the version on disk
    async fn discard_partial(&self, ticket: &JobTicket, key: &str) {
        let _guard = self.persist_lock.lock().await;

        let owned = {
            let mut tracker = self.tracker.lock();
            if tracker.partial_owners.get(&ticket.media_id) == Some(&ticket.generation) {
                tracker.partial_owners.remove(&ticket.media_id);
                true
            } else {
                false
            }
        };

        if owned {
            if let Err(e) = self.store.delete(key).await {
                warn!("Cannot delete partial track {}: {}", key, e);
            }
        }
    }

    /// Publish progress if the ticket still owns the current slot
    fn publish(&self, ticket: &JobTicket, snapshot: &JobSnapshot) {
        let tracker = self.tracker.lock();
        if tracker
            .current
            .as_ref()
            .is_some_and(|j| j.generation == ticket.generation)
        {
            self.hub.publish_state(snapshot.clone());
        }
    }

    /// Publish the final state and release the slot
    fn finish(&self, ticket: &JobTicket, snapshot: JobSnapshot) {
        let mut tracker = self.tracker.lock();
        if tracker
            .current
            .as_ref()
            .is_some_and(|j| j.generation == ticket.generation)
        {
            tracker.current = None;
            self.hub.publish_state(snapshot);
        }
    }

    fn log(&self, severity: Severity, message: String) {
        match severity {
            Severity::Info => info!("{}", message),
            Severity::Warn => warn!("{}", message),
            Severity::Error => error!("{}", message),
        }
        self.hub.publish_log(LogEntry::new(severity, message));
    }
}
