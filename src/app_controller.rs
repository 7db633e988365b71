use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::app_config::Config;
use crate::errors::TranslationError;
use crate::hub::{NotificationHub, Observer};
use crate::language_utils::LanguagePreference;
use crate::media::MediaId;
use crate::providers::opensubtitles::{HttpTrackFetcher, LegacyOpenSubtitles, StremioOpenSubtitles};
use crate::providers::{SubtitleDescriptor, SubtitleSource, TrackFetcher};
use crate::search::{SearchCache, SearchService};
use crate::store::{FileTrackStore, TrackStore};
use crate::translation::{Claim, JobManager, JobOptions, JobSnapshot, OllamaBackend, TranslationBackend};

// @module: Application controller for subtitle requests

/// Id of the descriptor pointing at a translated track
pub const TRANSLATED_DESCRIPTOR_ID: &str = "subai-translated";

/// Title of the descriptor pointing at a translated track
pub const TRANSLATED_DESCRIPTOR_TITLE: &str = "SubAI (AI)";

/// Answer to a subtitle request
#[derive(Debug)]
pub struct RequestOutcome {
    pub subtitles: Vec<SubtitleDescriptor>,
    /// Background translation started by this request
    pub job: Option<JoinHandle<Option<String>>>,
}

impl RequestOutcome {
    fn only(subtitles: Vec<SubtitleDescriptor>) -> Self {
        Self { subtitles, job: None }
    }
}

/// Main application controller for subtitle requests
pub struct Controller {
    // @field: App configuration
    config: Config,
    target: LanguagePreference,
    fallback: LanguagePreference,
    search: SearchService,
    fetcher: Arc<dyn TrackFetcher>,
    jobs: Arc<JobManager>,
}

impl Controller {
    // @method: Create a controller wired to the real services
    pub fn with_config(config: Config) -> Result<Self> {
        let target = LanguagePreference::parse(&config.target_language)
            .context("Invalid target language")?;
        let fallback = LanguagePreference::parse(&config.fallback_language)
            .context("Invalid fallback language")?;

        let sources: Vec<Arc<dyn SubtitleSource>> = vec![
            Arc::new(StremioOpenSubtitles::from_config(&config.search)),
            Arc::new(LegacyOpenSubtitles::from_config(&config.search)),
        ];
        let fetcher = Arc::new(HttpTrackFetcher::new(config.search.timeout()));
        let backend = Arc::new(OllamaBackend::new(&config.backend, &fallback, &target));
        let store = Arc::new(FileTrackStore::new(&config.subtitles_dir));

        Self::with_components(config, sources, fetcher, backend, store)
    }

    /// Create a controller over explicit collaborators
    pub fn with_components(
        config: Config,
        sources: Vec<Arc<dyn SubtitleSource>>,
        fetcher: Arc<dyn TrackFetcher>,
        backend: Arc<dyn TranslationBackend>,
        store: Arc<dyn TrackStore>,
    ) -> Result<Self> {
        let target = LanguagePreference::parse(&config.target_language)
            .context("Invalid target language")?;
        let fallback = LanguagePreference::parse(&config.fallback_language)
            .context("Invalid fallback language")?;

        let hub = Arc::new(NotificationHub::new(config.job.log_capacity));
        let jobs = Arc::new(JobManager::new(
            store,
            backend,
            hub,
            JobOptions {
                batch_size: config.job.batch_size,
                target_language: target.part1().to_string(),
            },
        ));
        let search = SearchService::new(
            sources,
            SearchCache::new(config.search.cache_ttl(), config.search.cache_enabled),
        );

        Ok(Self {
            config,
            target,
            fallback,
            search,
            fetcher,
            jobs,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn jobs(&self) -> &Arc<JobManager> {
        &self.jobs
    }

    pub fn hub(&self) -> &Arc<NotificationHub> {
        self.jobs.hub()
    }

    pub fn search(&self) -> &SearchService {
        &self.search
    }

    pub fn current_state(&self) -> JobSnapshot {
        self.hub().current_state()
    }

    pub fn subscribe(&self) -> Observer {
        self.hub().subscribe()
    }

    pub fn unsubscribe(&self, id: Uuid) {
        self.hub().unsubscribe(id)
    }

    /// URL a translated track is served under
    pub fn track_url(&self, media: &MediaId) -> String {
        format!(
            "{}/subtitles/{}.srt",
            self.config.public_base_url(),
            self.jobs.entry_key(&media.cache_key())
        )
    }

    /// Subtitles for `media_id`; may start a background translation.
    ///
    /// Never fails: problems are logged and whatever was found is returned.
    pub async fn request_subtitles(&self, media_id: &str, raw_language: Option<&str>) -> Vec<SubtitleDescriptor> {
        self.handle_request(media_id, raw_language).await.subtitles
    }

    /// Same as [`Controller::request_subtitles`], also handing back the
    /// background job if one was started
    pub async fn handle_request(&self, media_id: &str, raw_language: Option<&str>) -> RequestOutcome {
        let media = match MediaId::parse(media_id) {
            Ok(media) => media,
            Err(e) => {
                warn!("Rejecting request: {}", e);
                return RequestOutcome::only(Vec::new());
            }
        };

        let wanted = match LanguagePreference::parse_or(raw_language, &self.config.target_language) {
            Ok(lang) => lang,
            Err(e) => {
                error!("No usable language for request {}: {}", media, e);
                return RequestOutcome::only(Vec::new());
            }
        };

        info!("Subtitle request for {} ({})", media, wanted);

        let found = self.search.search(&media, &wanted).await;
        if !found.is_empty() {
            info!("{} '{}' subtitle(s) found for {}", found.len(), wanted.part2b(), media);
            let subtitles = found
                .into_iter()
                .map(|sub| SubtitleDescriptor {
                    id: match &sub.source {
                        Some(source) => format!("{} - {}", source, sub.id),
                        None => sub.id.clone(),
                    },
                    lang: wanted.part2b().to_string(),
                    ..sub
                })
                .collect();
            return RequestOutcome::only(subtitles);
        }

        if wanted == self.fallback {
            return RequestOutcome::only(Vec::new());
        }

        debug!("No '{}' subtitle for {}, trying '{}'", wanted.part2b(), media, self.fallback.part2b());
        let fallback_subs = self.search.search(&media, &self.fallback).await;
        if fallback_subs.is_empty() {
            info!("No subtitle at all for {}", media);
            return RequestOutcome::only(Vec::new());
        }

        let mut subtitles = Vec::with_capacity(fallback_subs.len() + 1);
        let mut job = None;

        if wanted == self.target {
            match self.offer_translation(&media, &fallback_subs[0]).await {
                Ok((descriptor, handle)) => {
                    subtitles.extend(descriptor);
                    job = handle;
                }
                Err(e) => warn!("Translation unavailable for {}: {}", media, e),
            }
        } else {
            debug!("Translations are only produced in '{}'", self.target);
        }

        subtitles.extend(fallback_subs.into_iter().map(|sub| SubtitleDescriptor {
            id: format!(
                "{}_{}_{}",
                sub.source.as_deref().unwrap_or("unknown"),
                self.fallback.part1(),
                sub.id
            ),
            url: sub.url,
            lang: self.fallback.part2b().to_string(),
            source: None,
            title: None,
            rating: None,
        }));

        info!("Returning {} subtitle(s) for {}", subtitles.len(), media);
        RequestOutcome { subtitles, job }
    }

    /// Translated descriptor if a track is servable, otherwise try to start a job
    async fn offer_translation(
        &self,
        media: &MediaId,
        best: &SubtitleDescriptor,
    ) -> Result<(Option<SubtitleDescriptor>, Option<JoinHandle<Option<String>>>), TranslationError> {
        let media_key = media.cache_key();

        if self.jobs.translation_available(&media_key).await? {
            info!("Translated track available for {}", media);
            let descriptor = SubtitleDescriptor {
                id: TRANSLATED_DESCRIPTOR_ID.to_string(),
                url: self.track_url(media),
                lang: self.target.part2b().to_string(),
                source: None,
                title: Some(TRANSLATED_DESCRIPTOR_TITLE.to_string()),
                rating: None,
            };
            return Ok((Some(descriptor), None));
        }

        if self.jobs.is_running(&media_key) {
            debug!("Translation of {} already in progress", media);
            return Ok((None, None));
        }

        if !self.jobs.backend().is_ready().await {
            info!("Translation backend not ready, skipping translation of {}", media);
            return Ok((None, None));
        }

        let ticket = match self.jobs.claim(&media_key) {
            Claim::Started(ticket) => ticket,
            Claim::AlreadyRunning => return Ok((None, None)),
        };

        info!("Starting background translation of {} from {}", media, best.url);
        let jobs = self.jobs.clone();
        let fetcher = self.fetcher.clone();
        let url = best.url.clone();

        let handle = tokio::spawn(async move {
            let raw = match fetcher.fetch(&url).await {
                Ok(raw) => raw,
                Err(e) => {
                    jobs.report_failure(ticket, &format!("cannot download {}: {}", url, e));
                    return None;
                }
            };
            match jobs.run_translation(ticket, &raw).await {
                Ok(content) => Some(content),
                Err(TranslationError::Cancelled(media)) => {
                    debug!("Background translation of {} superseded", media);
                    None
                }
                Err(e) => {
                    error!("Background translation failed: {}", e);
                    None
                }
            }
        });

        Ok((None, Some(handle)))
    }

    /// Stored translated tracks
    pub async fn cached_tracks(&self) -> Result<Vec<String>> {
        Ok(self.jobs.store().list().await?)
    }

    /// Remove the translated track of `media_id`
    pub async fn remove_cached(&self, media_id: &str) -> Result<()> {
        let media = MediaId::parse(media_id)?;
        let key = self.jobs.entry_key(&media.cache_key());
        self.jobs.store().delete(&key).await?;
        info!("Removed cached translation {}", key);
        Ok(())
    }

    /// Remove every stored track, returns how many were removed
    pub async fn clear_cache(&self) -> Result<usize> {
        let store = self.jobs.store();
        let keys = store.list().await?;
        for key in &keys {
            store.delete(key).await?;
        }
        info!("Removed {} cached translation(s)", keys.len());
        Ok(keys.len())
    }
}
