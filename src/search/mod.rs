/*!
 * Subtitle search across every configured catalog.
 *
 * Sources are queried concurrently; a failing source is logged and
 * contributes nothing. Each source's answer is cached per media and
 * language.
 */

use std::sync::Arc;

use futures::future::join_all;
use log::{debug, warn};

use crate::language_utils::LanguagePreference;
use crate::media::MediaId;
use crate::providers::{SubtitleDescriptor, SubtitleSource};

pub use self::cache::{CacheStats, SearchCache, search_key};

pub mod cache;

/// Fan-out search over a set of sources
#[derive(Clone)]
pub struct SearchService {
    sources: Vec<Arc<dyn SubtitleSource>>,
    cache: SearchCache,
}

impl SearchService {
    pub fn new(sources: Vec<Arc<dyn SubtitleSource>>, cache: SearchCache) -> Self {
        Self { sources, cache }
    }

    pub fn cache(&self) -> &SearchCache {
        &self.cache
    }

    /// Results of every source for `media` in `language`, in source order
    pub async fn search(&self, media: &MediaId, language: &LanguagePreference) -> Vec<SubtitleDescriptor> {
        let searches = self
            .sources
            .iter()
            .map(|source| self.search_one(source.as_ref(), media, language));

        let results: Vec<SubtitleDescriptor> = join_all(searches).await.into_iter().flatten().collect();
        debug!(
            "Found {} '{}' subtitle(s) for {} across {} source(s)",
            results.len(),
            language.part2b(),
            media,
            self.sources.len()
        );
        results
    }

    async fn search_one(
        &self,
        source: &dyn SubtitleSource,
        media: &MediaId,
        language: &LanguagePreference,
    ) -> Vec<SubtitleDescriptor> {
        let key = search_key(source.name(), media, language.part2b());
        if let Some(results) = self.cache.get(&key) {
            return results;
        }

        match source.search(media, language).await {
            Ok(results) => {
                self.cache.store(&key, &results);
                results
            }
            Err(e) => {
                warn!("{} search for {} failed: {}", source.name(), media, e);
                Vec::new()
            }
        }
    }
}
