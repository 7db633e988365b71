/*!
 * Clients for the remote services subai talks to.
 *
 * - `ollama`: local LLM server used as the translation backend
 * - `opensubtitles`: subtitle search catalogs and the track fetcher
 * - `mock`: scripted doubles for tests and offline runs
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::errors::ProviderError;
use crate::language_utils::LanguagePreference;
use crate::media::MediaId;

/// Common trait for LLM providers
///
/// This trait defines the interface that provider implementations must follow,
/// allowing them to be used interchangeably by the translation backend.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// The request type for this provider
    type Request: Send + Sync;

    /// The response type for this provider
    type Response: Send + Sync;

    /// Complete a request using this provider
    async fn complete(&self, request: Self::Request) -> Result<Self::Response, ProviderError>;

    /// Extract text from the provider response
    fn extract_text(response: &Self::Response) -> String;
}

/// A subtitle candidate returned by a search source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleDescriptor {
    pub id: String,
    pub url: String,
    /// ISO 639-2/B code, as the catalogs report it
    pub lang: String,
    /// Display name of the catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
}

/// Search catalog for subtitle tracks
#[async_trait]
pub trait SubtitleSource: Send + Sync {
    /// Short name used in logs and descriptor ids
    fn name(&self) -> &str;

    /// Candidates for `media` in `language`
    async fn search(
        &self,
        media: &MediaId,
        language: &LanguagePreference,
    ) -> Result<Vec<SubtitleDescriptor>, ProviderError>;
}

/// Downloads the raw text of a track
#[async_trait]
pub trait TrackFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, ProviderError>;
}

pub mod mock;
pub mod ollama;
pub mod opensubtitles;
