/*!
 * OpenSubtitles catalogs and the HTTP track fetcher.
 *
 * Two catalogs are queried:
 * - the Stremio OpenSubtitles proxy (`/subtitles/{type}/{id}.json`)
 * - the legacy OpenSubtitles REST API (`/search/imdbid-N/sublanguageid-L`)
 */

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use std::time::Duration;

use crate::app_config::SearchConfig;
use crate::errors::ProviderError;
use crate::language_utils::LanguagePreference;
use crate::media::MediaId;

use super::{SubtitleDescriptor, SubtitleSource, TrackFetcher};

/// Results kept from the Stremio proxy
const STREMIO_MAX_RESULTS: usize = 10;

/// Results kept from the legacy API
const LEGACY_MAX_RESULTS: usize = 5;

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const FETCHER_USER_AGENT: &str = concat!("SubAI/", env!("CARGO_PKG_VERSION"));

/// Catalog display name
const SOURCE_NAME: &str = "OpenSubtitles";

fn build_client(timeout: Duration, headers: HeaderMap) -> Client {
    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .unwrap_or_default()
}

fn header(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static("SubAI"))
}

async fn get_checked(client: &Client, url: &str) -> Result<reqwest::Response, ProviderError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::ApiError {
            status_code: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        });
    }
    Ok(response)
}

#[derive(Debug, Deserialize)]
struct StremioResponse {
    #[serde(default)]
    subtitles: Vec<StremioSubtitle>,
}

#[derive(Debug, Deserialize)]
struct StremioSubtitle {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    lang: Option<String>,
}

/// Stremio OpenSubtitles proxy
#[derive(Debug, Clone)]
pub struct StremioOpenSubtitles {
    base_url: String,
    client: Client,
}

impl StremioOpenSubtitles {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_client(timeout, headers),
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(&config.stremio_base_url, config.timeout())
    }

    pub fn search_url(&self, media: &MediaId) -> String {
        format!("{}/subtitles/{}/{}.json", self.base_url, media.content_type(), media)
    }

    /// Keep entries in `lang`, at most ten
    pub fn parse_results(body: &str, lang: &str) -> Result<Vec<SubtitleDescriptor>, ProviderError> {
        let response: StremioResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(response
            .subtitles
            .into_iter()
            .filter(|s| s.lang.as_deref() == Some(lang))
            .take(STREMIO_MAX_RESULTS)
            .enumerate()
            .filter_map(|(index, item)| {
                let url = item.url.filter(|u| !u.is_empty())?;
                let id = match item.id {
                    Some(serde_json::Value::String(id)) if !id.is_empty() => id,
                    Some(serde_json::Value::Number(id)) => id.to_string(),
                    _ => index.to_string(),
                };
                Some(SubtitleDescriptor {
                    id: format!("opensubtitles_{}", id),
                    url,
                    lang: lang.to_string(),
                    source: Some(SOURCE_NAME.to_string()),
                    title: None,
                    rating: None,
                })
            })
            .collect())
    }
}

#[async_trait]
impl SubtitleSource for StremioOpenSubtitles {
    fn name(&self) -> &str {
        "opensubtitles"
    }

    async fn search(
        &self,
        media: &MediaId,
        language: &LanguagePreference,
    ) -> Result<Vec<SubtitleDescriptor>, ProviderError> {
        let url = self.search_url(media);
        debug!("Searching {} ({})", url, language.part2b());

        let body = get_checked(&self.client, &url).await?.text().await?;
        Self::parse_results(&body, language.part2b())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LegacySubtitle {
    #[serde(default, rename = "IDSubtitleFile")]
    id_subtitle_file: Option<String>,
    #[serde(default)]
    sub_download_link: Option<String>,
    #[serde(default)]
    sub_rating: Option<String>,
}

/// OpenSubtitles legacy REST API
#[derive(Debug, Clone)]
pub struct LegacyOpenSubtitles {
    base_url: String,
    client: Client,
}

impl LegacyOpenSubtitles {
    pub fn new(base_url: impl Into<String>, user_agent: &str, timeout: Duration) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header(user_agent));
        headers.insert("X-User-Agent", header(user_agent));
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_client(timeout, headers),
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(&config.legacy_base_url, &config.legacy_user_agent, config.timeout())
    }

    pub fn search_url(&self, media: &MediaId, lang: &str) -> String {
        let mut url = format!(
            "{}/search/imdbid-{}/sublanguageid-{}",
            self.base_url,
            media.imdb_digits(),
            lang
        );
        if let (Some(season), Some(episode)) = (media.season(), media.episode()) {
            url.push_str(&format!("/season-{}/episode-{}", season, episode));
        }
        url
    }

    /// First five entries with a download link
    pub fn parse_results(body: &str, lang: &str) -> Result<Vec<SubtitleDescriptor>, ProviderError> {
        let items: Vec<LegacySubtitle> = serde_json::from_str(body)
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(items
            .into_iter()
            .take(LEGACY_MAX_RESULTS)
            .enumerate()
            .filter_map(|(index, item)| {
                let url = item.sub_download_link?.replacen(".gz", "", 1);
                if url.is_empty() {
                    return None;
                }
                let id = item
                    .id_subtitle_file
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| index.to_string());
                Some(SubtitleDescriptor {
                    id: format!("oslegacy_{}", id),
                    url,
                    lang: lang.to_string(),
                    source: Some(SOURCE_NAME.to_string()),
                    title: None,
                    rating: Some(
                        item.sub_rating
                            .and_then(|r| r.trim().parse::<f32>().ok())
                            .unwrap_or(0.0),
                    ),
                })
            })
            .collect())
    }
}

#[async_trait]
impl SubtitleSource for LegacyOpenSubtitles {
    fn name(&self) -> &str {
        "oslegacy"
    }

    async fn search(
        &self,
        media: &MediaId,
        language: &LanguagePreference,
    ) -> Result<Vec<SubtitleDescriptor>, ProviderError> {
        let url = self.search_url(media, language.part2b());
        debug!("Searching {}", url);

        let body = get_checked(&self.client, &url).await?.text().await?;
        Self::parse_results(&body, language.part2b())
    }
}

/// Downloads tracks over HTTP
#[derive(Debug, Clone)]
pub struct HttpTrackFetcher {
    client: Client,
}

impl HttpTrackFetcher {
    pub fn new(timeout: Duration) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(FETCHER_USER_AGENT));
        Self {
            client: build_client(timeout, headers),
        }
    }
}

#[async_trait]
impl TrackFetcher for HttpTrackFetcher {
    async fn fetch(&self, url: &str) -> Result<String, ProviderError> {
        url::Url::parse(url).map_err(|e| ProviderError::RequestFailed(format!("{}: {}", url, e)))?;
        let body = get_checked(&self.client, url).await?.text().await?;
        debug!("Downloaded {} bytes from {}", body.len(), url);
        Ok(body)
    }
}
