/*!
 * Media identity as requested by clients.
 *
 * Movies are `tt1234567`; series episodes append season and episode,
 * `tt1234567:1:2`.
 */

use std::fmt;
use std::str::FromStr;

use crate::errors::AppError;

/// Kind of content, as the subtitle catalogs name it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Movie,
    Series,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Movie => "movie",
            ContentType::Series => "series",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// IMDb-based identifier of a movie or an episode
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaId {
    imdb_id: String,
    season: Option<u32>,
    episode: Option<u32>,
}

impl MediaId {
    pub fn movie(imdb_id: impl Into<String>) -> Self {
        Self {
            imdb_id: imdb_id.into(),
            season: None,
            episode: None,
        }
    }

    pub fn for_episode(imdb_id: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            imdb_id: imdb_id.into(),
            season: Some(season),
            episode: Some(episode),
        }
    }

    /// Parse `tt123` or `tt123:S:E`
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let raw = raw.trim();
        let mut parts = raw.split(':');
        let imdb_id = parts.next().unwrap_or_default();

        let valid_imdb = imdb_id.len() > 2
            && imdb_id.starts_with("tt")
            && imdb_id[2..].chars().all(|c| c.is_ascii_digit());
        if !valid_imdb {
            return Err(AppError::InvalidMediaId(raw.to_string()));
        }

        let rest: Vec<&str> = parts.collect();
        match rest.as_slice() {
            [] => Ok(Self::movie(imdb_id)),
            [season, episode] => {
                let season = season
                    .parse()
                    .map_err(|_| AppError::InvalidMediaId(raw.to_string()))?;
                let episode = episode
                    .parse()
                    .map_err(|_| AppError::InvalidMediaId(raw.to_string()))?;
                Ok(Self::for_episode(imdb_id, season, episode))
            }
            _ => Err(AppError::InvalidMediaId(raw.to_string())),
        }
    }

    pub fn imdb_id(&self) -> &str {
        &self.imdb_id
    }

    /// Numeric part of the IMDb id, without the `tt` prefix
    pub fn imdb_digits(&self) -> &str {
        self.imdb_id.trim_start_matches("tt")
    }

    pub fn season(&self) -> Option<u32> {
        self.season
    }

    pub fn episode(&self) -> Option<u32> {
        self.episode
    }

    pub fn content_type(&self) -> ContentType {
        if self.season.is_some() {
            ContentType::Series
        } else {
            ContentType::Movie
        }
    }

    /// Filesystem-safe form: `tt123_1_2`
    pub fn cache_key(&self) -> String {
        match (self.season, self.episode) {
            (Some(s), Some(e)) => format!("{}_{}_{}", self.imdb_id, s, e),
            _ => self.imdb_id.clone(),
        }
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.season, self.episode) {
            (Some(s), Some(e)) => write!(f, "{}:{}:{}", self.imdb_id, s, e),
            _ => f.write_str(&self.imdb_id),
        }
    }
}

impl FromStr for MediaId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
