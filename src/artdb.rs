// src/artdb.rs

//! Cover art database client
//!
//! The database is a static file tree laid out as
//! `<base>/<FAMILY>/<GAME_ID>/<GAME_ID>_<TYPE>.png`. Fetching sits behind
//! [`ArtFetcher`] so downloads can run against any backend.

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::family::DiscFamily;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Public OPL art repository
pub const DEFAULT_ART_DATABASE_URL: &str =
    "https://raw.githubusercontent.com/Luden02/psx-ps2-opl-art-database/refs/heads/main";

/// Art types published per game: cover, icon and screenshot
pub const ART_KINDS: [&str; 3] = ["COV", "ICO", "SCR"];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `SLUS_203.12_COV.png`
pub fn art_file_name(game_id: &str, kind: &str) -> String {
    format!("{game_id}_{kind}.png")
}

/// Location of one art file in the database
pub fn art_url(base_url: &str, family: DiscFamily, game_id: &str, kind: &str) -> String {
    format!(
        "{}/{family}/{game_id}/{}",
        base_url.trim_end_matches('/'),
        art_file_name(game_id, kind)
    )
}

/// Source of art files
#[async_trait]
pub trait ArtFetcher: Send + Sync {
    /// Base URL that [`art_url`] builds on
    fn base_url(&self) -> &str;

    /// Fetch one file; a non-success status is an error
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// HTTP fetcher using reqwest
pub struct HttpArtFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl HttpArtFetcher {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("discshelf/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetcher for the configured database, or the public one
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings
                .art_database_url
                .as_deref()
                .unwrap_or(DEFAULT_ART_DATABASE_URL),
        )
    }
}

#[async_trait]
impl ArtFetcher for HttpArtFetcher {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let file_name = url.rsplit('/').next().unwrap_or(url);
        debug!(target: "artdb", "Fetching {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            Error::DownloadError(format!("Failed to download {file_name}: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::DownloadError(format!(
                "Failed to download {file_name}: {}",
                status.as_u16()
            )));
        }

        let data = response.bytes().await.map_err(|e| {
            Error::DownloadError(format!("Failed to read {file_name}: {e}"))
        })?;
        Ok(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_art_url_layout() {
        assert_eq!(
            art_url("https://art.test/db/", DiscFamily::Ps1, "SCUS_944.26", "ICO"),
            "https://art.test/db/PS1/SCUS_944.26/SCUS_944.26_ICO.png"
        );
        assert_eq!(
            art_url("https://art.test", DiscFamily::Ps2, "SLUS_203.12", "COV"),
            "https://art.test/PS2/SLUS_203.12/SLUS_203.12_COV.png"
        );
    }

    #[test]
    fn test_fetcher_base_url() {
        let fetcher = HttpArtFetcher::from_settings(&Settings::default()).unwrap();
        assert_eq!(fetcher.base_url(), DEFAULT_ART_DATABASE_URL);

        let settings = Settings {
            art_database_url: Some("http://127.0.0.1:8080/art/".to_string()),
            ..Default::default()
        };
        let fetcher = HttpArtFetcher::from_settings(&settings).unwrap();
        assert_eq!(fetcher.base_url(), "http://127.0.0.1:8080/art");
    }
}
