// HTTP provider for published per-season CSV releases.

use super::{parse_csv, Dataset, ProviderError, ProviderOptions, StatsProvider};
use crate::table::Table;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const RELEASES: &str = "https://github.com/nflverse/nflverse-data/releases/download";

/// Download URL per dataset. `{season}` is replaced with the season year.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UrlTemplates {
    pub weekly: String,
    pub seasonal: String,
    pub roster: String,
}

impl Default for UrlTemplates {
    fn default() -> Self {
        Self {
            weekly: format!("{RELEASES}/player_stats/player_stats_{{season}}.csv"),
            seasonal: format!("{RELEASES}/player_stats/player_stats_season_{{season}}.csv"),
            roster: format!("{RELEASES}/rosters/roster_{{season}}.csv"),
        }
    }
}

impl UrlTemplates {
    pub fn template(&self, dataset: Dataset) -> &str {
        match dataset {
            Dataset::Weekly => &self.weekly,
            Dataset::Seasonal => &self.seasonal,
            Dataset::Roster => &self.roster,
        }
    }

    pub fn url_for(&self, dataset: Dataset, season: u16) -> String {
        self.template(dataset).replace("{season}", &season.to_string())
    }
}

pub struct HttpProvider {
    client: reqwest::Client,
    urls: UrlTemplates,
    options: ProviderOptions,
}

impl HttpProvider {
    pub fn new(urls: UrlTemplates, timeout: Duration, options: ProviderOptions) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProviderError::Client)?;
        Ok(Self {
            client,
            urls,
            options,
        })
    }
}

#[async_trait]
impl StatsProvider for HttpProvider {
    async fn fetch_season(&self, dataset: Dataset, season: u16) -> Result<Table, ProviderError> {
        let url = self.urls.url_for(dataset, season);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ProviderError::Request {
                dataset,
                season,
                source,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            info!(%dataset, season, "no release published yet");
            return Ok(Table::new());
        }
        if !status.is_success() {
            return Err(ProviderError::Status {
                dataset,
                season,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| ProviderError::Request {
            dataset,
            season,
            source,
        })?;
        parse_csv(body.to_vec(), self.options).map_err(|source| ProviderError::Csv {
            dataset,
            season,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_templates_substitute_season() {
        let urls = UrlTemplates::default();
        assert_eq!(
            urls.url_for(Dataset::Weekly, 2024),
            "https://github.com/nflverse/nflverse-data/releases/download/player_stats/player_stats_2024.csv"
        );
        assert!(urls.url_for(Dataset::Roster, 2019).ends_with("/rosters/roster_2019.csv"));
        assert!(urls.url_for(Dataset::Seasonal, 2020).ends_with("player_stats_season_2020.csv"));
    }

    #[test]
    fn custom_templates_deserialize_with_defaults() {
        let urls: UrlTemplates = toml::from_str(r#"weekly = "http://localhost/w/{season}.csv""#).unwrap();
        assert_eq!(urls.url_for(Dataset::Weekly, 2022), "http://localhost/w/2022.csv");
        assert_eq!(urls.roster, UrlTemplates::default().roster);
    }

    #[test]
    fn client_builds_with_timeout() {
        let provider = HttpProvider::new(
            UrlTemplates::default(),
            Duration::from_secs(5),
            ProviderOptions::default(),
        );
        assert!(provider.is_ok());
    }
}
