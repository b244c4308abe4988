// File-backed provider: one CSV per dataset and season under a directory,
// named `{weekly,seasonal,roster}_{season}.csv`.

use super::{parse_csv, Dataset, ProviderError, ProviderOptions, StatsProvider};
use crate::table::Table;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info};

pub struct CsvDirProvider {
    root: PathBuf,
    options: ProviderOptions,
}

impl CsvDirProvider {
    pub fn new(root: impl Into<PathBuf>, options: ProviderOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }

    pub fn path_for(&self, dataset: Dataset, season: u16) -> PathBuf {
        self.root
            .join(format!("{}_{}.csv", dataset.file_stem(), season))
    }
}

#[async_trait]
impl StatsProvider for CsvDirProvider {
    async fn fetch_season(&self, dataset: Dataset, season: u16) -> Result<Table, ProviderError> {
        if !self.root.is_dir() {
            return Err(ProviderError::Unavailable(format!(
                "data directory {} does not exist",
                self.root.display()
            )));
        }

        let path = self.path_for(dataset, season);
        debug!("reading {}", path.display());
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(%dataset, season, "no data file at {}; treating as not yet published", path.display());
                return Ok(Table::new());
            }
            Err(source) => {
                return Err(ProviderError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        parse_csv(bytes, self.options).map_err(|source| ProviderError::Csv {
            dataset,
            season,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Value;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gridstat_csv_dir_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn reads_dataset_file_for_season() {
        let dir = scratch_dir("reads");
        fs::write(
            dir.join("roster_2024.csv"),
            "player_id,full_name,team,position,season\n00-1,Test Player,KC,WR,2024\n",
        )
        .unwrap();

        let provider = CsvDirProvider::new(&dir, ProviderOptions::default());
        let t = provider.fetch_season(Dataset::Roster, 2024).await.unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.get(0, "full_name"), Some(Value::Str("Test Player".into())));

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_season_file_is_empty() {
        let dir = scratch_dir("missing");
        let provider = CsvDirProvider::new(&dir, ProviderOptions::default());
        let t = provider.fetch_season(Dataset::Weekly, 2031).await.unwrap();
        assert!(t.is_empty());
        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_directory_is_unavailable() {
        let dir = std::env::temp_dir().join("gridstat_csv_dir_does_not_exist_xyz");
        let provider = CsvDirProvider::new(&dir, ProviderOptions::default());
        let err = provider.fetch_season(Dataset::Seasonal, 2024).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[test]
    fn file_names_follow_dataset_and_season() {
        let provider = CsvDirProvider::new("/data", ProviderOptions::default());
        assert_eq!(
            provider.path_for(Dataset::Seasonal, 2023),
            PathBuf::from("/data/seasonal_2023.csv")
        );
    }
}
