use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tokio::fs;

use crate::models::{tuple_key, CommissionRate, Id, SpendEntry};

use super::{EntryFilter, Storage};

/// JSON file-based storage implementation.
///
/// Directory structure:
/// ```text
/// data/
///   rates/
///     {id}.json
///   entries/
///     {tuple-id}.json
/// ```
///
/// Entry file names are the deterministic id of the (offer, date, identity)
/// tuple, so an upsert for an existing tuple overwrites one file.
pub struct JsonFileStorage {
    base_path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn rates_dir(&self) -> PathBuf {
        self.base_path.join("rates")
    }

    fn entries_dir(&self) -> PathBuf {
        self.base_path.join("entries")
    }

    fn rate_file(&self, id: &Id) -> PathBuf {
        self.rates_dir().join(format!("{id}.json"))
    }

    fn entry_file(&self, id: &Id) -> PathBuf {
        self.entries_dir().join(format!("{id}.json"))
    }

    async fn write_json<T: serde::Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(value)?;
        fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    async fn read_json<T: serde::de::DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match fs::read_to_string(path).await {
            Ok(contents) => {
                let value = serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse {}", path.display()))?;
                Ok(Some(value))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    /// Read every JSON document in a directory, skipping files that fail to
    /// parse so one corrupt record does not take the whole listing down.
    async fn read_dir_json<T: serde::de::DeserializeOwned>(&self, dir: &Path) -> Result<Vec<T>> {
        let mut out = Vec::new();
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to list {}", dir.display()))
            }
        };
        while let Some(dirent) = entries
            .next_entry()
            .await
            .with_context(|| format!("Failed to list {}", dir.display()))?
        {
            let path = dirent.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read_json::<T>(&path).await {
                Ok(Some(value)) => out.push(value),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "Skipping unreadable record");
                }
            }
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl Storage for JsonFileStorage {
    async fn list_rates(&self) -> Result<Vec<CommissionRate>> {
        let mut rates: Vec<CommissionRate> = self.read_dir_json(&self.rates_dir()).await?;
        rates.sort_by(|a, b| a.agency.cmp(&b.agency));
        Ok(rates)
    }

    async fn get_rate(&self, id: &Id) -> Result<Option<CommissionRate>> {
        self.read_json(&self.rate_file(id)).await
    }

    async fn find_rate_by_agency(&self, agency: &str) -> Result<Option<CommissionRate>> {
        let rates = self.list_rates().await?;
        Ok(rates.into_iter().find(|r| r.agency == agency))
    }

    async fn save_rate(&self, rate: &CommissionRate) -> Result<()> {
        self.write_json(&self.rate_file(&rate.id), rate).await
    }

    async fn delete_rate(&self, id: &Id) -> Result<bool> {
        match fs::remove_file(self.rate_file(id)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to delete commission rate {id}"))
            }
        }
    }

    async fn find_entry(
        &self,
        offer_id: i64,
        date: NaiveDate,
        identity: &str,
    ) -> Result<Option<SpendEntry>> {
        let id = Id::from_external(&tuple_key(offer_id, date, identity));
        self.read_json(&self.entry_file(&id)).await
    }

    async fn save_entry(&self, entry: &SpendEntry) -> Result<()> {
        self.write_json(&self.entry_file(&entry.storage_id()), entry)
            .await
    }

    async fn query_entries(&self, filter: &EntryFilter) -> Result<Vec<SpendEntry>> {
        let entries: Vec<SpendEntry> = self.read_dir_json(&self.entries_dir()).await?;
        Ok(entries.into_iter().filter(|e| filter.matches(e)).collect())
    }
}
