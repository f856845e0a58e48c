//! Spend journal persistence
//!
//! Optional JSON audit trail of reservation records, kept outside
//! `CapsManager` so the accounting layer stays I/O-free. Newest records
//! first, truncated to the last 1000 per wallet.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::spending::SpendRecord;

const MAX_RECORDS_PER_WALLET: usize = 1000;

/// On-disk journal structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct JournalFile {
    #[serde(default = "default_version")]
    version: String,
    /// wallet_id → records, newest first
    #[serde(default)]
    wallets: HashMap<String, Vec<SpendRecord>>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// JSON-backed spend journal
pub struct SpendJournal {
    path: PathBuf,
}

impl SpendJournal {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Replace a wallet's journal entries with a snapshot of its records
    /// (oldest first, as `CapsManager` stores them)
    pub async fn save_wallet(&self, wallet_id: &str, records: &[SpendRecord]) -> Result<()> {
        let mut file = self.read_file().await?;

        let mut newest_first: Vec<SpendRecord> = records.iter().rev().cloned().collect();
        newest_first.truncate(MAX_RECORDS_PER_WALLET);
        file.wallets.insert(wallet_id.to_string(), newest_first);

        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::Serialization(format!("Failed to serialize journal: {}", e)))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| Error::Io(format!("Failed to write journal: {}", e)))?;

        debug!("Saved spend journal for wallet {}", wallet_id);
        Ok(())
    }

    /// Load a wallet's journal entries, newest first
    pub async fn load_wallet(&self, wallet_id: &str) -> Result<Vec<SpendRecord>> {
        let file = self.read_file().await?;
        Ok(file.wallets.get(wallet_id).cloned().unwrap_or_default())
    }

    /// Load every wallet's journal entries
    pub async fn load_all(&self) -> Result<HashMap<String, Vec<SpendRecord>>> {
        let file = self.read_file().await?;
        if !file.wallets.is_empty() {
            info!(
                "Loaded spend journal with {} wallets",
                file.wallets.len()
            );
        }
        Ok(file.wallets)
    }

    async fn read_file(&self) -> Result<JournalFile> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => serde_json::from_str(&content)
                .map_err(|e| Error::Deserialization(format!("Failed to parse journal: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(JournalFile::default()),
            Err(e) => Err(Error::Io(format!("Failed to read journal: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::spending::SpendKind;
    use chrono::Utc;
    use uuid::Uuid;

    fn record(amount: f64) -> SpendRecord {
        SpendRecord {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            amount_sol: amount,
            kind: SpendKind::Bundler,
            automation_id: None,
        }
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let journal = SpendJournal::new(dir.path().join("journal.json"));

        let records = vec![record(0.1), record(0.2), record(0.3)];
        journal.save_wallet("w1", &records).await.unwrap();

        let loaded = journal.load_wallet("w1").await.unwrap();
        assert_eq!(loaded.len(), 3);
        // Stored newest first
        assert!((loaded[0].amount_sol - 0.3).abs() < f64::EPSILON);
        assert!((loaded[2].amount_sol - 0.1).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let journal = SpendJournal::new(dir.path().join("missing.json"));
        assert!(journal.load_wallet("w1").await.unwrap().is_empty());
        assert!(journal.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wallets_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let journal = SpendJournal::new(dir.path().join("journal.json"));

        journal.save_wallet("w1", &[record(0.1)]).await.unwrap();
        journal.save_wallet("w2", &[record(0.2)]).await.unwrap();

        assert_eq!(journal.load_wallet("w1").await.unwrap().len(), 1);
        assert_eq!(journal.load_wallet("w2").await.unwrap().len(), 1);
        assert_eq!(journal.load_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_truncates_to_record_ceiling() {
        let dir = tempfile::tempdir().unwrap();
        let journal = SpendJournal::new(dir.path().join("journal.json"));

        let records: Vec<SpendRecord> = (0..1100).map(|i| record(i as f64)).collect();
        journal.save_wallet("w1", &records).await.unwrap();

        let loaded = journal.load_wallet("w1").await.unwrap();
        assert_eq!(loaded.len(), 1000);
        // Newest (highest amount) survive
        assert!((loaded[0].amount_sol - 1099.0).abs() < f64::EPSILON);
    }
}
