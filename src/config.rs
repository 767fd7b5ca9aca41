use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, IoContext, Result};
use crate::query::Operator;

pub const DEFAULT_MERGE_FACTOR: usize = 10;
pub const DEFAULT_MAX_BUFFERED_DOCS: usize = 1000;
pub const WRITE_LOCK_TIMEOUT_MS: u64 = 1000;
pub const COMMIT_LOCK_TIMEOUT_MS: u64 = 10_000;

/// Tunables of an index. Persisted in `index_meta` on creation and loadable
/// from JSON, where missing keys take their defaults.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    pub max_buffered_docs: usize,
    pub merge_factor: usize,
    pub max_merge_docs: u64,
    pub write_lock_timeout_ms: u64,
    pub commit_lock_timeout_ms: u64,
    pub lock_poll_interval_ms: u64,
    pub disable_locks: bool,
    pub default_operator: Operator,
    pub default_field: String,
    pub analyzer: String,
    /// Extra fields the query parser treats as keywords, next to `uri`.
    pub keyword_fields: Vec<String>,
    /// gzip level for stored fields, 0-9.
    pub stored_compression: u32,
    pub auto_commit: bool,
    pub auto_merge: bool,
    pub commit_delay_ms: u64,
}

impl Default for IndexConfig {
    fn default() -> IndexConfig {
        IndexConfig {
            max_buffered_docs: DEFAULT_MAX_BUFFERED_DOCS,
            merge_factor: DEFAULT_MERGE_FACTOR,
            max_merge_docs: i32::MAX as u64,
            write_lock_timeout_ms: WRITE_LOCK_TIMEOUT_MS,
            commit_lock_timeout_ms: COMMIT_LOCK_TIMEOUT_MS,
            lock_poll_interval_ms: 1000,
            disable_locks: false,
            default_operator: Operator::Or,
            default_field: "text".to_string(),
            analyzer: "uax29".to_string(),
            keyword_fields: Vec::new(),
            stored_compression: 6,
            auto_commit: true,
            auto_merge: true,
            commit_delay_ms: 500,
        }
    }
}

impl IndexConfig {
    pub fn from_json_file(path: &Path) -> Result<IndexConfig> {
        let file = File::open(path).at("open config", path)?;
        let config: IndexConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<IndexConfig> {
        let config: IndexConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.merge_factor < 2 {
            return Err(Error::InvalidConfig(format!(
                "merge_factor must be at least 2, got {}",
                self.merge_factor
            )));
        }
        if self.max_buffered_docs == 0 {
            return Err(Error::InvalidConfig(
                "max_buffered_docs must be positive".to_string(),
            ));
        }
        if self.stored_compression > 9 {
            return Err(Error::InvalidConfig(format!(
                "stored_compression must be 0-9, got {}",
                self.stored_compression
            )));
        }
        if crate::analysis::for_name(&self.analyzer).is_none() {
            return Err(Error::InvalidConfig(format!(
                "unknown analyzer {:?}",
                self.analyzer
            )));
        }
        Ok(())
    }

    pub fn write_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.write_lock_timeout_ms)
    }

    pub fn commit_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_lock_timeout_ms)
    }

    pub fn lock_poll_interval(&self) -> Duration {
        Duration::from_millis(self.lock_poll_interval_ms)
    }

    pub fn commit_delay(&self) -> Duration {
        Duration::from_millis(self.commit_delay_ms)
    }

    pub fn is_keyword_field(&self, field: &str) -> bool {
        field == crate::document::URI_FIELD || self.keyword_fields.iter().any(|f| f == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let config = IndexConfig::from_json_str(r#"{"merge_factor": 4, "default_operator": "and"}"#)
            .unwrap();
        assert_eq!(4, config.merge_factor);
        assert_eq!(Operator::And, config.default_operator);
        assert_eq!(WRITE_LOCK_TIMEOUT_MS, config.write_lock_timeout_ms);
        assert_eq!(Duration::from_secs(10), config.commit_lock_timeout());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(IndexConfig::from_json_str(r#"{"merge_factor": 1}"#).is_err());
        assert!(IndexConfig::from_json_str(r#"{"analyzer": "klingon"}"#).is_err());
        assert!(IndexConfig::from_json_str(r#"{"stored_compression": 12}"#).is_err());
    }

    #[test]
    fn uri_is_always_keyword() {
        let mut config = IndexConfig::default();
        assert!(config.is_keyword_field("uri"));
        assert!(!config.is_keyword_field("mime"));
        config.keyword_fields.push("mime".to_string());
        assert!(config.is_keyword_field("mime"));
    }
}
