use serde::Deserialize;

use crate::buffer::replacer::DEFAULT_REPLACER_K;
use crate::container::hash::DEFAULT_BUCKET_SIZE;
use crate::error::Result;
use crate::storage::StorageType;

#[derive(Debug, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
        }
    }
}

#[derive(Debug, PartialEq, Deserialize)]
pub struct Config {
    pub log_level: LogLevel,
    pub storage_type: StorageType,
    /// Path of the database file, only used when storage_type is File.
    pub db_path: String,
    /// Number of frames in the buffer pool.
    pub pool_size: usize,
    /// The lookback constant k of the LRU-K replacer.
    pub replacer_k: usize,
    /// Entry capacity of each page table bucket.
    pub bucket_size: usize,
}

impl Config {
    pub fn new(file: &str) -> Result<Config> {
        let mut cfg = config::Config::builder()
            .set_default("log_level", "debug")?
            .set_default("storage_type", "memory")?
            .set_default("db_path", "pagepool.db")?
            .set_default("pool_size", 64)?
            .set_default("replacer_k", DEFAULT_REPLACER_K as i64)?
            .set_default("bucket_size", DEFAULT_BUCKET_SIZE as i64)?;
        if !file.is_empty() {
            cfg = cfg.add_source(config::File::with_name(file))
        }
        cfg = cfg.add_source(config::Environment::with_prefix("PAGEPOOL"));
        Ok(cfg.build()?.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() -> Result<()> {
        let cfg = Config::new("")?;
        assert_eq!(LogLevel::Debug, cfg.log_level);
        assert_eq!(StorageType::Memory, cfg.storage_type);
        assert_eq!(64, cfg.pool_size);
        assert_eq!(2, cfg.replacer_k);
        assert_eq!(4, cfg.bucket_size);
        Ok(())
    }
}
