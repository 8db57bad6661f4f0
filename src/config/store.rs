use std::env;
use std::path::PathBuf;

const DEFAULT_REPORTS_FILE: &str = "./data/reports.json";

#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// JSON file holding the whole report collection
    pub data_file: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(DEFAULT_REPORTS_FILE),
        }
    }
}

impl StoreConfig {
    pub fn from_env() -> Self {
        let data_file = env::var("REPORTS_FILE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORTS_FILE));

        Self { data_file }
    }
}
