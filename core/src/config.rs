use crate::{
    error::{ReachError, ReachResult},
    types::CountryCode,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One entry of the country mapping. Only `cluster` and the segment ids are
/// modelled; anything else in the file (API keys etc.) is ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CountryConfig {
    pub cluster: String,
    #[serde(default)]
    pub segments: BTreeMap<String, String>,
}

/// Relative file locations under `<exports>/<date>/<country>/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutConfig {
    #[serde(default = "default_identity_file")]
    pub identity_file: String,
    #[serde(default = "default_messaging_file")]
    pub messaging_file: String,
    #[serde(default = "default_messaging_raw_dir")]
    pub messaging_raw_dir: String,
    #[serde(default = "default_invalid_users_file")]
    pub invalid_users_file: String,
}

fn default_identity_file() -> String {
    "mongo-processed/mongo-valid-users.csv".into()
}

fn default_messaging_file() -> String {
    "braze-processed/braze-valid-users.csv".into()
}

fn default_messaging_raw_dir() -> String {
    "braze-raw".into()
}

fn default_invalid_users_file() -> String {
    "braze-processed/braze-invalid-users.csv".into()
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            identity_file: default_identity_file(),
            messaging_file: default_messaging_file(),
            messaging_raw_dir: default_messaging_raw_dir(),
            invalid_users_file: default_invalid_users_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ReachConfigFile {
    countries: BTreeMap<CountryCode, CountryConfig>,
    #[serde(default)]
    layout: LayoutConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReachConfig {
    /// Ordered by country code so every run visits countries in the same order.
    pub countries: BTreeMap<CountryCode, CountryConfig>,
    pub layout: LayoutConfig,
}

impl ReachConfig {
    /// Load the country mapping from a JSON file.
    /// In tests, use ReachConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let file: ReachConfigFile = serde_json::from_str(&content)?;
        let config = Self {
            countries: file.countries,
            layout: file.layout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Config with hardcoded defaults for use in tests.
    pub fn default_test() -> Self {
        let mut countries = BTreeMap::new();
        for (code, cluster) in [("DE", "Europe"), ("FR", "Europe"), ("US", "Global")] {
            let segments = BTreeMap::from([
                ("validUsers".to_string(), format!("seg-{code}-valid")),
                ("emailAvailableUsers".to_string(), format!("seg-{code}-email")),
            ]);
            countries.insert(
                code.to_string(),
                CountryConfig {
                    cluster: cluster.into(),
                    segments,
                },
            );
        }
        Self {
            countries,
            layout: LayoutConfig::default(),
        }
    }

    pub fn country_codes(&self) -> impl Iterator<Item = &CountryCode> {
        self.countries.keys()
    }

    fn validate(&self) -> ReachResult<()> {
        if self.countries.is_empty() {
            return Err(ReachError::Config {
                reason: "no countries configured".into(),
            });
        }
        if let Some(code) = self.countries.keys().find(|c| c.trim().is_empty()) {
            return Err(ReachError::Config {
                reason: format!("blank country code {code:?}"),
            });
        }
        Ok(())
    }
}

/// Resolves the on-disk locations of one run's inputs and outputs.
#[derive(Debug, Clone)]
pub struct ExportLayout {
    pub exports_root: PathBuf,
    pub results_root: PathBuf,
    pub run_date: String,
    pub files: LayoutConfig,
}

impl ExportLayout {
    pub fn new(
        exports_root: impl Into<PathBuf>,
        results_root: impl Into<PathBuf>,
        run_date: impl Into<String>,
        files: LayoutConfig,
    ) -> Self {
        Self {
            exports_root: exports_root.into(),
            results_root: results_root.into(),
            run_date: run_date.into(),
            files,
        }
    }

    pub fn country_dir(&self, country: &str) -> PathBuf {
        self.exports_root.join(&self.run_date).join(country)
    }

    pub fn identity_file(&self, country: &str) -> PathBuf {
        self.country_dir(country).join(&self.files.identity_file)
    }

    pub fn messaging_file(&self, country: &str) -> PathBuf {
        self.country_dir(country).join(&self.files.messaging_file)
    }

    /// Accounts the messaging platform marked invalid, input to account cleanup.
    pub fn invalid_users_file(&self, country: &str) -> PathBuf {
        self.country_dir(country).join(&self.files.invalid_users_file)
    }

    /// Directory holding one sub-directory of JSON-lines dumps per segment.
    pub fn segment_dump_dir(&self, country: &str) -> PathBuf {
        self.country_dir(country).join(&self.files.messaging_raw_dir)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.results_root.join(&self.run_date)
    }

    pub fn detail_file(&self, country: &str) -> PathBuf {
        self.results_dir().join(format!("{country}-result.csv"))
    }

    pub fn orphan_file(&self, country: &str) -> PathBuf {
        self.results_dir().join(format!("{country}-orphans.txt"))
    }

    pub fn summary_file(&self) -> PathBuf {
        self.results_dir().join("summary.csv")
    }
}
