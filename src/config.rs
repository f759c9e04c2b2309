use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use encoding_rs::Encoding;
use serde::Deserialize;

use crate::data::fetch::{Fetcher, UreqTransport};
use crate::data::filter::ExcludeRule;

/// File read from the working directory when no override is given.
pub const DEFAULT_CONFIG_FILE: &str = "stock_checker.toml";

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV_VAR: &str = "STOCK_CHECKER_CONFIG";

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DashboardConfig {
    pub download_host: String,
    /// IANA zone that freshness timestamps are shown in.
    pub timezone: String,
    pub timeout_secs: u64,
    pub cache_ttl_secs: u64,
    /// WHATWG label tried when a body is not UTF-8.
    pub fallback_encoding: String,
    pub datasets: Vec<DatasetConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    pub key: String,
    pub title: String,
    pub id: String,
    #[serde(default)]
    pub default_columns: Vec<String>,
    #[serde(default)]
    pub exclude: Option<ExcludeConfig>,
}

/// Rows whose `column` equals `value` are hidden unless the user opts in.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExcludeConfig {
    pub column: String,
    pub value: String,
    /// Checkbox label that re-includes the excluded rows.
    #[serde(default = "default_exclude_label")]
    pub label: String,
}

fn default_exclude_label() -> String {
    "Show excluded rows".to_string()
}

impl ExcludeConfig {
    pub fn rule(&self) -> ExcludeRule {
        ExcludeRule {
            column: self.column.clone(),
            value: self.value.clone(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        let stock_list_columns = [
            "銘柄コード",
            "銘柄名称",
            "現在値",
            "前日比",
            "前日比率",
            "出来高",
            "売買代金",
            "出来高加重平均",
            "時価総額",
            "PER",
            "PBR",
            "配当",
            "配当利率",
        ];
        Self {
            download_host: "drive.google.com".to_string(),
            timezone: "Asia/Tokyo".to_string(),
            timeout_secs: 30,
            cache_ttl_secs: 600,
            fallback_encoding: "Shift_JIS".to_string(),
            datasets: vec![
                DatasetConfig {
                    key: "stock_list".to_string(),
                    title: "銘柄一覧".to_string(),
                    id: "1nk01bicZkwvGbGTvNWYYMq4A-4dpUIbr".to_string(),
                    default_columns: stock_list_columns.iter().map(|s| s.to_string()).collect(),
                    exclude: Some(ExcludeConfig {
                        column: "33業種区分".to_string(),
                        value: "-".to_string(),
                        label: "ETFも表示する".to_string(),
                    }),
                },
                DatasetConfig {
                    key: "trading_value_top".to_string(),
                    title: "売買代金TOP100".to_string(),
                    id: "1XA33JiyavO8lyNNrg2NHlsJ0EJBJeOnm".to_string(),
                    default_columns: Vec::new(),
                    exclude: None,
                },
                DatasetConfig {
                    key: "volume_top".to_string(),
                    title: "出来高TOP100".to_string(),
                    id: "18OKlrHR1SvhgQD2RdY76wmpu8P4nUZt2".to_string(),
                    default_columns: Vec::new(),
                    exclude: None,
                },
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl DashboardConfig {
    /// Path from [`CONFIG_ENV_VAR`], else [`DEFAULT_CONFIG_FILE`].
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Load and validate `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        log::info!(
            "Loaded config {} ({} datasets)",
            path.display(),
            config.datasets.len()
        );
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: DashboardConfig = toml::from_str(text).context("invalid TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.timezone()?;
        self.fallback_encoding()?;
        for (i, ds) in self.datasets.iter().enumerate() {
            if ds.id.trim().is_empty() {
                return Err(anyhow!("dataset {i} ('{}') has an empty id", ds.key));
            }
            if self.datasets[..i].iter().any(|other| other.key == ds.key) {
                return Err(anyhow!("duplicate dataset key '{}'", ds.key));
            }
        }
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("unknown timezone '{}': {e}", self.timezone))
    }

    pub fn fallback_encoding(&self) -> Result<&'static Encoding> {
        Encoding::for_label(self.fallback_encoding.as_bytes())
            .with_context(|| format!("unknown encoding label '{}'", self.fallback_encoding))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Fetcher over the real network transport.
    pub fn build_fetcher(&self) -> Result<Fetcher> {
        Ok(Fetcher::new(
            Box::new(UreqTransport::new(self.timeout())),
            self.download_host.clone(),
            self.timezone()?,
            self.fallback_encoding()?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_describe_the_three_datasets() {
        let config = DashboardConfig::default();
        let keys: Vec<&str> = config.datasets.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, ["stock_list", "trading_value_top", "volume_top"]);
        assert_eq!(config.timezone().unwrap(), chrono_tz::Asia::Tokyo);
        assert_eq!(config.fallback_encoding().unwrap(), encoding_rs::SHIFT_JIS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let config = DashboardConfig::from_toml(
            r#"
            timezone = "UTC"
            timeout_secs = 10

            [[datasets]]
            key = "mine"
            title = "Mine"
            id = "abc123"
            default_columns = ["code"]

            [datasets.exclude]
            column = "sector"
            value = "-"
            "#,
        )
        .unwrap();

        assert_eq!(config.download_host, "drive.google.com");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.datasets.len(), 1);
        let exclude = config.datasets[0].exclude.as_ref().unwrap();
        assert_eq!(exclude.label, "Show excluded rows");
        assert_eq!(exclude.rule().column, "sector");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(DashboardConfig::from_toml("timezone = \"Mars/Olympus\"").is_err());
        assert!(DashboardConfig::from_toml("fallback_encoding = \"klingon\"").is_err());
        assert!(DashboardConfig::from_toml("colour = \"red\"").is_err());

        let dup = r#"
            [[datasets]]
            key = "a"
            title = "A"
            id = "x"
            [[datasets]]
            key = "a"
            title = "B"
            id = "y"
        "#;
        let err = DashboardConfig::from_toml(dup).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate dataset key"));
    }

    #[test]
    fn load_reads_file_and_tolerates_missing_one() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cache_ttl_secs = 5").unwrap();
        let config = DashboardConfig::load(file.path()).unwrap();
        assert_eq!(config.cache_ttl(), Duration::from_secs(5));

        let dir = tempfile::tempdir().unwrap();
        let missing = DashboardConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(missing, DashboardConfig::default());
    }
}
