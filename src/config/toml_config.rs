use crate::core::ingest::DuplicateStrategy;
use crate::utils::error::{RosterError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "roster.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    pub storage: StorageConfig,
    pub allocation: AllocationConfig,
    pub ingest: IngestConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    pub snapshot_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            snapshot_file: "roster.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    pub default_capacity: usize,
    pub default_max_weeks: u32,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            default_capacity: 6,
            default_max_weeks: 6,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub duplicate_strategy: DuplicateStrategy,
    /// 額外視為無效的聯絡信箱 (除了 hoh / guest)
    pub extra_sentinel_emails: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: String,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "compact".to_string(),
            level: "info".to_string(),
        }
    }
}

impl RosterConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(RosterError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 檔案不存在時使用預設值
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(
                "Config file {} not found, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| RosterError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${ROSTER_DATA_DIR})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| RosterError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn snapshot_path(&self) -> PathBuf {
        Path::new(&self.storage.data_dir).join(&self.storage.snapshot_file)
    }

    pub fn is_json_logging(&self) -> bool {
        self.logging.format == "json"
    }
}

impl Validate for RosterConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("storage.data_dir", &self.storage.data_dir)?;
        validation::validate_env_resolved("storage.data_dir", &self.storage.data_dir)?;
        validation::validate_non_empty_string("storage.snapshot_file", &self.storage.snapshot_file)?;
        validation::validate_env_resolved("storage.snapshot_file", &self.storage.snapshot_file)?;
        validation::validate_positive_number("allocation.default_capacity", self.allocation.default_capacity, 1)?;
        validation::validate_range("allocation.default_max_weeks", self.allocation.default_max_weeks, 1, 52)?;
        validation::validate_one_of("logging.format", &self.logging.format, &["compact", "json"])?;
        validation::validate_one_of(
            "logging.level",
            &self.logging.level,
            &["trace", "debug", "info", "warn", "error"],
        )?;
        Ok(())
    }
}
