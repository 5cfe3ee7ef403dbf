use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::browser::PortalSelectors;
use crate::error::{CdaError, Result};
use crate::models::Credentials;

/// 重复 CDA 的处理方式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// 每次出现都处理一遍
    #[default]
    ProcessEach,
    /// 只处理第一次出现
    ProcessOnce,
}

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// CDA 清单文件
    pub list_file: Option<PathBuf>,
    /// 门户登录凭据
    pub credentials: Credentials,
    /// 浏览器下载目录，归档目录也建在这里
    pub download_dir: PathBuf,
    /// 新台账的存放目录
    pub log_dir: PathBuf,
    /// 运行日志文件
    pub output_log_file: String,
    /// 是否续跑（跳过台账中已成功的 CDA）
    pub continuation: bool,
    /// 续跑时使用的台账
    pub ledger_path: Option<PathBuf>,
    // --- 重试与等待 ---
    pub max_retries: u32,
    pub retry_pause_ms: u64,
    pub settle_pause_ms: u64,
    pub element_timeout_secs: u64,
    pub download_wait_secs: u64,
    // --- 归档 ---
    pub artifact_extension: String,
    pub duplicate_policy: DuplicatePolicy,
    // --- 浏览器 ---
    pub headless: bool,
    pub chrome_executable: Option<PathBuf>,
    /// 启动浏览器时使用的用户数据目录，默认在系统临时目录下
    pub browser_profile_dir: Option<PathBuf>,
    /// 设置后连接已打开的浏览器，而不是启动新的
    pub browser_debug_port: Option<u16>,
    pub portal_url: String,
    pub selectors: PortalSelectors,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            list_file: None,
            credentials: Credentials::default(),
            download_dir: default_download_dir(),
            log_dir: PathBuf::from("logs"),
            output_log_file: "log.txt".to_string(),
            continuation: false,
            ledger_path: None,
            max_retries: 1,
            retry_pause_ms: 500,
            settle_pause_ms: 1000,
            element_timeout_secs: 15,
            download_wait_secs: 30,
            artifact_extension: "pdf".to_string(),
            duplicate_policy: DuplicatePolicy::ProcessEach,
            headless: true,
            chrome_executable: None,
            browser_profile_dir: None,
            browser_debug_port: None,
            portal_url: "https://sitafeweb.sefin.ro.gov.br/projudi".to_string(),
            selectors: PortalSelectors::default(),
        }
    }
}

impl Config {
    /// 先读 `CDA_CONFIG` 指向的 TOML 文件（如有），再用环境变量覆盖
    pub fn load() -> Result<Self> {
        let base = match std::env::var("CDA_CONFIG") {
            Ok(path) => Self::from_toml_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        Ok(base.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CdaError::Config(format!("无法读取配置文件 {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
            .map_err(|e| CdaError::Config(format!("无法解析配置文件 {}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 用 `lookup` 提供的键值覆盖当前配置
    pub fn with_overrides(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let path = |key: &str| lookup(key).filter(|v| !v.trim().is_empty()).map(PathBuf::from);

        Self {
            list_file: path("CDA_LIST_FILE").or(self.list_file),
            credentials: Credentials {
                username: lookup("CDA_USERNAME").unwrap_or(self.credentials.username),
                password: lookup("CDA_PASSWORD").unwrap_or(self.credentials.password),
            },
            download_dir: path("CDA_DOWNLOAD_DIR").unwrap_or(self.download_dir),
            log_dir: path("CDA_LOG_DIR").unwrap_or(self.log_dir),
            output_log_file: lookup("OUTPUT_LOG_FILE").unwrap_or(self.output_log_file),
            continuation: parsed(&lookup, "CDA_CONTINUE").unwrap_or(self.continuation),
            ledger_path: path("CDA_LEDGER_PATH").or(self.ledger_path),
            max_retries: parsed(&lookup, "MAX_RETRIES").unwrap_or(self.max_retries),
            retry_pause_ms: parsed(&lookup, "RETRY_PAUSE_MS").unwrap_or(self.retry_pause_ms),
            settle_pause_ms: parsed(&lookup, "SETTLE_PAUSE_MS").unwrap_or(self.settle_pause_ms),
            element_timeout_secs: parsed(&lookup, "ELEMENT_TIMEOUT_SECS").unwrap_or(self.element_timeout_secs),
            download_wait_secs: parsed(&lookup, "DOWNLOAD_WAIT_SECS").unwrap_or(self.download_wait_secs),
            artifact_extension: lookup("ARTIFACT_EXTENSION").unwrap_or(self.artifact_extension),
            duplicate_policy: match parsed::<bool>(&lookup, "DEDUPLICATE") {
                Some(true) => DuplicatePolicy::ProcessOnce,
                Some(false) => DuplicatePolicy::ProcessEach,
                None => self.duplicate_policy,
            },
            headless: parsed(&lookup, "HEADLESS").unwrap_or(self.headless),
            chrome_executable: path("CHROME_EXECUTABLE").or(self.chrome_executable),
            browser_profile_dir: path("BROWSER_PROFILE_DIR").or(self.browser_profile_dir),
            browser_debug_port: parsed(&lookup, "BROWSER_DEBUG_PORT").or(self.browser_debug_port),
            portal_url: lookup("PORTAL_URL").unwrap_or(self.portal_url),
            selectors: self.selectors,
        }
    }

    /// 运行前检查配置
    pub fn validate(&self) -> Result<()> {
        if self.element_timeout_secs == 0 {
            return Err(CdaError::Config("element_timeout_secs 必须大于 0".into()));
        }
        if self.max_retries > 10 {
            return Err(CdaError::Config(format!(
                "max_retries 不能超过 10 (当前: {})",
                self.max_retries
            )));
        }
        if self.artifact_extension.trim_start_matches('.').trim().is_empty() {
            return Err(CdaError::Config("artifact_extension 不能为空".into()));
        }
        if self.continuation && self.ledger_path.is_none() {
            return Err(CdaError::Config("续跑模式需要指定 ledger_path".into()));
        }
        Ok(())
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.element_timeout_secs)
    }

    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }

    pub fn settle_pause(&self) -> Duration {
        Duration::from_millis(self.settle_pause_ms)
    }

    pub fn download_wait(&self) -> Duration {
        Duration::from_secs(self.download_wait_secs)
    }

    pub fn profile_dir(&self) -> PathBuf {
        self.browser_profile_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("cda_downloader_profile"))
    }

    /// 不带点的小写扩展名
    pub fn artifact_extension(&self) -> String {
        self.artifact_extension
            .trim()
            .trim_start_matches('.')
            .to_ascii_lowercase()
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|raw| raw.trim().parse().ok())
}

fn default_download_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Downloads")
        .join("CDAs")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_retries, 1);
        assert!(!config.continuation);
        assert_eq!(config.artifact_extension(), "pdf");
        assert!(config.download_dir.ends_with("Downloads/CDAs"));
        assert!(config.profile_dir().ends_with("cda_downloader_profile"));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("CDA_USERNAME", "12345678900"),
            ("CDA_PASSWORD", "senha"),
            ("MAX_RETRIES", "2"),
            ("CDA_CONTINUE", "true"),
            ("CDA_LEDGER_PATH", "logs/ledger.csv"),
            ("DEDUPLICATE", "true"),
            ("BROWSER_PROFILE_DIR", "/tmp/cda-profile"),
            ("ELEMENT_TIMEOUT_SECS", "not-a-number"),
        ]);
        let config = Config::default().with_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.credentials.username, "12345678900");
        assert_eq!(config.max_retries, 2);
        assert!(config.continuation);
        assert_eq!(config.ledger_path, Some(PathBuf::from("logs/ledger.csv")));
        assert_eq!(config.duplicate_policy, DuplicatePolicy::ProcessOnce);
        assert_eq!(config.profile_dir(), PathBuf::from("/tmp/cda-profile"));
        // 无法解析的值保留默认
        assert_eq!(config.element_timeout_secs, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.continuation = true;
        assert!(matches!(config.validate(), Err(CdaError::Config(_))));

        let mut config = Config::default();
        config.max_retries = 11;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.artifact_extension = ".".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.element_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml() {
        let config = Config::from_toml_str(
            r#"
            list_file = "cdas.csv"
            max_retries = 2
            artifact_extension = ".PDF"
            duplicate_policy = "process_once"

            [credentials]
            username = "user"
            password = "pass"

            [selectors]
            cda_input = "input[name=PA_NU_CDA]"
            "#,
        )
        .unwrap();

        assert_eq!(config.list_file, Some(PathBuf::from("cdas.csv")));
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.artifact_extension(), "pdf");
        assert_eq!(config.duplicate_policy, DuplicatePolicy::ProcessOnce);
        assert!(config.credentials.is_complete());
        assert_eq!(config.settle_pause_ms, 1000);
    }
}
