#[cfg(feature = "cli")]
pub mod cli;

use crate::core::auth::Credentials;
use crate::domain::model::PackageDefaults;
use crate::utils::error::{CarrierError, Result};
use crate::utils::validation::{validate_positive_number, validate_range, validate_url, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const PRODUCTION_BASE_URL: &str = "https://api.cdek.ru";
pub const SANDBOX_BASE_URL: &str = "https://api.edu.cdek.ru";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CarrierConfig {
    #[serde(default)]
    pub carrier: ApiConfig,
    #[serde(default)]
    pub shipment: ShipmentConfig,
    #[serde(default)]
    pub sender: SenderConfig,
    #[serde(default)]
    pub package_defaults: PackageDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub secure: String,
    /// 使用物流商的測試環境
    #[serde(default = "default_test")]
    pub test: bool,
    /// 覆寫 API 位址（本機模擬伺服器等）
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            account: String::new(),
            secure: String::new(),
            test: default_test(),
            base_url: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentConfig {
    /// 出貨城市代碼（137 = 聖彼得堡）
    #[serde(default = "default_from_city_code")]
    pub from_city_code: i64,
    #[serde(default)]
    pub from_address: String,
    /// 出貨自取點代碼，登記訂單時必填
    #[serde(default)]
    pub from_pvz_code: String,
    #[serde(default = "default_country_code")]
    pub country_code: String,
}

impl Default for ShipmentConfig {
    fn default() -> Self {
        Self {
            from_city_code: default_from_city_code(),
            from_address: String::new(),
            from_pvz_code: String::new(),
            country_code: default_country_code(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SenderConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub company: String,
}

fn default_test() -> bool {
    true
}

fn default_timeout_seconds() -> u64 {
    15
}

fn default_from_city_code() -> i64 {
    137
}

fn default_country_code() -> String {
    "RU".to_string()
}

impl CarrierConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| CarrierError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${CDEK_SECURE})，未設定的變數替換為空字串
    fn substitute_env_vars(content: &str) -> String {
        use regex::{Captures, Regex};
        use std::sync::OnceLock;

        static ENV_VAR: OnceLock<Regex> = OnceLock::new();
        let re = ENV_VAR.get_or_init(|| {
            Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var pattern")
        });

        re.replace_all(content, |caps: &Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| {
                tracing::debug!("Environment variable {} is not set", var_name);
                String::new()
            })
        })
        .into_owned()
    }

    /// 只從環境變數建立配置
    pub fn from_env() -> Result<Self> {
        fn var(name: &str) -> Option<String> {
            std::env::var(name).ok().map(|v| v.trim().to_string())
        }

        fn parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
            match var(name) {
                None => Ok(None),
                Some(raw) => raw
                    .parse()
                    .map(Some)
                    .map_err(|_| CarrierError::InvalidConfigValueError {
                        field: name.to_string(),
                        value: raw.clone(),
                        reason: "cannot be parsed".to_string(),
                    }),
            }
        }

        let mut config = Self::default();

        config.carrier.account = var("CDEK_ACCOUNT").unwrap_or_default();
        config.carrier.secure = var("CDEK_SECURE").unwrap_or_default();
        if let Some(test) = parsed("CDEK_TEST")? {
            config.carrier.test = test;
        }
        config.carrier.base_url = var("CDEK_BASE_URL").filter(|v| !v.is_empty());
        if let Some(timeout) = parsed("CDEK_TIMEOUT")? {
            config.carrier.timeout_seconds = timeout;
        }

        if let Some(code) = parsed("CDEK_FROM_CITY_CODE")? {
            config.shipment.from_city_code = code;
        }
        config.shipment.from_address = var("CDEK_FROM_ADDRESS").unwrap_or_default();
        config.shipment.from_pvz_code = var("CDEK_FROM_PVZ_CODE").unwrap_or_default();

        config.sender.name = var("CDEK_SENDER_NAME").unwrap_or_default();
        config.sender.phone = var("CDEK_SENDER_PHONE").unwrap_or_default();
        config.sender.company = var("CDEK_SENDER_COMPANY").unwrap_or_default();

        Ok(config)
    }

    /// 帳號或密鑰任一為空時整合停用
    pub fn credentials(&self) -> Option<Credentials> {
        let account = self.carrier.account.trim();
        let secure = self.carrier.secure.trim();
        if account.is_empty() || secure.is_empty() {
            return None;
        }
        Some(Credentials {
            client_id: account.to_string(),
            client_secret: secure.to_string(),
        })
    }

    pub fn base_url(&self) -> String {
        match &self.carrier.base_url {
            Some(url) if !url.trim().is_empty() => url.trim().trim_end_matches('/').to_string(),
            _ if self.carrier.test => SANDBOX_BASE_URL.to_string(),
            _ => PRODUCTION_BASE_URL.to_string(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.carrier.timeout_seconds)
    }

    pub fn from_pvz_code(&self) -> Option<&str> {
        Some(self.shipment.from_pvz_code.trim()).filter(|code| !code.is_empty())
    }

    pub fn from_address(&self) -> Option<&str> {
        Some(self.shipment.from_address.trim()).filter(|address| !address.is_empty())
    }
}

impl Validate for CarrierConfig {
    fn validate(&self) -> Result<()> {
        validate_url("carrier.base_url", &self.base_url())?;

        validate_positive_number("carrier.timeout_seconds", self.carrier.timeout_seconds, 1)?;
        validate_range("carrier.timeout_seconds", self.carrier.timeout_seconds, 1, 300)?;

        let account_set = !self.carrier.account.trim().is_empty();
        let secure_set = !self.carrier.secure.trim().is_empty();
        if account_set != secure_set {
            return Err(CarrierError::InvalidConfigValueError {
                field: if account_set {
                    "carrier.secure".to_string()
                } else {
                    "carrier.account".to_string()
                },
                value: String::new(),
                reason: "account and secure must be set together".to_string(),
            });
        }

        if self.credentials().is_none() {
            tracing::warn!("Carrier credentials are not configured, delivery integration is disabled");
        }

        Ok(())
    }
}
