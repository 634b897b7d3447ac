use crate::adapters::clock::SystemClock;
use crate::config::CarrierConfig;
use crate::core::auth::{Credentials, TokenCache};
use crate::core::transport::CarrierTransport;
use crate::domain::model::{CarrierPackage, Location, OrderRegistrationRequest, TariffQuote};
use crate::domain::ports::{CarrierApi, Clock};
use crate::utils::error::{CarrierError, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub const TARIFF_PATH: &str = "/v2/calculator/tariff";
pub const TARIFF_LIST_PATH: &str = "/v2/calculator/tarifflist";
pub const CITIES_PATH: &str = "/v2/location/cities";
pub const ORDERS_PATH: &str = "/v2/orders";

// 「Посылка」系列費率代碼
pub const TARIFF_WAREHOUSE_WAREHOUSE: i64 = 136;
pub const TARIFF_WAREHOUSE_DOOR: i64 = 137;
pub const TARIFF_DOOR_WAREHOUSE: i64 = 138;
pub const TARIFF_DOOR_DOOR: i64 = 139;
pub const TARIFF_WAREHOUSE_DOOR_ECO: i64 = 233;
pub const TARIFF_WAREHOUSE_WAREHOUSE_ECO: i64 = 234;
pub const TARIFF_WAREHOUSE_LOCKER_ECO: i64 = 482;

/// CDEK API v2 客戶端
pub struct CarrierClient {
    transport: CarrierTransport,
    from_address: Option<String>,
}

impl CarrierClient {
    pub fn new(
        base_url: &str,
        credentials: Credentials,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CarrierError::ConfigError {
                message: format!("failed to build HTTP client: {}", e),
            })?;
        let tokens = TokenCache::new(http.clone(), base_url, credentials, clock);

        Ok(Self {
            transport: CarrierTransport::new(http, base_url, tokens),
            from_address: None,
        })
    }

    /// 出貨地址會加入費率計算的 from_location
    pub fn with_from_address(mut self, address: Option<&str>) -> Self {
        self.from_address = address
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string);
        self
    }

    fn calculator_body(
        &self,
        from_city_code: i64,
        to_city_code: i64,
        packages: &[CarrierPackage],
        tariff_code: Option<i64>,
    ) -> Value {
        let mut from_location = json!({ "code": from_city_code });
        if let Some(address) = &self.from_address {
            from_location["address"] = json!(address);
        }

        let mut body = json!({
            "type": 1,
            "from_location": from_location,
            "to_location": { "code": to_city_code },
            "packages": packages,
        });
        if let Some(code) = tariff_code {
            body["tariff_code"] = json!(code);
        }
        body
    }
}

/// 依配置建立客戶端；未設定帳密時回傳 None（整合停用）
pub fn client_from_config(config: &CarrierConfig) -> Result<Option<CarrierClient>> {
    client_from_config_with_clock(config, Arc::new(SystemClock))
}

pub fn client_from_config_with_clock(
    config: &CarrierConfig,
    clock: Arc<dyn Clock>,
) -> Result<Option<CarrierClient>> {
    let Some(credentials) = config.credentials() else {
        tracing::debug!("Carrier credentials not configured, client disabled");
        return Ok(None);
    };

    let client = CarrierClient::new(&config.base_url(), credentials, config.timeout(), clock)?
        .with_from_address(config.from_address());
    Ok(Some(client))
}

/// 把物流商的城市紀錄轉為 [`Location`]，代碼不是整數的紀錄略過
fn location_from_value(value: &Value) -> Option<Location> {
    let code = match value.get("code")? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    let text = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Some(Location {
        code,
        city: text("city").or_else(|| text("name")).unwrap_or_default(),
        region: text("region").unwrap_or_default(),
    })
}

#[async_trait]
impl CarrierApi for CarrierClient {
    async fn calculate_tariff(
        &self,
        from_city_code: i64,
        to_city_code: i64,
        packages: &[CarrierPackage],
        tariff_code: i64,
    ) -> Result<TariffQuote> {
        let body = self.calculator_body(from_city_code, to_city_code, packages, Some(tariff_code));
        tracing::debug!("Carrier tariff request: {}", body);

        let mut response = self
            .transport
            .request(Method::POST, TARIFF_PATH, &[], Some(&body))
            .await?;

        // 單一費率的回應不含代碼，補上請求的代碼
        if let Value::Object(fields) = &mut response {
            fields
                .entry("tariff_code")
                .or_insert_with(|| json!(tariff_code));
        }

        serde_json::from_value(response.clone()).map_err(|e| CarrierError::ApiError {
            message: format!("unexpected tariff response: {}", e),
            status_code: None,
            response_body: response,
        })
    }

    async fn calculate_tariff_list(
        &self,
        from_city_code: i64,
        to_city_code: i64,
        packages: &[CarrierPackage],
    ) -> Result<Value> {
        let body = self.calculator_body(from_city_code, to_city_code, packages, None);
        tracing::debug!("Carrier tarifflist request: {}", body);

        self.transport
            .request(Method::POST, TARIFF_LIST_PATH, &[], Some(&body))
            .await
    }

    async fn get_cities(
        &self,
        country_code: &str,
        region_code: Option<i64>,
    ) -> Result<Vec<Location>> {
        let mut query = vec![("country_code", country_code.to_string())];
        if let Some(region) = region_code {
            query.push(("region_code", region.to_string()));
        }

        let response = self
            .transport
            .request(Method::GET, CITIES_PATH, &query, None)
            .await?;

        match response {
            Value::Array(records) => Ok(records.iter().filter_map(location_from_value).collect()),
            other => Err(CarrierError::ApiError {
                message: "city reference response is not a list".to_string(),
                status_code: None,
                response_body: other,
            }),
        }
    }

    async fn create_order(&self, request: &OrderRegistrationRequest) -> Result<Value> {
        let body = serde_json::to_value(request)?;
        tracing::debug!("Carrier order request: {}", body);

        self.transport
            .request(Method::POST, ORDERS_PATH, &[], Some(&body))
            .await
    }
}
