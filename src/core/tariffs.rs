use crate::config::CarrierConfig;
use crate::core::classifier::filter_for_mode;
use crate::core::units::to_carrier_units_all;
use crate::domain::model::{
    integer_from_json, DeliveryMode, Location, LocationRef, Package, PointType, TariffQuote,
};
use crate::domain::ports::{CarrierApi, ExpiringCache};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub const CITIES_CACHE_KEY: &str = "cdek_cities_ru";
pub const CITIES_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_SEARCH_LIMIT: usize = 30;

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// tarifflist 回應的三種形狀，依序嘗試
#[derive(Debug, Clone, PartialEq)]
pub enum TariffListResponse {
    TariffCodes(Vec<Value>),
    Tariffs(Vec<Value>),
    Bare(Vec<Value>),
}

impl TariffListResponse {
    pub fn decode(value: Value) -> Option<Self> {
        match value {
            Value::Array(entries) => Some(Self::Bare(entries)),
            Value::Object(mut fields) => {
                let keys: Vec<String> = fields.keys().cloned().collect();
                // 空值（null、空陣列、空物件、空字串、0、false）視為沒有 tariff_codes
                let decoded = match fields.remove("tariff_codes").filter(is_present) {
                    Some(Value::Array(entries)) => Some(Self::TariffCodes(entries)),
                    Some(_) => None,
                    None => match fields.remove("tariffs") {
                        Some(Value::Array(entries)) => Some(Self::Tariffs(entries)),
                        _ => None,
                    },
                };
                if decoded.is_none() {
                    tracing::debug!("Carrier tarifflist unexpected response keys: {:?}", keys);
                }
                decoded
            }
            other => {
                tracing::debug!("Carrier tarifflist response is not an object: {}", other);
                None
            }
        }
    }

    /// 物件原樣保留，裸數字轉為只有代碼的報價，其他項目略過
    pub fn into_quotes(self) -> Vec<TariffQuote> {
        let entries = match self {
            Self::TariffCodes(entries) | Self::Tariffs(entries) | Self::Bare(entries) => entries,
        };

        entries
            .into_iter()
            .filter_map(|entry| match entry {
                Value::Object(fields) => Some(TariffQuote::from(fields)),
                Value::Number(_) => integer_from_json(&entry).map(TariffQuote::from_code),
                _ => None,
            })
            .collect()
    }
}

/// 費率查詢服務。
///
/// 報價失敗只記錄日誌並回傳 `None` 或空清單，結帳頁面寧可沒有估價也不要被擋住。
pub struct TariffService<A: CarrierApi> {
    api: Option<Arc<A>>,
    from_city_code: i64,
    country_code: String,
    cities: Arc<dyn ExpiringCache<Vec<Location>>>,
}

impl<A: CarrierApi> TariffService<A> {
    pub fn new(
        api: Option<Arc<A>>,
        config: &CarrierConfig,
        cities: Arc<dyn ExpiringCache<Vec<Location>>>,
    ) -> Self {
        Self {
            api,
            from_city_code: config.shipment.from_city_code,
            country_code: config.shipment.country_code.clone(),
            cities,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api.is_some()
    }

    pub fn from_city_code(&self) -> i64 {
        self.from_city_code
    }

    pub async fn calculate_single_tariff(
        &self,
        from_city_code: i64,
        to_city_code: i64,
        packages: &[Package],
        tariff_code: i64,
    ) -> Option<TariffQuote> {
        let Some(api) = &self.api else {
            tracing::debug!("Carrier client not configured, skipping delivery calculation");
            return None;
        };

        let carrier_packages = to_carrier_units_all(packages);
        match api
            .calculate_tariff(from_city_code, to_city_code, &carrier_packages, tariff_code)
            .await
        {
            Ok(quote) => Some(quote),
            Err(e) => {
                tracing::warn!(
                    "Carrier tariff {} calculation {} -> {} failed: {}",
                    tariff_code,
                    from_city_code,
                    to_city_code,
                    e
                );
                None
            }
        }
    }

    pub async fn calculate_all_tariffs(
        &self,
        from_city_code: i64,
        to_city_code: i64,
        packages: &[Package],
    ) -> Vec<TariffQuote> {
        let Some(api) = &self.api else {
            tracing::debug!("Carrier client not configured, skipping tarifflist calculation");
            return Vec::new();
        };

        let carrier_packages = to_carrier_units_all(packages);
        let response = match api
            .calculate_tariff_list(from_city_code, to_city_code, &carrier_packages)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    "Carrier tarifflist {} -> {} failed: {}",
                    from_city_code,
                    to_city_code,
                    e
                );
                return Vec::new();
            }
        };

        TariffListResponse::decode(response)
            .map(TariffListResponse::into_quotes)
            .unwrap_or_default()
    }

    /// 城市參考表，快取 24 小時；載入失敗時不寫入快取
    pub async fn cached_locations(&self) -> Vec<Location> {
        if let Some(cities) = self.cities.get(CITIES_CACHE_KEY) {
            return cities;
        }
        let Some(api) = &self.api else {
            return Vec::new();
        };

        match api.get_cities(&self.country_code, None).await {
            Ok(cities) => {
                tracing::info!("🗺️ Loaded {} carrier cities into cache", cities.len());
                self.cities
                    .set(CITIES_CACHE_KEY, cities.clone(), CITIES_CACHE_TTL);
                cities
            }
            Err(e) => {
                tracing::warn!("Carrier city reference load failed: {}", e);
                Vec::new()
            }
        }
    }

    /// 丟棄快取的城市參考表，下一次搜尋重新載入
    pub fn refresh_locations(&self) {
        self.cities.invalidate(CITIES_CACHE_KEY);
    }

    /// 以城市或地區名稱做不分大小寫的子字串搜尋
    pub async fn search_locations(&self, query: &str, limit: usize) -> Vec<Location> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() || !self.is_configured() {
            return Vec::new();
        }

        self.cached_locations()
            .await
            .into_iter()
            .filter(|location| {
                location.city.to_lowercase().contains(&needle)
                    || location.region.to_lowercase().contains(&needle)
            })
            .take(limit)
            .collect()
    }

    pub async fn resolve_city_code(&self, location: &LocationRef) -> Option<i64> {
        match location {
            LocationRef::Code(code) => Some(*code),
            LocationRef::Name(name) => self
                .search_locations(name, 1)
                .await
                .first()
                .map(|location| location.code),
        }
    }

    /// 從出貨城市到目的地、符合配送模式的費率，依費用排序
    pub async fn available_tariffs(
        &self,
        to: &LocationRef,
        packages: &[Package],
        mode: DeliveryMode,
        point_type: PointType,
    ) -> Vec<TariffQuote> {
        let Some(to_city_code) = self.resolve_city_code(to).await else {
            tracing::debug!("Destination {:?} could not be resolved to a city code", to);
            return Vec::new();
        };

        let tariffs = self
            .calculate_all_tariffs(self.from_city_code, to_city_code, packages)
            .await;
        filter_for_mode(&tariffs, mode, point_type)
    }
}
