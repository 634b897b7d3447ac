use crate::domain::model::{CarrierPackage, Location, OrderRegistrationRequest, TariffQuote};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// 取得目前時間，測試時可替換為手動推進的時鐘
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 帶有存活時間的鍵值快取，過期的項目視為不存在
pub trait ExpiringCache<V>: Send + Sync {
    fn get(&self, key: &str) -> Option<V>;
    fn set(&self, key: &str, value: V, ttl: Duration);
    fn invalidate(&self, key: &str);
}

/// 物流商 API 的端點
#[async_trait]
pub trait CarrierApi: Send + Sync {
    async fn calculate_tariff(
        &self,
        from_city_code: i64,
        to_city_code: i64,
        packages: &[CarrierPackage],
        tariff_code: i64,
    ) -> Result<TariffQuote>;

    /// 回傳未經整理的回應，形狀由呼叫端解析
    async fn calculate_tariff_list(
        &self,
        from_city_code: i64,
        to_city_code: i64,
        packages: &[CarrierPackage],
    ) -> Result<serde_json::Value>;

    async fn get_cities(&self, country_code: &str, region_code: Option<i64>)
        -> Result<Vec<Location>>;

    /// 回傳未經整理的回應，成功與否由登記流程判斷
    async fn create_order(&self, request: &OrderRegistrationRequest) -> Result<serde_json::Value>;
}
