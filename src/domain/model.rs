use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 內部單位的貨件：重量（克）、尺寸（毫米）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Package {
    pub weight_g: u32,
    pub length_mm: u32,
    pub width_mm: u32,
    pub height_mm: u32,
}

/// 物流商單位的貨件：重量（克）、尺寸（公分），每個值至少為 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarrierPackage {
    pub weight: u32,
    pub length: u32,
    pub width: u32,
    pub height: u32,
}

/// 商品的實體資料，未填寫的欄位由 [`PackageDefaults`] 補上
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDimensions {
    #[serde(default)]
    pub weight_g: Option<u32>,
    #[serde(default)]
    pub length_mm: Option<u32>,
    #[serde(default)]
    pub width_mm: Option<u32>,
    #[serde(default)]
    pub height_mm: Option<u32>,
}

/// 購物車中的一行商品
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(flatten)]
    pub dimensions: ItemDimensions,
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageDefaults {
    pub weight_g: u32,
    pub length_mm: u32,
    pub width_mm: u32,
    pub height_mm: u32,
}

impl Default for PackageDefaults {
    fn default() -> Self {
        Self {
            weight_g: 500,
            length_mm: 100,
            width_mm: 100,
            height_mm: 100,
        }
    }
}

impl PackageDefaults {
    /// 缺少或為 0 的值以預設值取代
    pub fn package_for(&self, dimensions: &ItemDimensions) -> Package {
        fn or_default(value: Option<u32>, default: u32) -> u32 {
            value.filter(|v| *v > 0).unwrap_or(default)
        }

        Package {
            weight_g: or_default(dimensions.weight_g, self.weight_g),
            length_mm: or_default(dimensions.length_mm, self.length_mm),
            width_mm: or_default(dimensions.width_mm, self.width_mm),
            height_mm: or_default(dimensions.height_mm, self.height_mm),
        }
    }
}

/// 物流商回傳的單一費率報價。
///
/// 解析時不會因為單一欄位格式不符而丟棄整筆：已知欄位盡量轉換，
/// 轉換不了的值連同未知欄位一起原樣留在 `extra`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "serde_json::Map<String, serde_json::Value>")]
pub struct TariffQuote {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tariff_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tariff_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tariff_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_mode: Option<i64>,
    #[serde(
        serialize_with = "lenient_decimal::serialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub delivery_sum: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_max: Option<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl From<serde_json::Map<String, serde_json::Value>> for TariffQuote {
    fn from(mut fields: serde_json::Map<String, serde_json::Value>) -> Self {
        fn take<T>(
            fields: &mut serde_json::Map<String, serde_json::Value>,
            key: &str,
            convert: impl Fn(&serde_json::Value) -> Option<T>,
        ) -> Option<T> {
            let value = fields.remove(key)?;
            let converted = convert(&value);
            if converted.is_none() {
                fields.insert(key.to_string(), value);
            }
            converted
        }

        let text = |v: &serde_json::Value| v.as_str().map(str::to_string);
        let small = |v: &serde_json::Value| integer_from_json(v).and_then(|n| u32::try_from(n).ok());

        Self {
            tariff_code: take(&mut fields, "tariff_code", integer_from_json),
            tariff_name: take(&mut fields, "tariff_name", text),
            tariff_description: take(&mut fields, "tariff_description", text),
            delivery_mode: take(&mut fields, "delivery_mode", integer_from_json),
            delivery_sum: take(&mut fields, "delivery_sum", decimal_from_json),
            period_min: take(&mut fields, "period_min", small),
            period_max: take(&mut fields, "period_max", small),
            extra: fields,
        }
    }
}

impl TariffQuote {
    /// 只有代碼的報價（物流商以裸整數回傳時）
    pub fn from_code(tariff_code: i64) -> Self {
        Self {
            tariff_code: Some(tariff_code),
            tariff_name: None,
            tariff_description: None,
            delivery_mode: None,
            delivery_sum: None,
            period_min: None,
            period_max: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.tariff_name.as_deref().unwrap_or("")
    }

    pub fn cost_or_zero(&self) -> Decimal {
        self.delivery_sum.unwrap_or(Decimal::ZERO)
    }

    pub fn delivery_window(&self) -> Option<(u32, u32)> {
        match (self.period_min, self.period_max) {
            (Some(min), Some(max)) => Some((min, max)),
            (Some(days), None) | (None, Some(days)) => Some((days, days)),
            (None, None) => None,
        }
    }
}

/// 物流商的數值可能是數字或字串；無法解析時視為缺值
mod lenient_decimal {
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal::Decimal;
    use serde::Serializer;
    use std::str::FromStr;

    pub fn serialize<S>(value: &Option<Decimal>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value.and_then(|d| d.to_f64()) {
            Some(f) => serializer.serialize_f64(f),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn parse(text: &str) -> Option<Decimal> {
        let text = text.trim();
        Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .ok()
    }
}

/// 整數、帶小數的數字（截斷）或數字字串
pub(crate) fn integer_from_json(value: &serde_json::Value) -> Option<i64> {
    let truncate = |f: f64| (f.is_finite() && f.abs() < i64::MAX as f64).then(|| f.trunc() as i64);
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(truncate)),
        serde_json::Value::String(s) => {
            let s = s.trim();
            s.parse().ok().or_else(|| s.parse::<f64>().ok().and_then(truncate))
        }
        _ => None,
    }
}

pub(crate) fn decimal_from_json(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => lenient_decimal::parse(&n.to_string()),
        serde_json::Value::String(s) => lenient_decimal::parse(s),
        _ => None,
    }
}

/// 依費率名稱判斷的配送方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TariffKind {
    WarehouseToWarehouse,
    WarehouseToLocker,
    WarehouseToDoor,
    Unclassified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// 到自取點（PVZ 或自助櫃）
    Office,
    /// 宅配到府
    Door,
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "office" => Ok(DeliveryMode::Office),
            "door" => Ok(DeliveryMode::Door),
            other => Err(format!("unknown delivery mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointType {
    #[default]
    Pvz,
    Locker,
}

impl FromStr for PointType {
    type Err = std::convert::Infallible;

    /// `POSTAMAT` 與 `LOCKER` 視為自助櫃，其他一律視為一般自取點
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "POSTAMAT" | "LOCKER" => Ok(PointType::Locker),
            _ => Ok(PointType::Pvz),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// 地理參考表中的城市
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub code: i64,
    pub city: String,
    pub region: String,
}

/// 目的地：物流商城市代碼或待搜尋的城市名稱
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationRef {
    Code(i64),
    Name(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryType {
    Pickup,
    Courier,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    /// 內部商品參照（送出時截斷為 20 字元）
    pub reference: String,
    pub price: Decimal,
    pub quantity: u32,
    #[serde(flatten)]
    pub dimensions: ItemDimensions,
}

/// 已建立的商店訂單，作為物流商登記的輸入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub number: String,
    pub delivery_type: DeliveryType,
    pub tariff_code: i64,
    pub recipient: Contact,
    #[serde(default)]
    pub city_code: Option<i64>,
    #[serde(default)]
    pub pickup_point_code: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub comment: String,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    PickupPoint(String),
    Address { city_code: i64, address: String },
}

/// 物流商指派的追蹤識別碼
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackingId(String);

impl TrackingId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// POST /v2/orders 的請求內容
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRegistrationRequest {
    #[serde(rename = "type")]
    pub order_type: u8,
    pub number: String,
    pub tariff_code: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
    pub shipment_point: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_point: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_location: Option<AddressLocation>,
    pub sender: Party,
    pub recipient: Party,
    pub packages: Vec<RegistrationPackage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressLocation {
    pub code: i64,
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Party {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub phones: Vec<Phone>,
}

impl Party {
    pub fn new(name: &str, phone: &str, company: Option<&str>) -> Self {
        let phones = if phone.trim().is_empty() {
            Vec::new()
        } else {
            vec![Phone {
                number: phone.trim().to_string(),
            }]
        };
        Self {
            name: name.trim().to_string(),
            company: company
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            phones,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Phone {
    pub number: String,
}

/// 一個貨件位置（每件商品一個），附帶內容清單
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationPackage {
    pub number: String,
    #[serde(flatten)]
    pub size: CarrierPackage,
    pub items: Vec<ManifestItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestItem {
    pub name: String,
    pub ware_key: String,
    pub payment: Payment,
    #[serde(with = "rust_decimal::serde::float")]
    pub cost: Decimal,
    pub weight: u32,
    pub amount: u32,
}

/// 貨到付款金額，本商店一律為 0
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Payment {
    pub value: u32,
}
