use crate::config::CarrierConfig;
use crate::core::units::to_carrier_units;
use crate::domain::model::{
    AddressLocation, DeliveryType, Destination, ManifestItem, Order, OrderRegistrationRequest,
    PackageDefaults, Party, Payment, RegistrationPackage, TrackingId,
};
use crate::domain::ports::CarrierApi;
use crate::utils::error::{RegistrationFailure, Result as CarrierResult};
use crate::utils::validation::{validate_non_empty_string, validate_positive_number, Validate};
use serde_json::Value;
use std::sync::Arc;

pub const MANIFEST_NAME_MAX_CHARS: usize = 255;
pub const WARE_KEY_MAX_CHARS: usize = 20;
pub const REJECTED_STATE: &str = "INVALID";

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// 每件商品一個貨件位置，編號從 1 開始並跨商品連續
pub fn build_packages(order: &Order, defaults: &PackageDefaults) -> Vec<RegistrationPackage> {
    let mut packages = Vec::new();

    for item in &order.items {
        let size = to_carrier_units(&defaults.package_for(&item.dimensions));
        let manifest = ManifestItem {
            name: truncate_chars(&item.name, MANIFEST_NAME_MAX_CHARS),
            ware_key: truncate_chars(&item.reference, WARE_KEY_MAX_CHARS),
            payment: Payment::default(),
            cost: item.price,
            weight: size.weight,
            amount: 1,
        };

        for _ in 0..item.quantity {
            packages.push(RegistrationPackage {
                number: (packages.len() + 1).to_string(),
                size,
                items: vec![manifest.clone()],
            });
        }
    }

    packages
}

/// 自取點代碼或城市代碼加地址，兩者只會有一個；欄位不足時回傳 None
pub fn resolve_destination(order: &Order) -> Option<Destination> {
    fn non_empty(value: &Option<String>) -> Option<String> {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    match order.delivery_type {
        DeliveryType::Pickup => non_empty(&order.pickup_point_code).map(Destination::PickupPoint),
        DeliveryType::Courier => {
            let address = non_empty(&order.address)?;
            let city_code = order.city_code?;
            Some(Destination::Address { city_code, address })
        }
    }
}

fn non_empty_list(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| match v {
        Value::Array(items) => !items.is_empty(),
        Value::Null => false,
        _ => true,
    })
}

/// 解析 POST /v2/orders 的回應。
///
/// 物流商在同一個信封裡同時表示「帶警告接受」與「拒絕」：
/// 有警告只記錄；有錯誤但狀態不是 INVALID 仍視為成功；
/// INVALID 一律失敗，即使有 uuid；沒有 uuid 也是失敗。
pub fn parse_registration_response(
    order_number: &str,
    response: &Value,
) -> Result<TrackingId, RegistrationFailure> {
    let uuid = response
        .get("entity")
        .and_then(|entity| entity.get("uuid"))
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("");

    if let Some(request) = response
        .get("requests")
        .and_then(Value::as_array)
        .and_then(|requests| requests.first())
    {
        let state = request.get("state").and_then(Value::as_str).unwrap_or("");
        let errors = non_empty_list(request.get("errors"));

        if let Some(warnings) = non_empty_list(request.get("warnings")) {
            tracing::warn!(
                "Carrier order {} registered with warnings: {}",
                order_number,
                warnings
            );
        }
        if let Some(errors) = errors {
            tracing::error!("Carrier order {} errors: {}", order_number, errors);
        }
        if state == REJECTED_STATE {
            tracing::error!("Carrier rejected order {} (state=INVALID)", order_number);
            return Err(RegistrationFailure::Rejected {
                errors: errors.cloned().unwrap_or(Value::Array(Vec::new())),
            });
        }
    }

    if uuid.is_empty() {
        tracing::error!(
            "Carrier returned no uuid for order {}, full response: {}",
            order_number,
            response
        );
        return Err(RegistrationFailure::MissingTrackingId {
            response: response.clone(),
        });
    }

    Ok(TrackingId::new(uuid))
}

/// 訂單檔案的基本檢查；目的地是否完整留給登記流程判斷
impl Validate for Order {
    fn validate(&self) -> CarrierResult<()> {
        validate_non_empty_string("number", &self.number)?;
        validate_positive_number("tariff_code", self.tariff_code.max(0) as u64, 1)?;
        validate_non_empty_string("recipient.name", &self.recipient.name)?;
        validate_non_empty_string("recipient.phone", &self.recipient.phone)?;
        Ok(())
    }
}

/// 把商店訂單登記到物流商。失敗一律以明確的值回傳，不重試。
pub struct OrderRegistrar<A: CarrierApi> {
    api: Option<Arc<A>>,
    origin_point: Option<String>,
    sender: Party,
    defaults: PackageDefaults,
}

impl<A: CarrierApi> OrderRegistrar<A> {
    pub fn new(api: Option<Arc<A>>, config: &CarrierConfig) -> Self {
        let company = Some(config.sender.company.as_str());
        Self {
            api,
            origin_point: config.from_pvz_code().map(str::to_string),
            sender: Party::new(&config.sender.name, &config.sender.phone, company),
            defaults: config.package_defaults,
        }
    }

    /// 檢查出貨點、貨件與目的地後組出請求內容
    pub fn build_request(
        &self,
        order: &Order,
    ) -> Result<OrderRegistrationRequest, RegistrationFailure> {
        let origin_point = self
            .origin_point
            .clone()
            .ok_or(RegistrationFailure::MissingOriginPoint)?;

        let packages = build_packages(order, &self.defaults);
        if packages.is_empty() {
            return Err(RegistrationFailure::NoPackages);
        }

        let destination =
            resolve_destination(order).ok_or(RegistrationFailure::UnresolvableDestination)?;
        let (delivery_point, to_location) = match destination {
            Destination::PickupPoint(code) => (Some(code), None),
            Destination::Address { city_code, address } => (
                None,
                Some(AddressLocation {
                    code: city_code,
                    address,
                }),
            ),
        };

        Ok(OrderRegistrationRequest {
            order_type: 1,
            number: order.number.clone(),
            tariff_code: order.tariff_code,
            comment: order.comment.trim().to_string(),
            shipment_point: origin_point,
            delivery_point,
            to_location,
            sender: self.sender.clone(),
            recipient: Party::new(&order.recipient.name, &order.recipient.phone, None),
            packages,
        })
    }

    pub async fn register(&self, order: &Order) -> Result<TrackingId, RegistrationFailure> {
        let outcome = self.submit(order).await;

        match &outcome {
            Ok(tracking_id) => {
                tracing::info!(
                    "✅ Order {} registered with carrier, uuid={}",
                    order.number,
                    tracking_id
                );
            }
            Err(RegistrationFailure::UnresolvableDestination) => {
                tracing::error!(
                    "Cannot determine destination for order {} (type={:?} pvz={:?} addr={:?} city={:?})",
                    order.number,
                    order.delivery_type,
                    order.pickup_point_code,
                    order.address,
                    order.city_code
                );
            }
            Err(RegistrationFailure::Carrier(e)) => {
                let body = e.response_body().cloned().unwrap_or_default();
                tracing::error!(
                    "Carrier order API error for order {}: {} (body={})",
                    order.number,
                    e,
                    body
                );
            }
            Err(failure) => {
                tracing::error!(
                    "Order {} not registered with carrier: {}",
                    order.number,
                    failure
                );
            }
        }

        outcome
    }

    async fn submit(&self, order: &Order) -> Result<TrackingId, RegistrationFailure> {
        let api = self.api.as_ref().ok_or(RegistrationFailure::NotConfigured)?;
        let request = self.build_request(order)?;
        let response = api.create_order(&request).await?;
        parse_registration_response(&order.number, &response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{CarrierPackage, Contact, ItemDimensions, Location, OrderItem, TariffQuote};
    use crate::utils::error::{CarrierError, Result};
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingApi {
        response: std::result::Result<Value, u16>,
        requests: Mutex<Vec<OrderRegistrationRequest>>,
    }

    impl RecordingApi {
        fn replying(response: Value) -> Self {
            Self {
                response: Ok(response),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                response: Err(status),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CarrierApi for RecordingApi {
        async fn calculate_tariff(
            &self,
            _: i64,
            _: i64,
            _: &[CarrierPackage],
            _: i64,
        ) -> Result<TariffQuote> {
            unreachable!("registration never quotes")
        }

        async fn calculate_tariff_list(&self, _: i64, _: i64, _: &[CarrierPackage]) -> Result<Value> {
            unreachable!("registration never quotes")
        }

        async fn get_cities(&self, _: &str, _: Option<i64>) -> Result<Vec<Location>> {
            unreachable!("registration never searches cities")
        }

        async fn create_order(&self, request: &OrderRegistrationRequest) -> Result<Value> {
            self.requests.lock().unwrap().push(request.clone());
            self.response.clone().map_err(|status| CarrierError::ApiError {
                message: "rejected".to_string(),
                status_code: Some(status),
                response_body: json!({"errors": [{"code": "v2_internal_error"}]}),
            })
        }
    }

    fn config() -> CarrierConfig {
        let mut config = CarrierConfig::default();
        config.carrier.account = "test".to_string();
        config.carrier.secure = "secret".to_string();
        config.shipment.from_pvz_code = "FROMPVZ".to_string();
        config.sender.name = "Отправитель".to_string();
        config.sender.phone = "+79990000001".to_string();
        config.sender.company = "ООО Тест".to_string();
        config
    }

    fn item(name: &str, reference: &str, quantity: u32) -> OrderItem {
        OrderItem {
            name: name.to_string(),
            reference: reference.to_string(),
            price: Decimal::new(100000, 2),
            quantity,
            dimensions: ItemDimensions {
                weight_g: Some(500),
                length_mm: Some(100),
                width_mm: Some(100),
                height_mm: Some(100),
            },
        }
    }

    fn pickup_order() -> Order {
        Order {
            number: "42".to_string(),
            delivery_type: DeliveryType::Pickup,
            tariff_code: 136,
            recipient: Contact {
                name: "Иванов Иван".to_string(),
                phone: "+79990000000".to_string(),
            },
            city_code: Some(44),
            pickup_point_code: Some("TESTPVZ".to_string()),
            address: None,
            comment: "Комментарий".to_string(),
            items: vec![item("Тестовый товар", "1", 1)],
        }
    }

    fn build_registrar(api: Option<RecordingApi>) -> OrderRegistrar<RecordingApi> {
        OrderRegistrar::new(api.map(Arc::new), &config())
    }

    #[test]
    fn test_build_packages_numbers_units_across_items() {
        let mut order = pickup_order();
        order.items = vec![
            item(&"Я".repeat(300), "product-reference-key-0001", 2),
            OrderItem {
                dimensions: ItemDimensions::default(),
                ..item("Кружка", "7", 1)
            },
        ];

        let packages = build_packages(&order, &PackageDefaults::default());

        assert_eq!(
            packages.iter().map(|p| p.number.as_str()).collect::<Vec<_>>(),
            vec!["1", "2", "3"]
        );
        assert_eq!(packages[0].items, packages[1].items);
        let manifest = &packages[0].items[0];
        assert_eq!(manifest.name.chars().count(), 255);
        assert_eq!(manifest.ware_key, "product-reference-ke");
        assert_eq!(manifest.payment.value, 0);
        assert_eq!(manifest.amount, 1);
        assert_eq!(manifest.weight, 500);
        assert_eq!(
            packages[2].size,
            CarrierPackage {
                weight: 500,
                length: 10,
                width: 10,
                height: 10,
            }
        );
    }

    #[test]
    fn test_resolve_destination_modes() {
        let order = pickup_order();
        assert_eq!(
            resolve_destination(&order),
            Some(Destination::PickupPoint("TESTPVZ".to_string()))
        );

        let courier = Order {
            delivery_type: DeliveryType::Courier,
            address: Some("ул. Ленина, 1".to_string()),
            ..pickup_order()
        };
        assert_eq!(
            resolve_destination(&courier),
            Some(Destination::Address {
                city_code: 44,
                address: "ул. Ленина, 1".to_string(),
            })
        );

        let courier_without_address = Order {
            delivery_type: DeliveryType::Courier,
            address: Some("  ".to_string()),
            ..pickup_order()
        };
        assert_eq!(resolve_destination(&courier_without_address), None);

        let pickup_without_code = Order {
            pickup_point_code: None,
            address: Some("ул. Ленина, 1".to_string()),
            ..pickup_order()
        };
        assert_eq!(resolve_destination(&pickup_without_code), None);
    }

    #[test]
    fn test_parse_accepts_uuid_with_warnings_and_errors() {
        let response = json!({
            "entity": {"uuid": " 72753031-abcd "},
            "requests": [{
                "state": "ACCEPTED",
                "errors": [{"code": "minor"}],
                "warnings": [{"code": "w"}]
            }]
        });

        let tracking_id = parse_registration_response("42", &response).unwrap();

        assert_eq!(tracking_id.as_str(), "72753031-abcd");
    }

    #[test]
    fn test_parse_invalid_state_fails_despite_uuid() {
        let response = json!({
            "entity": {"uuid": "abc"},
            "requests": [{"state": "INVALID", "errors": [{"code": "v2_entity_invalid"}]}]
        });

        let failure = parse_registration_response("42", &response).unwrap_err();

        match failure {
            RegistrationFailure::Rejected { errors } => {
                assert_eq!(errors[0]["code"], "v2_entity_invalid");
            }
            other => panic!("unexpected failure: {:?}", other),
        }

        let bare_invalid = json!({"entity": {"uuid": "abc"}, "requests": [{"state": "INVALID"}]});
        assert!(matches!(
            parse_registration_response("42", &bare_invalid),
            Err(RegistrationFailure::Rejected { .. })
        ));
    }

    #[test]
    fn test_parse_missing_uuid_fails() {
        for response in [
            json!({}),
            json!({"entity": {}}),
            json!({"entity": {"uuid": "   "}, "requests": []}),
            json!({"entity": null, "requests": null}),
        ] {
            assert!(matches!(
                parse_registration_response("42", &response),
                Err(RegistrationFailure::MissingTrackingId { .. })
            ));
        }
    }

    #[test]
    fn test_order_validation() {
        assert!(pickup_order().validate().is_ok());

        let no_number = Order {
            number: " ".to_string(),
            ..pickup_order()
        };
        assert!(no_number.validate().is_err());

        let no_tariff = Order {
            tariff_code: 0,
            ..pickup_order()
        };
        assert!(no_tariff.validate().is_err());

        let mut no_phone = pickup_order();
        no_phone.recipient.phone.clear();
        assert!(no_phone.validate().is_err());
    }

    #[tokio::test]
    async fn test_register_without_credentials_fails() {
        let failure = build_registrar(None).register(&pickup_order()).await.unwrap_err();
        assert!(matches!(failure, RegistrationFailure::NotConfigured));
    }

    #[tokio::test]
    async fn test_register_sends_pickup_payload() {
        let registrar = build_registrar(Some(RecordingApi::replying(json!({
            "entity": {"uuid": "cdek-uuid-123"},
            "requests": []
        }))));
        let order = pickup_order();

        let tracking_id = registrar.register(&order).await.unwrap();

        assert_eq!(tracking_id.as_str(), "cdek-uuid-123");
        let requests = registrar.api.as_ref().unwrap().requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.number, "42");
        assert_eq!(request.tariff_code, 136);
        assert_eq!(request.shipment_point, "FROMPVZ");
        assert_eq!(request.delivery_point.as_deref(), Some("TESTPVZ"));
        assert!(request.to_location.is_none());
        assert_eq!(request.recipient.name, "Иванов Иван");
        assert_eq!(request.sender.company.as_deref(), Some("ООО Тест"));

        let payload = serde_json::to_value(request).unwrap();
        assert_eq!(payload["type"], 1);
        assert_eq!(payload["recipient"]["phones"][0]["number"], "+79990000000");
        assert_eq!(payload["packages"][0]["number"], "1");
        assert_eq!(payload["packages"][0]["length"], 10);
        assert_eq!(payload["packages"][0]["items"][0]["cost"], 1000.0);
        assert_eq!(payload["packages"][0]["items"][0]["payment"]["value"], 0);
        assert!(payload.get("to_location").is_none());
    }

    #[tokio::test]
    async fn test_register_preconditions_are_checked_before_submit() {
        let mut no_origin = config();
        no_origin.shipment.from_pvz_code = " ".to_string();
        let registrar = OrderRegistrar::new(
            Some(Arc::new(RecordingApi::replying(json!({})))),
            &no_origin,
        );
        assert!(matches!(
            registrar.register(&pickup_order()).await,
            Err(RegistrationFailure::MissingOriginPoint)
        ));

        let registrar = build_registrar(Some(RecordingApi::replying(json!({}))));
        let empty = Order {
            items: vec![item("Товар", "1", 0)],
            ..pickup_order()
        };
        assert!(matches!(
            registrar.register(&empty).await,
            Err(RegistrationFailure::NoPackages)
        ));

        let nowhere = Order {
            pickup_point_code: None,
            ..pickup_order()
        };
        assert!(matches!(
            registrar.register(&nowhere).await,
            Err(RegistrationFailure::UnresolvableDestination)
        ));

        assert!(registrar.api.as_ref().unwrap().requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_surfaces_carrier_errors() {
        let registrar = build_registrar(Some(RecordingApi::failing(500)));

        let failure = registrar.register(&pickup_order()).await.unwrap_err();

        match failure {
            RegistrationFailure::Carrier(e) => assert_eq!(e.status_code(), Some(500)),
            other => panic!("unexpected failure: {:?}", other),
        }
    }
}
