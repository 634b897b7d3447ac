//! Tariff classification by name.
//!
//! The carrier exposes no structured direction field we can rely on, so the
//! direction (warehouse → warehouse / locker / door) and the product family are
//! read from the free-text tariff name. Both rule sets live in the tables below
//! and share a single normalization pass. If the carrier renames its tariffs
//! they fall through to `Unclassified` and are dropped; such names are counted
//! and logged so the drift shows up in monitoring.

use crate::domain::model::{DeliveryMode, PointType, TariffKind, TariffQuote};
use std::sync::atomic::{AtomicU64, Ordering};

/// 從門口出發的方向，本商店不販售
const EXCLUDED_DIRECTIONS: &[&str] = &[
    "дверь-дверь",
    "дверь дверь",
    "дверь-склад",
    "дверь склад",
    "дверь-постамат",
    "дверь постамат",
];

enum Rule {
    /// 名稱包含其中任一片段
    Any(&'static [&'static str]),
    /// 名稱同時包含全部片段
    All(&'static [&'static str]),
}

/// 依序比對，第一個符合的規則決定方向
const DIRECTION_RULES: &[(Rule, TariffKind)] = &[
    (Rule::Any(&["склад-склад"]), TariffKind::WarehouseToWarehouse),
    (Rule::Any(&["склад-постамат"]), TariffKind::WarehouseToLocker),
    (Rule::All(&["постамат", "склад"]), TariffKind::WarehouseToLocker),
    (
        Rule::Any(&["склад-двер", "до двери", "курьер"]),
        TariffKind::WarehouseToDoor,
    ),
];

/// 允許販售的產品系列：「Посылка」（含經濟型）與「Экспресс」
const FAMILY_PREFIXES: &[&str] = &["посылка ", "экономичная посылка ", "экспресс "];
const FAMILY_EXACT: &[&str] = &["посылка"];

static UNCLASSIFIED_SEEN: AtomicU64 = AtomicU64::new(0);

/// 目前為止看到的、屬於允許系列卻無法判斷方向的費率數量
pub fn unclassified_tariffs_seen() -> u64 {
    UNCLASSIFIED_SEEN.load(Ordering::Relaxed)
}

/// 小寫、NBSP 轉空白、去頭尾空白，並把 " - " / " – " 合併為 "-"
pub fn normalize_tariff_name(name: &str) -> String {
    name.to_lowercase()
        .replace('\u{a0}', " ")
        .trim()
        .replace(" - ", "-")
        .replace(" – ", "-")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Kind(TariffKind),
    Excluded,
    Unrecognized,
}

fn direction_of(normalized: &str) -> Direction {
    if normalized.is_empty() {
        return Direction::Unrecognized;
    }
    if EXCLUDED_DIRECTIONS.iter().any(|d| normalized.contains(d)) {
        return Direction::Excluded;
    }

    DIRECTION_RULES
        .iter()
        .find(|(rule, _)| match rule {
            Rule::Any(parts) => parts.iter().any(|p| normalized.contains(p)),
            Rule::All(parts) => parts.iter().all(|p| normalized.contains(p)),
        })
        .map(|(_, kind)| Direction::Kind(*kind))
        .unwrap_or(Direction::Unrecognized)
}

pub fn classify(tariff_name: &str) -> TariffKind {
    match direction_of(&normalize_tariff_name(tariff_name)) {
        Direction::Kind(kind) => kind,
        Direction::Excluded | Direction::Unrecognized => TariffKind::Unclassified,
    }
}

pub fn is_allowed_family(tariff_name: &str) -> bool {
    let folded = tariff_name.to_lowercase();
    let folded = folded.trim();
    FAMILY_EXACT.contains(&folded) || FAMILY_PREFIXES.iter().any(|p| folded.starts_with(p))
}

/// 指定模式與自取點類型所接受的方向
pub fn wanted_kind(mode: DeliveryMode, point_type: PointType) -> TariffKind {
    match (mode, point_type) {
        (DeliveryMode::Office, PointType::Locker) => TariffKind::WarehouseToLocker,
        (DeliveryMode::Office, PointType::Pvz) => TariffKind::WarehouseToWarehouse,
        (DeliveryMode::Door, _) => TariffKind::WarehouseToDoor,
    }
}

/// 只保留符合模式的費率，依費用由低到高排序（缺少費用視為 0）
pub fn filter_for_mode(
    tariffs: &[TariffQuote],
    mode: DeliveryMode,
    point_type: PointType,
) -> Vec<TariffQuote> {
    let wanted = wanted_kind(mode, point_type);

    let mut filtered: Vec<TariffQuote> = tariffs
        .iter()
        .filter(|tariff| {
            let name = tariff.name();
            if !is_allowed_family(name) {
                return false;
            }
            match direction_of(&normalize_tariff_name(name)) {
                Direction::Kind(kind) => kind == wanted,
                Direction::Excluded => false,
                Direction::Unrecognized => {
                    let seen = UNCLASSIFIED_SEEN.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::warn!(
                        "Unclassified carrier tariff {:?} '{}' dropped (total seen: {})",
                        tariff.tariff_code,
                        name,
                        seen
                    );
                    false
                }
            }
        })
        .cloned()
        .collect();

    filtered.sort_by_key(TariffQuote::cost_or_zero);
    filtered
}
