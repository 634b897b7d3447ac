use anyhow::Context;
use cdek_delivery::adapters::{MemoryCache, SystemClock};
use cdek_delivery::core::units::packages_from_items;
use cdek_delivery::domain::model::{
    DeliveryMode, LineItem, Location, LocationRef, Order, Package, PointType,
};
use cdek_delivery::utils::{logger, validation::Validate};
use cdek_delivery::{
    client_from_config, CarrierConfig, CliArgs, Command, OrderRegistrar, TariffService,
};
use clap::Parser;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting cdek-delivery CLI");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    let config = match &args.config {
        Some(path) => CarrierConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CarrierConfig::from_env().context("failed to read CDEK_* environment")?,
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    let client = client_from_config(&config)?.map(Arc::new);
    let cities: Arc<MemoryCache<Vec<Location>>> = Arc::new(MemoryCache::new(Arc::new(SystemClock)));
    let tariffs = TariffService::new(client.clone(), &config, cities);

    match args.command {
        Command::Quote {
            to,
            from,
            tariff,
            items,
        } => {
            let packages = load_packages(items.as_deref(), &config)?;
            let from = from.unwrap_or_else(|| tariffs.from_city_code());

            match tariffs
                .calculate_single_tariff(from, to, &packages, tariff)
                .await
            {
                Some(quote) => print_json(&quote)?,
                None => {
                    eprintln!("⚠️ No quote for tariff {} ({} -> {})", tariff, from, to);
                    std::process::exit(1);
                }
            }
        }
        Command::Tariffs {
            to,
            mode,
            point_type,
            items,
        } => {
            let packages = load_packages(items.as_deref(), &config)?;
            let mode: DeliveryMode = mode.parse().map_err(anyhow::Error::msg)?;
            let point_type: PointType = point_type.parse().unwrap_or_default();
            let destination = match to.trim().parse::<i64>() {
                Ok(code) => LocationRef::Code(code),
                Err(_) => LocationRef::Name(to),
            };

            let available = tariffs
                .available_tariffs(&destination, &packages, mode, point_type)
                .await;
            tracing::info!("📦 {} tariffs available", available.len());
            print_json(&available)?;
        }
        Command::Cities { query, limit } => {
            let found = tariffs.search_locations(&query, limit).await;
            print_json(&found)?;
        }
        Command::Register { order } => {
            let content = std::fs::read_to_string(&order)
                .with_context(|| format!("failed to read order {}", order.display()))?;
            let order: Order = serde_json::from_str(&content).context("invalid order JSON")?;
            order.validate()?;

            let registrar = OrderRegistrar::new(client, &config);
            match registrar.register(&order).await {
                Ok(tracking_id) => {
                    println!("✅ Order {} registered, uuid={}", order.number, tracking_id);
                }
                Err(failure) => {
                    // 訂單保留在商店端，需要人工處理
                    eprintln!("❌ Order {} not registered: {}", order.number, failure);
                    std::process::exit(2);
                }
            }
        }
    }

    Ok(())
}

/// 商品清單檔案；未提供時以一件預設尺寸的貨件估價
fn load_packages(path: Option<&Path>, config: &CarrierConfig) -> anyhow::Result<Vec<Package>> {
    let items: Vec<LineItem> = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read items {}", path.display()))?;
            serde_json::from_str(&content).context("invalid items JSON")?
        }
        None => vec![LineItem {
            dimensions: Default::default(),
            quantity: 1,
        }],
    };

    Ok(packages_from_items(&items, &config.package_defaults))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
