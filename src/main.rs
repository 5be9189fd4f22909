//! Storefront Core - pricing, stock and inventory analytics service

use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::StatusCode, routing::{get, post}, Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use validator::Validate;

use storefront_core::config::AppConfig;
use storefront_core::domain::aggregates::{Product, Selection, SelectionEntry};
use storefront_core::domain::value_objects::{CurrencyCode, DataSource};
use storefront_core::events::{publish_all, EventPublisher, LogPublisher, NatsPublisher};
use storefront_core::services::currency::{Conversion, CurrencyConverter, HttpRateProvider, RateProvider};
use storefront_core::services::inventory_summary::{self, EnhancedProductStats, ProductInventoryOverview};
use storefront_core::services::pricing::{PriceBreakdown, PricingContext, PricingEngine};
use storefront_core::services::product_query::{Page, ProductQueryService, StockAlert};
use storefront_core::services::promotions::{load_promotions, PromotionSource, StorePromotionSource};
use storefront_core::services::sales_analytics::SalesAnalytics;
use storefront_core::services::stock_resolver::{self, StockInfo};
use storefront_core::store::{DocumentStore, MemoryStore, PgDocumentStore};
use storefront_core::StorefrontError;

#[derive(Clone)]
pub struct AppState {
    pub products: ProductQueryService,
    pub pricing: Arc<PricingEngine>,
    pub promotions: Arc<dyn PromotionSource>,
    pub currency: Arc<CurrencyConverter>,
    pub events: Arc<dyn EventPublisher>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = AppConfig::from_env()?;

    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(config.database_max_connections).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            Arc::new(PgDocumentStore::new(db))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory document store");
            Arc::new(MemoryStore::new())
        }
    };

    let events: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsPublisher::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, events will only be logged");
                Arc::new(LogPublisher)
            }
        },
        None => Arc::new(LogPublisher),
    };

    let mut providers: Vec<Arc<dyn RateProvider>> = Vec::with_capacity(config.currency.providers.len());
    for p in &config.currency.providers {
        providers.push(Arc::new(HttpRateProvider::new(&p.name, &p.base_url, config.currency.timeout)?));
    }

    let state = AppState {
        products: ProductQueryService::new(store.clone()),
        pricing: Arc::new(PricingEngine::new(config.pricing.clone())),
        promotions: Arc::new(StorePromotionSource::new(store)),
        currency: Arc::new(CurrencyConverter::new(providers, config.currency.retry)),
        events,
    };

    let app = Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront-core"})) }))
        .route("/api/v1/products", get(list_products))
        .route("/api/v1/products/:id", get(get_product).delete(deactivate_product))
        .route("/api/v1/products/:id/availability", post(check_availability))
        .route("/api/v1/products/:id/price", post(calculate_price))
        .route("/api/v1/products/:id/analytics", get(product_analytics))
        .route("/api/v1/products/:id/inventory", get(product_inventory))
        .route("/api/v1/inventory/stats", get(inventory_stats))
        .route("/api/v1/inventory/alerts/publish", post(publish_stock_alerts))
        .route("/api/v1/currency/convert", get(convert_currency))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()))
        .with_state(state);

    tracing::info!("Storefront core listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}

type ApiError = (StatusCode, String);

fn api_error(e: StorefrontError) -> ApiError {
    let status = e.status_code();
    if status.is_server_error() {
        tracing::error!(error = %e, "request failed");
    }
    (status, e.to_string())
}

fn invalid(e: impl std::fmt::Display) -> ApiError {
    api_error(StorefrontError::validation(e.to_string()))
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Deserialize)] pub struct ListParams { pub page: Option<u32>, pub per_page: Option<u32>, pub active: Option<bool> }

async fn list_products(State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<Page<Product>>, ApiError> {
    let page = s.products.list_products(p.active.unwrap_or(true), p.page.unwrap_or(1), p.per_page.unwrap_or(20)).await.map_err(api_error)?;
    Ok(Json(page))
}

async fn get_product(State(s): State<AppState>, Path(id): Path<String>) -> Result<Json<Product>, ApiError> {
    s.products.get_product(&id).await.map(Json).map_err(api_error)
}

async fn deactivate_product(State(s): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let events = s.products.deactivate_product(&id).await.map_err(api_error)?;
    publish_all(s.events.as_ref(), &events).await;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Availability and Pricing
// =============================================================================

/// `revision` is echoed back so clients can drop responses to superseded selections.
#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest { #[serde(default)] pub selection: Vec<SelectionEntry>, pub revision: Option<u64> }

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse { #[serde(flatten)] pub stock: StockInfo, pub revision: Option<u64> }

async fn check_availability(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<AvailabilityRequest>) -> Result<Json<AvailabilityResponse>, ApiError> {
    let product = s.products.get_product(&id).await.map_err(api_error)?;
    let selection = Selection::for_groups(product.variations(), r.selection).map_err(invalid)?;
    let stock = stock_resolver::resolve(&product, &selection).map_err(invalid)?;
    Ok(Json(AvailabilityResponse { stock, revision: r.revision }))
}

fn one() -> u32 { 1 }

#[derive(Debug, Deserialize, Validate)]
pub struct PriceRequest {
    #[serde(default)]
    pub selection: Vec<SelectionEntry>,
    #[serde(default = "one")]
    #[validate(range(min = 1, max = 9999))]
    pub quantity: u32,
    pub shipping_method: Option<String>,
    /// Re-express the breakdown in this currency.
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    pub revision: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ExchangeInfo { pub rate: Decimal, pub source: DataSource, pub provider: String }

#[derive(Debug, Serialize)]
pub struct PriceResponse { pub breakdown: PriceBreakdown, pub exchange: Option<ExchangeInfo>, pub revision: Option<u64> }

async fn calculate_price(State(s): State<AppState>, Path(id): Path<String>, Json(r): Json<PriceRequest>) -> Result<Json<PriceResponse>, ApiError> {
    r.validate().map_err(invalid)?;
    let product = s.products.get_product(&id).await.map_err(api_error)?;
    let selection = Selection::for_groups(product.variations(), r.selection).map_err(invalid)?;

    let (promotions, promotions_source) = load_promotions(s.promotions.as_ref(), product.id(), &selection).await;
    let context = PricingContext { promotions, promotions_source, shipping_method: r.shipping_method };
    let mut breakdown = s.pricing.price(&product, &selection, r.quantity, &context).map_err(api_error)?;

    let mut exchange = None;
    if let Some(target) = r.currency.as_deref() {
        let to = CurrencyCode::new(target).map_err(invalid)?;
        if to != breakdown.currency {
            let conversion = s.currency.convert(Decimal::ONE, breakdown.currency.as_str(), to.as_str()).await.map_err(api_error)?;
            breakdown = breakdown.convert(conversion.rate, to);
            exchange = Some(ExchangeInfo { rate: conversion.rate, source: conversion.source, provider: conversion.provider });
        }
    }
    Ok(Json(PriceResponse { breakdown, exchange, revision: r.revision }))
}

// =============================================================================
// Analytics and Inventory
// =============================================================================

async fn product_analytics(State(s): State<AppState>, Path(id): Path<String>) -> Result<Json<SalesAnalytics>, ApiError> {
    let product = s.products.get_product(&id).await.map_err(api_error)?;
    Ok(Json(s.products.sales_analytics(&product, Utc::now()).await))
}

async fn product_inventory(State(s): State<AppState>, Path(id): Path<String>) -> Result<Json<ProductInventoryOverview>, ApiError> {
    let product = s.products.get_product(&id).await.map_err(api_error)?;
    let analytics = s.products.sales_analytics(&product, Utc::now()).await;
    Ok(Json(inventory_summary::overview(&product, analytics)))
}

#[derive(Debug, Serialize)]
pub struct InventoryStatsResponse { #[serde(flatten)] pub stats: EnhancedProductStats, pub alerts: Option<Vec<StockAlert>>, pub alerts_source: DataSource }

async fn inventory_stats(State(s): State<AppState>) -> Result<Json<InventoryStatsResponse>, ApiError> {
    let products = s.products.catalog(false).await.map_err(api_error)?;
    let stats = inventory_summary::build_fleet_stats(&products);
    let (alerts, alerts_source) = match s.products.stock_alerts().await {
        Ok(alerts) => (alerts, DataSource::Live),
        Err(e) => {
            tracing::warn!(error = %e, "stock alerts unavailable");
            (Some(vec![]), DataSource::Fallback)
        }
    };
    Ok(Json(InventoryStatsResponse { stats, alerts, alerts_source }))
}

async fn publish_stock_alerts(State(s): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let products = s.products.catalog(true).await.map_err(api_error)?;
    let events = inventory_summary::stock_events(&products);
    let published = publish_all(s.events.as_ref(), &events).await;
    Ok(Json(serde_json::json!({"events": events.len(), "published": published})))
}

// =============================================================================
// Currency
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct ConvertParams {
    pub amount: Decimal,
    #[validate(length(equal = 3))]
    pub from: String,
    #[validate(length(equal = 3))]
    pub to: String,
}

async fn convert_currency(State(s): State<AppState>, Query(p): Query<ConvertParams>) -> Result<Json<Conversion>, ApiError> {
    p.validate().map_err(invalid)?;
    s.currency.convert(p.amount, &p.from, &p.to).await.map(Json).map_err(api_error)
}
