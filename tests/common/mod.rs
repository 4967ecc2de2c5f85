#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait, Set};
use sea_orm_migration::MigratorTrait;
use tokio::sync::mpsc;
use uuid::Uuid;

use supplylink_api::{
    auth::ActorContext,
    config::AppConfig,
    entities::{consumer, link, link::LinkStatus, product, supplier},
    events::{Event, EventSender},
    handlers::AppServices,
    migrator::Migrator,
    AppState,
};

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Test harness: services over a fresh in-memory SQLite database.
///
/// A single pooled connection keeps every statement on the one shared
/// in-memory database.
pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub services: AppServices,
    pub event_sender: EventSender,
    pub events: mpsc::Receiver<Event>,
}

impl TestApp {
    /// The full HTTP router backed by this harness's database.
    pub fn router(&self) -> axum::Router {
        let config = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18080,
            "test".to_string(),
        );
        let state = AppState {
            db: self.db.clone(),
            config,
            event_sender: self.event_sender.clone(),
            services: self.services.clone(),
        };
        supplylink_api::app_router(state)
    }
}

pub async fn setup() -> TestApp {
    let mut opt = ConnectOptions::new("sqlite::memory:".to_owned());
    opt.max_connections(1).min_connections(1);
    let db = Arc::new(Database::connect(opt).await.expect("db connect"));
    Migrator::up(&*db, None).await.expect("migrations");

    let (tx, rx) = mpsc::channel(64);
    let event_sender = EventSender::new(tx);
    let services = AppServices::new(db.clone(), event_sender.clone());

    TestApp {
        db,
        services,
        event_sender,
        events: rx,
    }
}

pub async fn seed_supplier(db: &DatabaseConnection, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    supplier::ActiveModel {
        id: Set(id),
        company_name: Set(name.to_string()),
        address: Set("Silicon Valley".to_string()),
        is_active: Set(true),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("seed supplier");
    id
}

pub async fn seed_consumer(db: &DatabaseConnection, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    consumer::ActiveModel {
        id: Set(id),
        company_name: Set(name.to_string()),
        address: Set("NYC".to_string()),
        delivery_option: Set("BOTH".to_string()),
        lead_time_days: Set(1),
        is_active: Set(true),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("seed consumer");
    id
}

pub async fn seed_link(
    db: &DatabaseConnection,
    supplier_id: Uuid,
    consumer_id: Uuid,
    status: LinkStatus,
) -> Uuid {
    let id = Uuid::new_v4();
    link::ActiveModel {
        id: Set(id),
        supplier_id: Set(supplier_id),
        consumer_id: Set(consumer_id),
        status: Set(status.to_string()),
        is_active: Set(true),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("seed link");
    id
}

pub async fn seed_product(
    db: &DatabaseConnection,
    supplier_id: Uuid,
    name: &str,
    unit_price: Decimal,
    stock_level: i32,
) -> Uuid {
    let id = Uuid::new_v4();
    product::ActiveModel {
        id: Set(id),
        supplier_id: Set(supplier_id),
        name: Set(name.to_string()),
        description: Set(String::new()),
        unit: Set("pcs".to_string()),
        unit_price: Set(unit_price),
        discount_price: Set(None),
        stock_level: Set(stock_level),
        min_order_qty: Set(1),
        is_available: Set(true),
        is_archived: Set(false),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    }
    .insert(db)
    .await
    .expect("seed product");
    id
}

pub async fn stock_level(db: &DatabaseConnection, product_id: Uuid) -> i32 {
    product::Entity::find_by_id(product_id)
        .one(db)
        .await
        .expect("fetch product")
        .expect("product exists")
        .stock_level
}

pub async fn archive_product_row(db: &DatabaseConnection, product_id: Uuid) {
    let model = product::Entity::find_by_id(product_id)
        .one(db)
        .await
        .expect("fetch product")
        .expect("product exists");
    let mut active: product::ActiveModel = model.into();
    active.is_archived = Set(true);
    active.is_available = Set(false);
    active.update(db).await.expect("archive product");
}

pub fn consumer_actor(consumer_id: Uuid) -> ActorContext {
    ActorContext::consumer(Uuid::new_v4(), consumer_id)
}

pub fn supplier_actor(supplier_id: Uuid) -> ActorContext {
    ActorContext::supplier(Uuid::new_v4(), supplier_id)
}
