use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::ActorContext,
    entities::product::{self, Entity as ProductEntity, Model as ProductModel},
    errors::ServiceError,
    services::links::LinkService,
};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255, message = "Product name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1, max = 50, message = "Unit is required"))]
    pub unit: String,
    pub unit_price: Decimal,
    pub discount_price: Option<Decimal>,
    pub stock_level: i32,
    #[serde(default = "default_min_order_qty")]
    pub min_order_qty: i32,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

fn default_min_order_qty() -> i32 {
    1
}
fn default_true() -> bool {
    true
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit: Option<String>,
    pub unit_price: Option<Decimal>,
    pub discount_price: Option<Option<Decimal>>,
    pub stock_level: Option<i32>,
    pub min_order_qty: Option<i32>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProductResponse {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub name: String,
    pub description: String,
    pub unit: String,
    pub unit_price: Decimal,
    pub discount_price: Option<Decimal>,
    pub stock_level: i32,
    pub min_order_qty: i32,
    pub is_available: bool,
    pub is_archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<ProductModel> for ProductResponse {
    fn from(model: ProductModel) -> Self {
        Self {
            id: model.id,
            supplier_id: model.supplier_id,
            name: model.name,
            description: model.description,
            unit: model.unit,
            unit_price: model.unit_price,
            discount_price: model.discount_price,
            stock_level: model.stock_level,
            min_order_qty: model.min_order_qty,
            is_available: model.is_available,
            is_archived: model.is_archived,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Supplier-side catalog management and consumer-side catalog browsing.
///
/// Catalog edits never touch reserved stock accounting: order placement and
/// restocking go through the order services, which lock product rows.
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
    links: Arc<LinkService>,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>, links: Arc<LinkService>) -> Self {
        Self { db, links }
    }

    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id))]
    pub async fn create_product(
        &self,
        actor: &ActorContext,
        request: CreateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        let supplier_id = actor.require_supplier()?;
        request.validate()?;

        if request.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Unit price cannot be negative".to_string(),
            ));
        }
        if request.stock_level < 0 {
            return Err(ServiceError::ValidationError(
                "Stock level cannot be negative".to_string(),
            ));
        }
        if request.min_order_qty < 1 {
            return Err(ServiceError::ValidationError(
                "Minimum order quantity must be at least 1".to_string(),
            ));
        }

        let product_id = Uuid::new_v4();
        let model = product::ActiveModel {
            id: Set(product_id),
            supplier_id: Set(supplier_id),
            name: Set(request.name),
            description: Set(request.description),
            unit: Set(request.unit),
            unit_price: Set(request.unit_price),
            discount_price: Set(request.discount_price),
            stock_level: Set(request.stock_level),
            min_order_qty: Set(request.min_order_qty),
            is_available: Set(request.is_available),
            is_archived: Set(false),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create product");
            ServiceError::from_db(e)
        })?;

        info!(product_id = %product_id, supplier_id = %supplier_id, "Product created");
        Ok(model.into())
    }

    /// Updates a product owned by the actor. Archived products are immutable.
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, product_id = %product_id))]
    pub async fn update_product(
        &self,
        actor: &ActorContext,
        product_id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        let supplier_id = actor.require_supplier()?;
        let product = self.owned_product(supplier_id, product_id).await?;

        if product.is_archived {
            return Err(ServiceError::ValidationError(
                "Archived products cannot be edited".to_string(),
            ));
        }
        if matches!(request.unit_price, Some(p) if p < Decimal::ZERO) {
            return Err(ServiceError::ValidationError(
                "Unit price cannot be negative".to_string(),
            ));
        }
        if matches!(request.stock_level, Some(level) if level < 0) {
            return Err(ServiceError::ValidationError(
                "Stock level cannot be negative".to_string(),
            ));
        }

        let mut active: product::ActiveModel = product.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(description) = request.description {
            active.description = Set(description);
        }
        if let Some(unit) = request.unit {
            active.unit = Set(unit);
        }
        if let Some(unit_price) = request.unit_price {
            active.unit_price = Set(unit_price);
        }
        if let Some(discount_price) = request.discount_price {
            active.discount_price = Set(discount_price);
        }
        if let Some(stock_level) = request.stock_level {
            active.stock_level = Set(stock_level);
        }
        if let Some(min_order_qty) = request.min_order_qty {
            active.min_order_qty = Set(min_order_qty);
        }
        if let Some(is_available) = request.is_available {
            active.is_available = Set(is_available);
        }

        let updated = active.update(&*self.db).await.map_err(|e| {
            error!(error = %e, product_id = %product_id, "Failed to update product");
            ServiceError::from_db(e)
        })?;

        Ok(updated.into())
    }

    /// Archives a product: it disappears from catalogs and new orders but
    /// remains referenced by historical order items.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id, product_id = %product_id))]
    pub async fn archive_product(
        &self,
        actor: &ActorContext,
        product_id: Uuid,
    ) -> Result<ProductResponse, ServiceError> {
        let supplier_id = actor.require_supplier()?;
        let product = self.owned_product(supplier_id, product_id).await?;

        let mut active: product::ActiveModel = product.into();
        active.is_archived = Set(true);
        active.is_available = Set(false);
        let archived = active.update(&*self.db).await.map_err(|e| {
            error!(error = %e, product_id = %product_id, "Failed to archive product");
            ServiceError::from_db(e)
        })?;

        info!(product_id = %product_id, "Product archived");
        Ok(archived.into())
    }

    /// Lists a supplier's catalog.
    ///
    /// Suppliers see their own full catalog including archived entries;
    /// consumers see only available, unarchived products and only for
    /// suppliers they hold an accepted link with.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn list_products(
        &self,
        actor: &ActorContext,
        supplier_id: Uuid,
    ) -> Result<Vec<ProductResponse>, ServiceError> {
        let mut query = ProductEntity::find().filter(product::Column::SupplierId.eq(supplier_id));

        if actor.supplier_id == Some(supplier_id) {
            // Own catalog, unfiltered.
        } else {
            let consumer_id = actor.require_consumer()?;
            if !self.links.has_accepted_link(supplier_id, consumer_id).await? {
                warn!(consumer_id = %consumer_id, "Catalog request without an accepted link");
                return Err(ServiceError::ValidationError(
                    "You do not have an active link with this supplier".to_string(),
                ));
            }
            query = query
                .filter(product::Column::IsArchived.eq(false))
                .filter(product::Column::IsAvailable.eq(true));
        }

        let products = query
            .order_by_asc(product::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(products.into_iter().map(ProductResponse::from).collect())
    }

    async fn owned_product(
        &self,
        supplier_id: Uuid,
        product_id: Uuid,
    ) -> Result<ProductModel, ServiceError> {
        ProductEntity::find()
            .filter(product::Column::Id.eq(product_id))
            .filter(product::Column::SupplierId.eq(supplier_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))
    }
}
