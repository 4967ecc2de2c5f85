use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::ActorContext,
    entities::order::{self, Entity as OrderEntity, Model as OrderModel, OrderStatus},
    entities::order_item::{self, Entity as OrderItemEntity},
    entities::product::{self, Entity as ProductEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    services::links::LinkService,
};

/// One requested line of a new order.
#[derive(Debug, Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub supplier_id: Uuid,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<OrderItemRequest>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_unit: String,
    pub quantity: i32,
    pub price_at_time_of_order: Decimal,
    pub total_price: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub consumer_id: Uuid,
    pub supplier_id: Uuid,
    pub status: String,
    pub total_amount: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Order placement and retrieval.
///
/// `create_order` is the single write path that reserves stock: it runs as
/// one database transaction, taking an exclusive row lock on every referenced
/// product so that concurrent orders against the same product serialize and
/// `stock_level` can never go negative.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    links: Arc<LinkService>,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        links: Arc<LinkService>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            links,
            event_sender,
        }
    }

    /// Places an order: all-or-nothing.
    ///
    /// Validates the actor and the authorization link, then inside a single
    /// transaction creates the order header, and for each line locks the
    /// product row, checks and deducts stock, and snapshots the unit price
    /// into the order item. Any failure rolls the whole unit back; no order,
    /// item or stock change survives a failed call.
    #[instrument(skip(self, actor, request), fields(user_id = %actor.user_id, supplier_id = %request.supplier_id))]
    pub async fn create_order(
        &self,
        actor: &ActorContext,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        let consumer_id = actor.require_consumer()?;
        request.validate()?;

        if !self
            .links
            .has_accepted_link(request.supplier_id, consumer_id)
            .await?
        {
            warn!(consumer_id = %consumer_id, "Order attempt without an accepted link");
            return Err(ServiceError::ValidationError(
                "You do not have an active link with this supplier".to_string(),
            ));
        }

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start order transaction");
            ServiceError::from_db(e)
        })?;

        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let order = order::ActiveModel {
            id: Set(order_id),
            consumer_id: Set(consumer_id),
            supplier_id: Set(request.supplier_id),
            status: Set(OrderStatus::Pending.to_string()),
            total_amount: Set(Decimal::ZERO),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to create order header");
            ServiceError::from_db(e)
        })?;

        let mut total_amount = Decimal::ZERO;
        let mut items = Vec::with_capacity(request.items.len());

        // Items are processed in caller order; the first invalid one aborts
        // the transaction and its error is the one the caller sees.
        for line in &request.items {
            let (item, name, unit) =
                Self::reserve_line(&txn, order_id, request.supplier_id, line).await?;
            total_amount += item.total_price();
            items.push(item_response(item, name, unit));
        }

        let mut order_active: order::ActiveModel = order.into();
        order_active.total_amount = Set(total_amount);
        let order = order_active.update(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to persist order total");
            ServiceError::from_db(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order transaction");
            ServiceError::from_db(e)
        })?;

        info!(
            order_id = %order_id,
            consumer_id = %consumer_id,
            total_amount = %total_amount,
            "Order placed"
        );

        // Post-commit, best-effort: a lost notification never unwinds an order.
        self.event_sender.emit(Event::OrderCreated(order_id)).await;

        Ok(order_response(order, items))
    }

    /// Reserves stock for one line inside the placement transaction.
    ///
    /// The product row is read under an exclusive lock (SELECT ... FOR
    /// UPDATE) scoped to the ordering supplier, so a missing product and a
    /// cross-supplier reference are deliberately the same error.
    async fn reserve_line<C: ConnectionTrait>(
        txn: &C,
        order_id: Uuid,
        supplier_id: Uuid,
        line: &OrderItemRequest,
    ) -> Result<(order_item::Model, String, String), ServiceError> {
        let product = ProductEntity::find()
            .filter(product::Column::Id.eq(line.product_id))
            .filter(product::Column::SupplierId.eq(supplier_id))
            .filter(product::Column::IsArchived.eq(false))
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %line.product_id, "Failed to lock product row");
                ServiceError::from_db(e)
            })?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Product {} not found or belongs to another supplier",
                    line.product_id
                ))
            })?;

        if line.quantity < 1 {
            return Err(ServiceError::ValidationError(
                "You have to order at least 1 item".to_string(),
            ));
        }

        if product.stock_level < line.quantity {
            return Err(ServiceError::InsufficientStock {
                product: product.name.clone(),
                requested: line.quantity,
                available: product.stock_level,
            });
        }

        let price = product.unit_price;
        let name = product.name.clone();
        let unit = product.unit.clone();
        let remaining = product.stock_level - line.quantity;

        let mut product_active: product::ActiveModel = product.into();
        product_active.stock_level = Set(remaining);
        product_active.update(txn).await.map_err(|e| {
            error!(error = %e, product_id = %line.product_id, "Failed to deduct stock");
            ServiceError::from_db(e)
        })?;

        let item = order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            price_at_time_of_order: Set(price),
            created_at: Set(Utc::now()),
        }
        .insert(txn)
        .await
        .map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to create order item");
            ServiceError::from_db(e)
        })?;

        Ok((item, name, unit))
    }

    /// Retrieves an order visible to the actor, with its items.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id, order_id = %order_id))]
    pub async fn get_order(
        &self,
        actor: &ActorContext,
        order_id: Uuid,
    ) -> Result<OrderResponse, ServiceError> {
        let order = self
            .visible_orders(actor)?
            .filter(order::Column::Id.eq(order_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))?;

        let items = load_items(&*self.db, order.id).await?;
        Ok(order_response(order, items))
    }

    /// Lists orders visible to the actor, most recent first.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn list_orders(
        &self,
        actor: &ActorContext,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let paginator = self
            .visible_orders(actor)?
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let orders = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut responses = Vec::with_capacity(orders.len());
        for order in orders {
            let items = load_items(&*self.db, order.id).await?;
            responses.push(order_response(order, items));
        }

        Ok(OrderListResponse {
            orders: responses,
            total,
            page,
            per_page,
        })
    }

    /// Consumers see orders they placed; suppliers see orders received.
    fn visible_orders(
        &self,
        actor: &ActorContext,
    ) -> Result<sea_orm::Select<OrderEntity>, ServiceError> {
        match (actor.consumer_id, actor.supplier_id) {
            (Some(consumer_id), _) => {
                Ok(OrderEntity::find().filter(order::Column::ConsumerId.eq(consumer_id)))
            }
            (_, Some(supplier_id)) => {
                Ok(OrderEntity::find().filter(order::Column::SupplierId.eq(supplier_id)))
            }
            _ => Err(ServiceError::Forbidden(
                "Actor has no company affiliation".to_string(),
            )),
        }
    }
}

/// Loads the items of an order together with their product names.
pub(crate) async fn load_items<C: ConnectionTrait>(
    db: &C,
    order_id: Uuid,
) -> Result<Vec<OrderItemResponse>, ServiceError> {
    let rows = OrderItemEntity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .find_also_related(ProductEntity)
        .all(db)
        .await
        .map_err(ServiceError::DatabaseError)?;

    Ok(rows
        .into_iter()
        .map(|(item, product)| {
            let (name, unit) = product
                .map(|p| (p.name, p.unit))
                .unwrap_or_else(|| (String::new(), String::new()));
            item_response(item, name, unit)
        })
        .collect())
}

pub(crate) fn item_response(
    item: order_item::Model,
    product_name: String,
    product_unit: String,
) -> OrderItemResponse {
    OrderItemResponse {
        id: item.id,
        product_id: item.product_id,
        product_name,
        product_unit,
        quantity: item.quantity,
        total_price: item.total_price(),
        price_at_time_of_order: item.price_at_time_of_order,
    }
}

pub(crate) fn order_response(order: OrderModel, items: Vec<OrderItemResponse>) -> OrderResponse {
    OrderResponse {
        id: order.id,
        consumer_id: order.consumer_id,
        supplier_id: order.supplier_id,
        status: order.status,
        total_amount: order.total_amount,
        is_active: order.is_active,
        created_at: order.created_at,
        updated_at: order.updated_at,
        items,
    }
}

/// Parses an order status string from client input.
pub fn parse_order_status(value: &str) -> Result<OrderStatus, ServiceError> {
    OrderStatus::from_str(value)
        .map_err(|_| ServiceError::InvalidStatus(format!("Unknown order status: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn order_response_preserves_totals() {
        let now = Utc::now();
        let order = OrderModel {
            id: Uuid::new_v4(),
            consumer_id: Uuid::new_v4(),
            supplier_id: Uuid::new_v4(),
            status: OrderStatus::Pending.to_string(),
            total_amount: dec!(2250.00),
            is_active: true,
            created_at: now,
            updated_at: Some(now),
        };

        let response = order_response(order, Vec::new());
        assert_eq!(response.status, "PENDING");
        assert_eq!(response.total_amount, dec!(2250.00));
    }

    #[test]
    fn unknown_status_string_is_rejected() {
        assert!(parse_order_status("SHIPPED").is_ok());
        assert!(parse_order_status("REFUNDED").is_err());
        assert!(parse_order_status("pending").is_err());
    }
}
