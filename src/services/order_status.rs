use std::str::FromStr;
use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QuerySelect, Set, TransactionTrait,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::ActorContext,
    entities::order::{self, Entity as OrderEntity, OrderStatus},
    entities::order_item::{self, Entity as OrderItemEntity},
    entities::product::{self, Entity as ProductEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    services::orders::{load_items, order_response, OrderResponse},
};

/// Post-creation order lifecycle: supplier-driven status transitions and the
/// compensating stock restoration for declined or canceled orders.
#[derive(Clone)]
pub struct OrderStatusService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl OrderStatusService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Transitions an order to `new_status`.
    ///
    /// The order row is locked for the duration of the transaction, so two
    /// concurrent updates of the same order serialize and the restock
    /// compensation can never run twice. Entering DECLINED or CANCELED from a
    /// different status restores every item's quantity to its product, in the
    /// same atomic unit as the status write.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id, order_id = %order_id, new_status = %new_status))]
    pub async fn update_status(
        &self,
        actor: &ActorContext,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<OrderResponse, ServiceError> {
        let supplier_id = actor.require_supplier()?;

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to start status transaction");
            ServiceError::from_db(e)
        })?;

        // Scoped to the actor's supplier: a foreign order is indistinguishable
        // from a missing one.
        let order = OrderEntity::find()
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::SupplierId.eq(supplier_id))
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to lock order row");
                ServiceError::from_db(e)
            })?
            .ok_or_else(|| {
                warn!(order_id = %order_id, "Order not found for status update");
                ServiceError::NotFound("Order not found".to_string())
            })?;

        let old_status = OrderStatus::from_str(&order.status).map_err(|_| {
            ServiceError::InternalError(format!("order {order_id} has corrupt status"))
        })?;

        if !is_valid_transition(old_status, new_status) {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot transition from status '{old_status}' to '{new_status}'"
            )));
        }

        let changed = old_status != new_status;
        if changed && new_status.restocks() {
            self.restock_items(&txn, order_id).await?;
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status.to_string());
        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to update order status");
            ServiceError::from_db(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit status transaction");
            ServiceError::from_db(e)
        })?;

        info!(
            order_id = %order_id,
            old_status = %old_status,
            new_status = %new_status,
            "Order status updated"
        );

        if changed {
            self.event_sender
                .emit(Event::OrderStatusChanged {
                    order_id,
                    old_status: old_status.to_string(),
                    new_status: new_status.to_string(),
                })
                .await;
        }

        let items = load_items(&*self.db, order_id).await?;
        Ok(order_response(updated, items))
    }

    /// Returns every item's quantity to its product's stock level.
    ///
    /// Products are located strictly by the item's product_id: rows that have
    /// been archived or made unavailable since the order was placed still
    /// restock.
    async fn restock_items(
        &self,
        txn: &DatabaseTransaction,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to load items for restock");
                ServiceError::from_db(e)
            })?;

        for item in items {
            let product = ProductEntity::find()
                .filter(product::Column::Id.eq(item.product_id))
                .lock_exclusive()
                .one(txn)
                .await
                .map_err(|e| {
                    error!(error = %e, product_id = %item.product_id, "Failed to lock product for restock");
                    ServiceError::from_db(e)
                })?
                .ok_or_else(|| {
                    // The FK is protective; a missing product here is corruption.
                    ServiceError::InternalError(format!(
                        "product {} referenced by order {} no longer exists",
                        item.product_id, order_id
                    ))
                })?;

            let restored = product.stock_level + item.quantity;
            let mut active: product::ActiveModel = product.into();
            active.stock_level = Set(restored);
            active.update(txn).await.map_err(|e| {
                error!(error = %e, product_id = %item.product_id, "Failed to restock product");
                ServiceError::from_db(e)
            })?;
        }

        Ok(())
    }
}

/// Explicit transition table for order statuses.
///
/// Same-status transitions are accepted as no-ops. Delivered, Canceled and
/// Declined are terminal. Because a terminal state can never be left,
/// re-entering DECLINED or CANCELED is impossible and the restock
/// compensation runs at most once per order.
pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    use OrderStatus::*;
    match (from, to) {
        (Pending, Confirmed) => true,
        (Pending, Declined) => true,
        (Pending, Canceled) => true,
        (Confirmed, Shipped) => true,
        (Confirmed, Canceled) => true,
        (Shipped, Delivered) => true,
        _ if from == to => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OrderStatus::*;

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(is_valid_transition(Pending, Confirmed));
        assert!(is_valid_transition(Pending, Declined));
        assert!(is_valid_transition(Pending, Canceled));
        assert!(is_valid_transition(Confirmed, Shipped));
        assert!(is_valid_transition(Confirmed, Canceled));
        assert!(is_valid_transition(Shipped, Delivered));
    }

    #[test]
    fn terminal_states_cannot_be_left() {
        for terminal in [Delivered, Canceled, Declined] {
            for target in [Pending, Confirmed, Shipped, Delivered, Canceled, Declined] {
                if target != terminal {
                    assert!(
                        !is_valid_transition(terminal, target),
                        "{terminal} -> {target} must be rejected"
                    );
                }
            }
        }
    }

    #[test]
    fn backward_transitions_are_rejected() {
        assert!(!is_valid_transition(Confirmed, Pending));
        assert!(!is_valid_transition(Delivered, Shipped));
        assert!(!is_valid_transition(Shipped, Confirmed));
    }

    #[test]
    fn same_status_is_a_no_op() {
        for status in [Pending, Confirmed, Shipped, Delivered, Canceled, Declined] {
            assert!(is_valid_transition(status, status));
        }
    }
}
