use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::ActorContext,
    entities::link::{self, Entity as LinkEntity, LinkStatus, Model as LinkModel},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Serialize, Deserialize)]
pub struct LinkResponse {
    pub id: Uuid,
    pub supplier_id: Uuid,
    pub consumer_id: Uuid,
    pub status: String,
    pub is_active: bool,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<LinkModel> for LinkResponse {
    fn from(model: LinkModel) -> Self {
        Self {
            id: model.id,
            supplier_id: model.supplier_id,
            consumer_id: model.consumer_id,
            status: model.status,
            is_active: model.is_active,
            created_at: model.created_at,
        }
    }
}

/// Service managing the supplier/consumer approval workflow.
///
/// The order core depends on this service only through
/// [`LinkService::has_accepted_link`].
#[derive(Clone)]
pub struct LinkService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl LinkService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Whether an active, ACCEPTED link exists between the pair.
    ///
    /// PENDING and BLOCKED links answer `false`; for authorization purposes
    /// they are indistinguishable from an absent link.
    #[instrument(skip(self))]
    pub async fn has_accepted_link(
        &self,
        supplier_id: Uuid,
        consumer_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let count = LinkEntity::find()
            .filter(link::Column::SupplierId.eq(supplier_id))
            .filter(link::Column::ConsumerId.eq(consumer_id))
            .filter(link::Column::Status.eq(LinkStatus::Accepted.to_string()))
            .filter(link::Column::IsActive.eq(true))
            .count(&*self.db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to check link existence");
                ServiceError::DatabaseError(e)
            })?;

        Ok(count > 0)
    }

    /// Consumer requests a link to a supplier (PENDING until answered).
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn request_link(
        &self,
        actor: &ActorContext,
        supplier_id: Uuid,
    ) -> Result<LinkResponse, ServiceError> {
        let consumer_id = actor.require_consumer()?;

        let existing = LinkEntity::find()
            .filter(link::Column::SupplierId.eq(supplier_id))
            .filter(link::Column::ConsumerId.eq(consumer_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "A link with this supplier already exists".to_string(),
            ));
        }

        let link_id = Uuid::new_v4();
        let model = link::ActiveModel {
            id: Set(link_id),
            supplier_id: Set(supplier_id),
            consumer_id: Set(consumer_id),
            status: Set(LinkStatus::Pending.to_string()),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            error!(error = %e, supplier_id = %supplier_id, "Failed to create link request");
            ServiceError::from_db(e)
        })?;

        info!(link_id = %link_id, supplier_id = %supplier_id, "Link requested");
        self.event_sender.emit(Event::LinkRequested(link_id)).await;

        Ok(model.into())
    }

    /// Supplier answers a pending link request with ACCEPTED or BLOCKED.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id, link_id = %link_id))]
    pub async fn respond_link(
        &self,
        actor: &ActorContext,
        link_id: Uuid,
        status: LinkStatus,
    ) -> Result<LinkResponse, ServiceError> {
        let supplier_id = actor.require_supplier()?;

        if status == LinkStatus::Pending {
            return Err(ServiceError::ValidationError(
                "A link request can only be answered with ACCEPTED or BLOCKED".to_string(),
            ));
        }

        let link = LinkEntity::find_by_id(link_id)
            .filter(link::Column::SupplierId.eq(supplier_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                warn!(link_id = %link_id, "Link not found for supplier");
                ServiceError::NotFound("Link not found".to_string())
            })?;

        let mut active: link::ActiveModel = link.into();
        active.status = Set(status.to_string());
        let updated = active.update(&*self.db).await.map_err(|e| {
            error!(error = %e, link_id = %link_id, "Failed to update link status");
            ServiceError::from_db(e)
        })?;

        info!(link_id = %link_id, status = %status, "Link request answered");
        self.event_sender
            .emit(Event::LinkResponded {
                link_id,
                status: status.to_string(),
            })
            .await;

        Ok(updated.into())
    }

    /// Lists links visible to the actor (their own side of the pair).
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn list_links(&self, actor: &ActorContext) -> Result<Vec<LinkResponse>, ServiceError> {
        let mut query = LinkEntity::find();
        query = match (actor.supplier_id, actor.consumer_id) {
            (Some(supplier_id), _) => query.filter(link::Column::SupplierId.eq(supplier_id)),
            (_, Some(consumer_id)) => query.filter(link::Column::ConsumerId.eq(consumer_id)),
            _ => {
                return Err(ServiceError::Forbidden(
                    "Actor has no company affiliation".to_string(),
                ))
            }
        };

        let links = query
            .order_by_desc(link::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(links.into_iter().map(LinkResponse::from).collect())
    }
}

/// Parses a link status string from client input.
pub fn parse_link_status(value: &str) -> Result<LinkStatus, ServiceError> {
    LinkStatus::from_str(value)
        .map_err(|_| ServiceError::ValidationError(format!("Unknown link status: {value}")))
}
