pub mod links;
pub mod orders;
pub mod products;

use std::sync::Arc;

use crate::db::DbPool;
use crate::events::EventSender;

pub use crate::AppState;

/// Services layer used by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub links: Arc<crate::services::links::LinkService>,
    pub products: Arc<crate::services::products::ProductService>,
    pub orders: Arc<crate::services::orders::OrderService>,
    pub order_status: Arc<crate::services::order_status::OrderStatusService>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        let links = Arc::new(crate::services::links::LinkService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let products = Arc::new(crate::services::products::ProductService::new(
            db.clone(),
            links.clone(),
        ));
        let orders = Arc::new(crate::services::orders::OrderService::new(
            db.clone(),
            links.clone(),
            event_sender.clone(),
        ));
        let order_status = Arc::new(crate::services::order_status::OrderStatusService::new(
            db,
            event_sender,
        ));

        Self {
            links,
            products,
            orders,
            order_status,
        }
    }
}
