pub mod links;
pub mod order_status;
pub mod orders;
pub mod products;
