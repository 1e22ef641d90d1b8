pub mod deliveries;
pub mod health;
pub mod webhooks;
