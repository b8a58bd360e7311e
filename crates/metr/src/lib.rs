pub mod api;
pub mod chat;
pub mod errors;
pub mod location;
pub mod markdown;
pub mod models;
pub mod store;
