pub mod app;
pub mod classify;
pub mod config;
pub mod edit;
pub mod export;
pub mod loader;
pub mod metrics_server;
pub mod notice;
pub mod observability;
pub mod search;
pub mod selection;
pub mod server;

pub use app::{EditorError, LoadStatus, MeterEditor};
