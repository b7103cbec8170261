//! HTTP API handlers for trv-server

pub mod error;
pub mod health;
pub mod media;
pub mod rows;
pub mod ws;

pub use error::ApiError;
pub use health::health_routes;
pub use media::serve_media;
pub use rows::{list_rows, update_row};
pub use ws::ws_handler;
