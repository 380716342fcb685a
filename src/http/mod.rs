//! HTTP API layer: the trigger/ad-hoc-task/control surface that mirrors
//! the original trigger service's REST endpoints.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
