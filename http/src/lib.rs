//! HTTP boundary adapters and bootstrap wiring (C6, C7).

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
