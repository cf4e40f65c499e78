//! HTTP API subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware stack)
//!     → request.rs (request ID assigned and echoed)
//!     → params.rs (query parsing and validation)
//!     → handlers.rs (store lookups, live query orchestration)
//!     → response.rs (JSON bodies, error → status mapping)
//!     → Send to client
//! ```

pub mod handlers;
pub mod params;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use response::{ApiError, EventDetailResponse, EventListResponse, ResponseSource};
pub use server::{build_router, AppState, HttpServer};
