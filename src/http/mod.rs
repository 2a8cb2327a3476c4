//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, hostname)
//!     → routing layer resolves (host, path) to a backend
//!     → server.rs forwards to the backend and streams the response back
//! ```

pub mod request;
pub mod server;

pub use request::{request_host, UuidRequestId, X_REQUEST_ID};
pub use server::HttpServer;
