//! Quote Retrieval Server
//!
//! HTTP transport for the semantic quote search pipeline.

pub mod http;
pub mod state;

pub use http::create_router;
pub use state::AppState;
