pub mod auth;
pub mod client;

pub use auth::{MetadataTokenProvider, StaticTokenProvider, TokenProvider};
pub use client::{endpoint, error_for_response, GcpHttpClient};
