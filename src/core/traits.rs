//! Core traits for the data layer
//!
//! These are the seams between the request-caching layer and the outside
//! world: how requests reach the network and how link paths become URLs.

use async_trait::async_trait;

use super::{
    error::DataResult,
    request::{RawResponse, RestRequest},
};

/// Executes a request against the backend.
///
/// Any HTTP response, whatever its status, is `Ok`. `Err` means no response
/// was obtained at all.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &RestRequest) -> DataResult<RawResponse>;
}

/// Resolves a link path such as `groups` to the endpoint URL serving it.
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    async fn endpoint(&self, link_path: &str) -> DataResult<String>;
}

/// Entities addressable by a server-assigned identifier.
pub trait Identifiable {
    /// `None` until the backend has created the entity.
    fn id(&self) -> Option<&str>;

    fn set_id(&mut self, id: String);
}
