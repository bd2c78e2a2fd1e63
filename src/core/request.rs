//! Requests submitted to the registry and the raw responses they produce.

use bytes::Bytes;
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;

use super::error::{DataError, DataResult};
use crate::data::FindListOptions;

/// Opaque identifier handed out by the registry for every request.
pub type RequestId = String;

/// A backend call, immutable once it has been configured on the registry.
#[derive(Debug, Clone)]
pub struct RestRequest {
    pub id: RequestId,
    pub href: String,
    pub method: Method,
    pub options: Option<FindListOptions>,
    pub body: Option<Bytes>,
}

impl RestRequest {
    pub fn get(id: RequestId, href: impl Into<String>) -> Self {
        Self {
            id,
            href: href.into(),
            method: Method::GET,
            options: None,
            body: None,
        }
    }

    /// GET for a collection endpoint, keeping the options it was built from.
    pub fn find_list(id: RequestId, href: impl Into<String>, options: FindListOptions) -> Self {
        Self {
            options: Some(options),
            ..Self::get(id, href)
        }
    }

    pub fn post(id: RequestId, href: impl Into<String>, body: Bytes) -> Self {
        Self {
            id,
            href: href.into(),
            method: Method::POST,
            options: None,
            body: Some(body),
        }
    }

    pub fn put(id: RequestId, href: impl Into<String>, body: Bytes) -> Self {
        Self {
            method: Method::PUT,
            ..Self::post(id, href, body)
        }
    }

    pub fn delete(id: RequestId, href: impl Into<String>) -> Self {
        Self {
            method: Method::DELETE,
            ..Self::get(id, href)
        }
    }

    /// Only GETs are deduplicated and indexed by href.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET
    }
}

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> DataResult<T> {
        serde_json::from_slice(&self.body).map_err(DataError::from)
    }

    /// Message used when the response is turned into an error.
    ///
    /// The backend reports failures as `{"message": ...}`; anything else falls
    /// back to the body text, then to the status reason.
    pub fn error_message(&self) -> String {
        if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&self.body) {
            if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
                return message.to_string();
            }
        }
        let text = String::from_utf8_lossy(&self.body).trim().to_string();
        if text.is_empty() {
            self.status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string()
        } else {
            text
        }
    }
}

/// Lifecycle of a request as tracked by the registry.
#[derive(Debug, Clone)]
pub enum RequestState {
    Pending,
    Completed(RawResponse),
    Failed(DataError),
}

impl RequestState {
    pub fn is_pending(&self) -> bool {
        matches!(self, RequestState::Pending)
    }

    pub(crate) fn from_response(response: RawResponse) -> Self {
        if response.is_success() {
            RequestState::Completed(response)
        } else {
            let message = response.error_message();
            RequestState::Failed(DataError::from_status(response.status.as_u16(), message))
        }
    }
}
