//! Link-path to endpoint resolution.

use std::{collections::HashMap, sync::Arc};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use log::{debug, warn};
use serde::Deserialize;

use crate::core::{
    request::{RequestState, RestRequest},
    traits::EndpointResolver,
    DataError, DataResult, RequestRegistry,
};

/// Endpoints taken verbatim from configuration.
pub struct StaticEndpointResolver {
    endpoints: HashMap<String, String>,
}

impl StaticEndpointResolver {
    pub fn new(endpoints: HashMap<String, String>) -> Self {
        Self { endpoints }
    }
}

#[async_trait]
impl EndpointResolver for StaticEndpointResolver {
    async fn endpoint(&self, link_path: &str) -> DataResult<String> {
        self.endpoints
            .get(link_path)
            .map(|href| href.trim_end_matches('/').to_string())
            .ok_or_else(|| {
                DataError::Configuration(format!("no endpoint configured for {link_path}"))
            })
    }
}

#[derive(Debug, Deserialize)]
struct HalLink {
    href: String,
}

#[derive(Debug, Deserialize)]
struct RootDocument {
    #[serde(rename = "_links", default)]
    links: HashMap<String, HalLink>,
}

/// Discovers endpoints from the `_links` of the REST root document.
///
/// The root is fetched through the registry like any other GET, so concurrent
/// first lookups share one call. Discovered links are kept for the lifetime
/// of the service.
pub struct HalEndpointService {
    root: String,
    registry: Arc<RequestRegistry>,
    links: ArcSwap<HashMap<String, String>>,
}

impl HalEndpointService {
    pub fn new(root: impl Into<String>, registry: Arc<RequestRegistry>) -> Self {
        Self {
            root: root.into(),
            registry,
            links: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub fn root_endpoint(&self) -> &str {
        &self.root
    }

    async fn fetch_links(&self) -> DataResult<HashMap<String, String>> {
        let id = self.registry.configure(RestRequest::get(
            self.registry.generate_request_id(),
            self.root.clone(),
        ));
        match self.registry.wait_for_id(&id).await {
            Some(RequestState::Completed(response)) => {
                let document: RootDocument = response.json()?;
                Ok(document
                    .links
                    .into_iter()
                    .map(|(name, link)| (name, link.href))
                    .collect())
            }
            Some(RequestState::Failed(err)) => Err(err),
            Some(RequestState::Pending) | None => Err(DataError::Internal(format!(
                "root document request {id} did not complete"
            ))),
        }
    }
}

#[async_trait]
impl EndpointResolver for HalEndpointService {
    async fn endpoint(&self, link_path: &str) -> DataResult<String> {
        if let Some(href) = self.links.load().get(link_path) {
            return Ok(href.clone());
        }

        debug!("Resolving {} from root document {}", link_path, self.root);
        let links = self.fetch_links().await.inspect_err(|err| {
            warn!("Failed to read root document {}: {}", self.root, err);
        })?;
        let href = links.get(link_path).cloned();
        self.links.store(Arc::new(links));

        href.ok_or_else(|| {
            DataError::NotFound(format!("link {link_path} not present in {}", self.root))
        })
    }
}
