//! Dependency injection container
//!
//! Owns the request registry, the remote data builder, the endpoint resolver
//! and the per-entity edit-session stores, and hands out data services wired
//! to them. Nothing in the data layer is a global singleton.

use std::{sync::Arc, time::Duration};

use log::info;

use super::{
    builder::RemoteDataBuilder,
    error::DataResult,
    registry::RequestRegistry,
    store::EditSessionStore,
    traits::{EndpointResolver, Transport},
};
use crate::{
    config::Config,
    data::{
        endpoint::{HalEndpointService, StaticEndpointResolver},
        DataService,
    },
    eperson::{
        EPerson, EPersonDataService, Group, GroupDataService, EPERSON_LINK_PATH, GROUP_LINK_PATH,
    },
    transport::HttpTransport,
};

/// Main dependency injection container
pub struct ServiceContainer {
    /// Shared request cache
    registry: Arc<RequestRegistry>,

    builder: Arc<RemoteDataBuilder>,

    /// Link path to endpoint mapping
    resolver: Arc<dyn EndpointResolver>,

    group_session: Arc<EditSessionStore<Group>>,
    eperson_session: Arc<EditSessionStore<EPerson>>,
}

impl ServiceContainer {
    /// Create a container talking to the backend over HTTP
    pub fn from_config(config: &Config) -> DataResult<Self> {
        let transport = Arc::new(HttpTransport::new(&config.rest)?);
        Ok(Self::new(config, transport))
    }

    /// Create a container over an arbitrary transport
    ///
    /// Endpoints come from the static `endpoints` table when one is
    /// configured, otherwise from the `_links` of the REST root document.
    pub fn new(config: &Config, transport: Arc<dyn Transport>) -> Self {
        let registry = Arc::new(RequestRegistry::new(
            transport,
            Duration::from_secs(config.cache.ttl),
        ));
        let resolver: Arc<dyn EndpointResolver> = if config.endpoints.is_empty() {
            info!("Resolving endpoints from {}", config.rest.base_url);
            Arc::new(HalEndpointService::new(
                config.rest.base_url.trim_end_matches('/'),
                registry.clone(),
            ))
        } else {
            info!("Using {} configured endpoints", config.endpoints.len());
            Arc::new(StaticEndpointResolver::new(config.endpoints.clone()))
        };
        Self::with_components(registry, resolver)
    }

    /// Create a container with custom components
    pub fn with_components(
        registry: Arc<RequestRegistry>,
        resolver: Arc<dyn EndpointResolver>,
    ) -> Self {
        Self {
            builder: Arc::new(RemoteDataBuilder::new(registry.clone())),
            registry,
            resolver,
            group_session: Arc::new(EditSessionStore::new(GROUP_LINK_PATH)),
            eperson_session: Arc::new(EditSessionStore::new(EPERSON_LINK_PATH)),
        }
    }

    /// Get the request registry
    pub fn registry(&self) -> &Arc<RequestRegistry> {
        &self.registry
    }

    pub fn builder(&self) -> &Arc<RemoteDataBuilder> {
        &self.builder
    }

    pub fn resolver(&self) -> Arc<dyn EndpointResolver> {
        self.resolver.clone()
    }

    pub fn group_service(&self) -> GroupDataService {
        GroupDataService::new(
            DataService::new(GROUP_LINK_PATH, self.builder.clone(), self.resolver.clone()),
            self.group_session.clone(),
        )
    }

    pub fn eperson_service(&self) -> EPersonDataService {
        EPersonDataService::new(
            DataService::new(EPERSON_LINK_PATH, self.builder.clone(), self.resolver.clone()),
            self.eperson_session.clone(),
        )
    }
}
