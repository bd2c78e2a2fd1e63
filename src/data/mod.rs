//! Generic per-entity data service.
//!
//! Builds hrefs for an entity's list, search and item endpoints, submits the
//! requests to the registry and hands back remote data streams. Entity
//! specific services wrap one of these.

pub mod endpoint;
pub mod model;
pub mod paginated_list;
pub mod request;

use std::{marker::PhantomData, sync::Arc};

use bytes::Bytes;
use log::{debug, warn};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::watch;

pub use paginated_list::{PageInfo, PaginatedList};
pub use request::{FindListOptions, FollowLinkConfig, SearchParam, SortDirection, SortOptions};

use crate::core::{
    builder::{decode_object, HrefState},
    request::{RawResponse, RestRequest},
    traits::{EndpointResolver, Identifiable},
    DataError, DataResult, RemoteData, RemoteDataBuilder, RemoteDataStream, RequestId,
    RequestRegistry,
};

pub struct DataService<E> {
    link_path: &'static str,
    registry: Arc<RequestRegistry>,
    builder: Arc<RemoteDataBuilder>,
    resolver: Arc<dyn EndpointResolver>,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for DataService<E> {
    fn clone(&self) -> Self {
        Self {
            link_path: self.link_path,
            registry: self.registry.clone(),
            builder: self.builder.clone(),
            resolver: self.resolver.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E> DataService<E>
where
    E: Serialize + DeserializeOwned + Identifiable + Clone + Send + Sync + 'static,
{
    pub fn new(
        link_path: &'static str,
        builder: Arc<RemoteDataBuilder>,
        resolver: Arc<dyn EndpointResolver>,
    ) -> Self {
        Self {
            link_path,
            registry: builder.registry().clone(),
            builder,
            resolver,
            _entity: PhantomData,
        }
    }

    pub fn link_path(&self) -> &'static str {
        self.link_path
    }

    pub fn registry(&self) -> &Arc<RequestRegistry> {
        &self.registry
    }

    /// Base endpoint serving this entity type.
    pub async fn browse_endpoint(&self) -> DataResult<String> {
        self.resolver.endpoint(self.link_path).await
    }

    pub async fn find_all_href(
        &self,
        options: &FindListOptions,
        links_to_follow: &[FollowLinkConfig],
    ) -> DataResult<String> {
        let endpoint = self.browse_endpoint().await?;
        Ok(request::find_all_href(&endpoint, options, links_to_follow))
    }

    pub async fn search_href(
        &self,
        search_method: &str,
        options: &FindListOptions,
        links_to_follow: &[FollowLinkConfig],
    ) -> DataResult<String> {
        let endpoint = self.browse_endpoint().await?;
        Ok(request::search_href(&endpoint, search_method, options, links_to_follow))
    }

    pub async fn id_href(&self, id: &str, links_to_follow: &[FollowLinkConfig]) -> DataResult<String> {
        let endpoint = self.browse_endpoint().await?;
        Ok(request::id_href(&endpoint, id, links_to_follow))
    }

    pub fn find_all(
        &self,
        options: FindListOptions,
        links_to_follow: &[FollowLinkConfig],
    ) -> RemoteDataStream<PaginatedList<E>> {
        let links = links_to_follow.to_vec();
        let href_options = options.clone();
        let href = self.configure_get(
            move |endpoint| request::find_all_href(endpoint, &href_options, &links),
            Some(options),
        );
        self.builder.build_list(href)
    }

    /// Search through the named search endpoint of this entity type.
    pub fn search_by(
        &self,
        search_method: &str,
        options: FindListOptions,
        links_to_follow: &[FollowLinkConfig],
    ) -> RemoteDataStream<PaginatedList<E>> {
        let links = links_to_follow.to_vec();
        let search_method = search_method.to_string();
        let href_options = options.clone();
        let href = self.configure_get(
            move |endpoint| request::search_href(endpoint, &search_method, &href_options, &links),
            Some(options),
        );
        self.builder.build_list(href)
    }

    pub fn find_by_id(&self, id: &str, links_to_follow: &[FollowLinkConfig]) -> RemoteDataStream<E> {
        let links = links_to_follow.to_vec();
        let id = id.to_string();
        let href = self.configure_get(move |endpoint| request::id_href(endpoint, &id, &links), None);
        self.builder.build(href)
    }

    /// POST a new entity to the base endpoint.
    pub fn create(&self, entity: &E) -> RemoteDataStream<E> {
        let body = match serde_json::to_vec(entity) {
            Ok(body) => Bytes::from(body),
            Err(err) => return RemoteDataStream::ready(RemoteData::from_error(&DataError::from(err))),
        };
        self.mutate(
            move |id, endpoint| Ok(RestRequest::post(id, endpoint, body)),
            decode_object::<E>,
        )
    }

    /// PUT the full entity to its item endpoint.
    pub fn put(&self, entity: &E) -> RemoteDataStream<E> {
        let Some(entity_id) = entity.id().map(str::to_string) else {
            let err = DataError::Validation("cannot update an entity without an id".to_string());
            return RemoteDataStream::ready(RemoteData::from_error(&err));
        };
        let body = match serde_json::to_vec(entity) {
            Ok(body) => Bytes::from(body),
            Err(err) => return RemoteDataStream::ready(RemoteData::from_error(&DataError::from(err))),
        };
        self.mutate(
            move |id, endpoint| {
                Ok(RestRequest::put(
                    id,
                    request::id_href(endpoint, &entity_id, &[]),
                    body,
                ))
            },
            decode_object::<E>,
        )
    }

    /// DELETE the entity; resolves to whether the backend accepted it.
    pub async fn delete(&self, entity: &E) -> bool {
        let Some(entity_id) = entity.id().map(str::to_string) else {
            warn!("Refusing to delete a {} without an id", self.link_path);
            return false;
        };
        let mut stream = self.mutate(
            move |id, endpoint| {
                Ok(RestRequest::delete(
                    id,
                    request::id_href(endpoint, &entity_id, &[]),
                ))
            },
            |_: &RawResponse| Ok(()),
        );
        stream.terminal().await.has_succeeded()
    }

    /// Evict every cached request scoped to this entity type.
    pub async fn invalidate_cache(&self) -> usize {
        match self.browse_endpoint().await {
            Ok(endpoint) => self.registry.remove_by_href_substring(&endpoint),
            Err(err) => {
                warn!("Cannot invalidate {} requests: {}", self.link_path, err);
                0
            }
        }
    }

    /// Resolve the endpoint, configure a GET for the href built from it and
    /// publish that href.
    fn configure_get<F>(&self, make_href: F, options: Option<FindListOptions>) -> watch::Receiver<HrefState>
    where
        F: FnOnce(&str) -> String + Send + 'static,
    {
        let (tx, rx) = watch::channel(HrefState::Pending);
        let registry = self.registry.clone();
        let resolver = self.resolver.clone();
        let link_path = self.link_path;

        tokio::spawn(async move {
            match resolver.endpoint(link_path).await {
                Ok(endpoint) => {
                    let href = make_href(&endpoint);
                    let id = registry.generate_request_id();
                    let request = match options {
                        Some(options) => RestRequest::find_list(id, href.clone(), options),
                        None => RestRequest::get(id, href.clone()),
                    };
                    registry.configure(request);
                    tx.send_replace(HrefState::Resolved(href));
                }
                Err(err) => {
                    warn!("Cannot resolve {} endpoint: {}", link_path, err);
                    tx.send_replace(HrefState::Failed(err.to_string()));
                }
            }
        });
        rx
    }

    /// Configure a non-GET request against the endpoint and follow it by id.
    fn mutate<T, B, D>(&self, build: B, decode: D) -> RemoteDataStream<T>
    where
        T: Clone + Send + Sync + 'static,
        B: FnOnce(RequestId, &str) -> DataResult<RestRequest> + Send + 'static,
        D: Fn(&RawResponse) -> DataResult<T> + Send + Sync + 'static,
    {
        let (tx, stream) = RemoteDataStream::channel();
        let registry = self.registry.clone();
        let builder = self.builder.clone();
        let resolver = self.resolver.clone();
        let link_path = self.link_path;

        tokio::spawn(async move {
            let request = match resolver.endpoint(link_path).await {
                Ok(endpoint) => build(registry.generate_request_id(), &endpoint),
                Err(err) => Err(err),
            };
            let snapshot = match request {
                Ok(request) => {
                    debug!("{} {} for {}", request.method, request.href, link_path);
                    let href = request.href.clone();
                    let is_item = request.method != http::Method::POST;
                    let id = registry.configure(request);
                    let snapshot = builder.resolve_request(&id, decode).await;
                    // Mutations are never reused once settled.
                    registry.remove_by_id(&id);
                    if snapshot.has_succeeded() && is_item {
                        // Cached reads of the changed item are now stale.
                        registry.remove_by_href(&href);
                        registry.remove_by_href_substring(&format!("{href}?"));
                    }
                    snapshot
                }
                Err(err) => RemoteData::from_error(&err),
            };
            tx.send_replace(snapshot);
        });
        stream
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use http::{Method, StatusCode};
    use serde::Deserialize;

    use super::*;
    use crate::{data::endpoint::StaticEndpointResolver, utils::mock::MockTransport};

    const ENDPOINT: &str = "http://api/core/widgets";

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: Option<String>,
        name: String,
    }

    impl Identifiable for Widget {
        fn id(&self) -> Option<&str> {
            self.id.as_deref()
        }

        fn set_id(&mut self, id: String) {
            self.id = Some(id);
        }
    }

    fn service(mock: &Arc<MockTransport>) -> DataService<Widget> {
        let registry = Arc::new(RequestRegistry::new(mock.clone(), Duration::from_secs(60)));
        let builder = Arc::new(RemoteDataBuilder::new(registry));
        let resolver = Arc::new(StaticEndpointResolver::new(HashMap::from([(
            "widgets".to_string(),
            ENDPOINT.to_string(),
        )])));
        DataService::new("widgets", builder, resolver)
    }

    #[tokio::test]
    async fn test_hrefs() {
        let mock = Arc::new(MockTransport::new());
        let service = service(&mock);

        assert_eq!(
            service
                .find_all_href(&FindListOptions::paged(3, 10), &[])
                .await
                .unwrap(),
            format!("{ENDPOINT}?page=2&size=10")
        );
        assert_eq!(
            service
                .search_href("byName", &FindListOptions::default(), &[])
                .await
                .unwrap(),
            format!("{ENDPOINT}/search/byName")
        );
        assert_eq!(
            service
                .id_href("1", &[FollowLinkConfig::new("owner")])
                .await
                .unwrap(),
            format!("{ENDPOINT}/1?embed=owner")
        );
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_find_all() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(
            &format!("{ENDPOINT}?page=0&size=2"),
            StatusCode::OK,
            r#"{"_embedded":{"widgets":[{"id":"1","name":"a"},{"id":"2","name":"b"}]},
                "page":{"size":2,"totalElements":5,"totalPages":3,"number":0}}"#,
        );
        let service = service(&mock);

        let rd = service
            .find_all(FindListOptions::paged(1, 2), &[])
            .terminal()
            .await;
        let list = rd.payload().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.total_elements(), 5);
        let request = service
            .registry()
            .get_by_href(&format!("{ENDPOINT}?page=0&size=2"))
            .unwrap();
        assert_eq!(request.options, Some(FindListOptions::paged(1, 2)));
    }

    #[tokio::test]
    async fn test_repeated_find_by_id_hits_network_once() {
        let mock = Arc::new(MockTransport::gated());
        mock.respond(&format!("{ENDPOINT}/1"), StatusCode::OK, r#"{"id":"1","name":"a"}"#);
        let service = service(&mock);

        let mut first = service.find_by_id("1", &[]);
        let mut second = service.find_by_id("1", &[]);
        mock.release(1);

        let a = first.terminal().await;
        let b = second.terminal().await;
        assert_eq!(a, b);
        assert_eq!(a.payload().unwrap().name, "a");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unresolvable_endpoint() {
        let mock = Arc::new(MockTransport::new());
        let registry = Arc::new(RequestRegistry::new(mock.clone(), Duration::from_secs(60)));
        let builder = Arc::new(RemoteDataBuilder::new(registry));
        let resolver = Arc::new(StaticEndpointResolver::new(HashMap::new()));
        let service = DataService::<Widget>::new("widgets", builder, resolver);

        let rd = service.find_by_id("1", &[]).terminal().await;
        assert!(rd.has_failed());
        assert_eq!(
            rd.error_message(),
            Some("Configuration error: no endpoint configured for widgets")
        );
        assert_eq!(service.invalidate_cache().await, 0);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_create_posts_body() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(ENDPOINT, StatusCode::CREATED, r#"{"id":"9","name":"new"}"#);
        let service = service(&mock);

        let widget = Widget {
            id: None,
            name: "new".to_string(),
        };
        let rd = service.create(&widget).terminal().await;
        assert_eq!(rd.status_code(), Some(201));
        assert_eq!(rd.payload().unwrap().id.as_deref(), Some("9"));

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, Method::POST);
        let sent: Widget = serde_json::from_slice(calls[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(sent, widget);
    }

    #[tokio::test]
    async fn test_put_evicts_cached_item() {
        let mock = Arc::new(MockTransport::new());
        let item = format!("{ENDPOINT}/1");
        mock.respond(&item, StatusCode::OK, r#"{"id":"1","name":"renamed"}"#);
        let service = service(&mock);

        service.find_by_id("1", &[]).terminal().await;
        assert!(service.registry().has_by_href(&item));

        let widget = Widget {
            id: Some("1".to_string()),
            name: "renamed".to_string(),
        };
        let rd = service.put(&widget).terminal().await;
        assert!(rd.has_succeeded());
        assert!(!service.registry().has_by_href(&item));
        assert_eq!(mock.calls()[1].method, Method::PUT);
    }

    #[tokio::test]
    async fn test_put_without_id_is_rejected() {
        let mock = Arc::new(MockTransport::new());
        let service = service(&mock);
        let rd = service
            .put(&Widget {
                id: None,
                name: "x".to_string(),
            })
            .current();
        assert!(rd.has_failed());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_delete() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(&format!("{ENDPOINT}/1"), StatusCode::NO_CONTENT, "");
        let service = service(&mock);

        let existing = Widget {
            id: Some("1".to_string()),
            name: "a".to_string(),
        };
        assert!(service.delete(&existing).await);

        let missing = Widget {
            id: Some("2".to_string()),
            name: "b".to_string(),
        };
        assert!(!service.delete(&missing).await);

        let unsaved = Widget {
            id: None,
            name: "c".to_string(),
        };
        assert!(!service.delete(&unsaved).await);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_settled_requests_leave_registry() {
        let mock = Arc::new(MockTransport::new());
        for i in 0..10 {
            mock.respond(
                &format!("{ENDPOINT}/{i}"),
                StatusCode::OK,
                &format!(r#"{{"id":"{i}","name":"w{i}"}}"#),
            );
        }
        let registry = Arc::new(RequestRegistry::new(mock.clone(), Duration::from_millis(50)));
        let builder = Arc::new(RemoteDataBuilder::new(registry));
        let resolver = Arc::new(StaticEndpointResolver::new(HashMap::from([(
            "widgets".to_string(),
            ENDPOINT.to_string(),
        )])));
        let service = DataService::<Widget>::new("widgets", builder, resolver);

        for i in 0..10 {
            let rd = service.find_by_id(&i.to_string(), &[]).terminal().await;
            assert!(rd.has_succeeded());
        }
        for i in 0..10 {
            let widget = Widget {
                id: Some(i.to_string()),
                name: format!("w{i}"),
            };
            assert!(service.delete(&widget).await);
        }
        // Deletes never linger, and each one evicted the cached GET of its item.
        assert_eq!(service.registry().len(), 0);

        service.find_by_id("0", &[]).terminal().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(service.registry().get_by_href(&format!("{ENDPOINT}/0")).is_none());
        assert_eq!(service.registry().purge_expired(), 1);
        assert!(service.registry().is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_cache_forces_refetch() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(
            ENDPOINT,
            StatusCode::OK,
            r#"{"_embedded":{"widgets":[]},"page":{"size":20,"totalElements":0,"totalPages":0,"number":0}}"#,
        );
        let service = service(&mock);

        service.find_all(FindListOptions::default(), &[]).terminal().await;
        service.find_all(FindListOptions::default(), &[]).terminal().await;
        assert_eq!(mock.call_count(), 1);

        assert_eq!(service.invalidate_cache().await, 1);
        service.find_all(FindListOptions::default(), &[]).terminal().await;
        assert_eq!(mock.call_count(), 2);
    }
}
