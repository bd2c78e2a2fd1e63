use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use validator::Validate;

use crate::{
    core::{
        store::{EditAction, EditSessionState, EditSessionStore},
        traits::Identifiable,
        DataError, RemoteData, RemoteDataStream,
    },
    data::{
        model::{first_metadata_value, HalLinks, MetadataMap},
        DataService, FindListOptions, FollowLinkConfig, PaginatedList, SearchParam,
    },
};

pub const EPERSON_LINK_PATH: &str = "epersons";

/// A person known to the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EPerson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default)]
    pub name: String,
    #[validate(email)]
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub netid: Option<String>,
    #[serde(default)]
    pub can_log_in: bool,
    #[serde(default)]
    pub require_certificate: bool,
    #[serde(default)]
    pub self_registered: bool,
    #[serde(default)]
    pub metadata: MetadataMap,
    #[serde(rename = "type", default = "EPerson::resource_type")]
    pub resource_type: String,
    #[serde(rename = "_links", default, skip_serializing_if = "HalLinks::is_empty")]
    pub links: HalLinks,
}

impl EPerson {
    pub fn new(email: impl Into<String>) -> Self {
        let email = email.into();
        Self {
            id: None,
            uuid: None,
            name: email.clone(),
            email: Some(email),
            netid: None,
            can_log_in: true,
            require_certificate: false,
            self_registered: false,
            metadata: MetadataMap::new(),
            resource_type: Self::resource_type(),
            links: HalLinks::new(),
        }
    }

    /// "First Last" from the person's name metadata, falling back to `name`.
    pub fn display_name(&self) -> String {
        let first = first_metadata_value(&self.metadata, "eperson.firstname");
        let last = first_metadata_value(&self.metadata, "eperson.lastname");
        match (first, last) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(only), None) | (None, Some(only)) => only.to_string(),
            (None, None) => self.name.clone(),
        }
    }

    fn resource_type() -> String {
        "eperson".to_string()
    }
}

impl Identifiable for EPerson {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.uuid = Some(id.clone());
        self.id = Some(id);
    }
}

/// Retrieves e-people from the REST API and runs e-person CRUD and
/// edit-session actions.
#[derive(Clone)]
pub struct EPersonDataService {
    data: DataService<EPerson>,
    session: Arc<EditSessionStore<EPerson>>,
}

impl EPersonDataService {
    pub fn new(data: DataService<EPerson>, session: Arc<EditSessionStore<EPerson>>) -> Self {
        Self { data, session }
    }

    pub fn data(&self) -> &DataService<EPerson> {
        &self.data
    }

    pub fn get_epeople(
        &self,
        options: FindListOptions,
        links_to_follow: &[FollowLinkConfig],
    ) -> RemoteDataStream<PaginatedList<EPerson>> {
        self.data.find_all(options, links_to_follow)
    }

    pub fn find_by_id(&self, id: &str, links_to_follow: &[FollowLinkConfig]) -> RemoteDataStream<EPerson> {
        self.data.find_by_id(id, links_to_follow)
    }

    /// Search by `scope`: `email` looks up an exact address through
    /// `search/byEmail`; any other scope is a metadata query.
    pub fn search_by_scope(
        &self,
        scope: &str,
        query: &str,
        options: Option<FindListOptions>,
        links_to_follow: &[FollowLinkConfig],
    ) -> RemoteDataStream<PaginatedList<EPerson>> {
        let options = options.unwrap_or_default();
        match scope {
            "email" => self.data.search_by(
                "byEmail",
                options.with_search_params([SearchParam::new("email", query)]),
                links_to_follow,
            ),
            _ => self.data.search_by(
                "byMetadata",
                options.with_search_params([SearchParam::new("query", query)]),
                links_to_follow,
            ),
        }
    }

    /// Create the e-person, or replace it when it already has an id.
    pub fn create_or_update_eperson(&self, eperson: EPerson) -> RemoteDataStream<EPerson> {
        if let Err(err) = eperson.validate() {
            return RemoteDataStream::ready(RemoteData::from_error(&DataError::from(err)));
        }
        if eperson.id.is_some() {
            info!("Updating eperson {}", eperson.name);
            return self.data.put(&eperson);
        }
        info!("Creating eperson {}", eperson.name);
        self.data.create(&eperson)
    }

    pub async fn delete_eperson(&self, eperson: &EPerson) -> bool {
        self.data.delete(eperson).await
    }

    /// The e-person currently being edited
    pub fn get_active_eperson(&self) -> Option<EPerson> {
        self.session.active()
    }

    pub fn watch_active_eperson(&self) -> watch::Receiver<EditSessionState<EPerson>> {
        self.session.subscribe()
    }

    pub fn edit_eperson(&self, eperson: EPerson) {
        self.session.dispatch(EditAction::Edit(eperson));
    }

    pub fn cancel_edit_eperson(&self) {
        self.session.dispatch(EditAction::Cancel);
    }

    /// Clear every cached epersons request.
    pub async fn clear_eperson_requests(&self) -> usize {
        self.data.invalidate_cache().await
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use http::{Method, StatusCode};

    use super::*;
    use crate::{
        core::{RequestRegistry, ServiceContainer},
        data::{endpoint::StaticEndpointResolver, model::MetadataValue},
        utils::mock::MockTransport,
    };

    const EPEOPLE: &str = "http://repo/server/api/eperson/epersons";

    const ONE_PERSON_PAGE: &str = r#"{
        "_embedded": {"epersons": [{
            "id": "a1", "uuid": "a1", "name": "jane@example.org",
            "email": "jane@example.org", "netid": null, "canLogIn": true,
            "requireCertificate": false, "selfRegistered": false,
            "metadata": {
                "eperson.firstname": [{"value": "Jane"}],
                "eperson.lastname": [{"value": "Doe"}]
            },
            "type": "eperson"
        }]},
        "page": {"size": 20, "totalElements": 1, "totalPages": 1, "number": 0}
    }"#;

    fn service(mock: &Arc<MockTransport>) -> EPersonDataService {
        let registry = Arc::new(RequestRegistry::new(mock.clone(), Duration::from_secs(60)));
        let resolver = Arc::new(StaticEndpointResolver::new(HashMap::from([(
            EPERSON_LINK_PATH.to_string(),
            EPEOPLE.to_string(),
        )])));
        ServiceContainer::with_components(registry, resolver).eperson_service()
    }

    #[tokio::test]
    async fn test_get_epeople() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(EPEOPLE, StatusCode::OK, ONE_PERSON_PAGE);
        let service = service(&mock);

        let rd = service
            .get_epeople(FindListOptions::default(), &[])
            .terminal()
            .await;
        let people = rd.payload().unwrap();
        assert_eq!(people.len(), 1);
        assert_eq!(people.page()[0].display_name(), "Jane Doe");
        assert!(people.page()[0].can_log_in);
    }

    #[tokio::test]
    async fn test_search_by_email_scope() {
        let mock = Arc::new(MockTransport::new());
        let href = format!("{EPEOPLE}/search/byEmail?email=jane%40example.org");
        mock.respond(&href, StatusCode::OK, ONE_PERSON_PAGE);
        let service = service(&mock);

        let rd = service
            .search_by_scope("email", "jane@example.org", None, &[])
            .terminal()
            .await;
        assert!(rd.has_succeeded());
        assert_eq!(mock.calls()[0].href, href);
    }

    #[tokio::test]
    async fn test_search_by_metadata_scope() {
        let mock = Arc::new(MockTransport::new());
        let href = format!("{EPEOPLE}/search/byMetadata?page=1&size=10&query=Doe");
        mock.respond(&href, StatusCode::OK, ONE_PERSON_PAGE);
        let service = service(&mock);

        let rd = service
            .search_by_scope("metadata", "Doe", Some(FindListOptions::paged(2, 10)), &[])
            .terminal()
            .await;
        assert_eq!(rd.payload().unwrap().total_elements(), 1);
    }

    #[tokio::test]
    async fn test_update_puts_to_item() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(
            &format!("{EPEOPLE}/a1"),
            StatusCode::OK,
            r#"{"id":"a1","name":"jane@example.org","email":"jane@example.org","canLogIn":false}"#,
        );
        let service = service(&mock);

        let mut jane = EPerson::new("jane@example.org");
        jane.set_id("a1".to_string());
        jane.can_log_in = false;
        let rd = service.create_or_update_eperson(jane).terminal().await;

        assert!(!rd.payload().unwrap().can_log_in);
        assert_eq!(mock.calls()[0].method, Method::PUT);
    }

    #[tokio::test]
    async fn test_create_posts() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(
            EPEOPLE,
            StatusCode::CREATED,
            r#"{"id":"b2","name":"sam@example.org","email":"sam@example.org"}"#,
        );
        let service = service(&mock);

        let mut sam = EPerson::new("sam@example.org");
        sam.metadata.insert(
            "eperson.firstname".to_string(),
            vec![MetadataValue::new("Sam")],
        );
        let rd = service.create_or_update_eperson(sam).terminal().await;

        assert_eq!(rd.status_code(), Some(201));
        let calls = mock.calls();
        assert_eq!(calls[0].method, Method::POST);
        let sent: serde_json::Value = serde_json::from_slice(calls[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(sent["canLogIn"], true);
        assert_eq!(sent["type"], "eperson");
    }

    #[tokio::test]
    async fn test_invalid_email_is_rejected() {
        let mock = Arc::new(MockTransport::new());
        let service = service(&mock);

        let rd = service
            .create_or_update_eperson(EPerson::new("not-an-address"))
            .current();
        assert!(rd.has_failed());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_edit_session() {
        let mock = Arc::new(MockTransport::new());
        let service = service(&mock);

        service.edit_eperson(EPerson::new("jane@example.org"));
        assert_eq!(
            service.get_active_eperson().unwrap().email.as_deref(),
            Some("jane@example.org")
        );
        service.cancel_edit_eperson();
        assert_eq!(service.get_active_eperson(), None);
        assert_eq!(service.watch_active_eperson().borrow().editing, None);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(EPEOPLE, StatusCode::OK, ONE_PERSON_PAGE);
        mock.respond(&format!("{EPEOPLE}/a1"), StatusCode::NO_CONTENT, "");
        let service = service(&mock);

        service.get_epeople(FindListOptions::default(), &[]).terminal().await;
        let mut jane = EPerson::new("jane@example.org");
        jane.set_id("a1".to_string());
        assert!(service.delete_eperson(&jane).await);

        // The DELETE leaves the registry once settled; only the list GET remains.
        assert_eq!(service.data().registry().len(), 1);
        assert_eq!(service.clear_eperson_requests().await, 1);
        assert_eq!(service.data().registry().len(), 0);
    }
}
