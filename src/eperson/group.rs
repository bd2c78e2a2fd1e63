use std::sync::Arc;

use log::{info, warn};
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
        model::{first_metadata_value, HalLinks, MetadataMap, MetadataValue},
        DataService, FindListOptions, FollowLinkConfig, PaginatedList, SearchParam,
    },
};

pub const GROUP_LINK_PATH: &str = "groups";

/// An e-person group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Group {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub permanent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(default)]
    pub metadata: MetadataMap,
    #[serde(rename = "type", default = "Group::resource_type")]
    pub resource_type: String,
    #[serde(rename = "_links", default, skip_serializing_if = "HalLinks::is_empty")]
    pub links: HalLinks,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            uuid: None,
            name: name.into(),
            permanent: false,
            handle: None,
            metadata: MetadataMap::new(),
            resource_type: Self::resource_type(),
            links: HalLinks::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.metadata.insert(
            "dc.description".to_string(),
            vec![MetadataValue::new(description)],
        );
        self
    }

    pub fn description(&self) -> Option<&str> {
        first_metadata_value(&self.metadata, "dc.description")
    }

    fn resource_type() -> String {
        "group".to_string()
    }
}

impl Identifiable for Group {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.uuid = Some(id.clone());
        self.id = Some(id);
    }
}

/// Retrieves groups from the REST API and runs group CRUD and edit-session
/// actions.
#[derive(Clone)]
pub struct GroupDataService {
    data: DataService<Group>,
    session: Arc<EditSessionStore<Group>>,
}

impl GroupDataService {
    pub fn new(data: DataService<Group>, session: Arc<EditSessionStore<Group>>) -> Self {
        Self { data, session }
    }

    pub fn data(&self) -> &DataService<Group> {
        &self.data
    }

    /// Retrieves all groups
    pub fn get_groups(
        &self,
        options: FindListOptions,
        links_to_follow: &[FollowLinkConfig],
    ) -> RemoteDataStream<PaginatedList<Group>> {
        self.data.find_all(options, links_to_follow)
    }

    pub fn find_by_id(&self, id: &str, links_to_follow: &[FollowLinkConfig]) -> RemoteDataStream<Group> {
        self.data.find_by_id(id, links_to_follow)
    }

    /// Groups matching `query` by name or exact uuid (`search/byMetadata`).
    pub fn search_groups(
        &self,
        query: &str,
        options: Option<FindListOptions>,
        links_to_follow: &[FollowLinkConfig],
    ) -> RemoteDataStream<PaginatedList<Group>> {
        let options = options
            .unwrap_or_default()
            .with_search_params([SearchParam::new("query", query)]);
        self.data.search_by("byMetadata", options, links_to_follow)
    }

    /// Whether the current user is a member of the named group.
    ///
    /// Resolves once, on the first non-pending search result. A failed search
    /// counts as not a member.
    pub async fn is_member_of(&self, group_name: &str) -> bool {
        let options = FindListOptions::default()
            .with_search_params([SearchParam::new("groupName", group_name)]);
        let result = self
            .data
            .search_by("isMemberOf", options, &[])
            .terminal()
            .await;
        match result.payload() {
            Some(groups) => groups.total_elements() > 0,
            None => {
                warn!(
                    "Membership check for {} failed: {}",
                    group_name,
                    result.error_message().unwrap_or("no result")
                );
                false
            }
        }
    }

    pub async fn delete_group(&self, group: &Group) -> bool {
        self.data.delete(group).await
    }

    /// Create the group, or update it when it already has an id.
    pub fn create_or_update_group(&self, group: Group) -> RemoteDataStream<Group> {
        if group.id.is_some() {
            return self.update_group(&group);
        }
        if let Err(err) = group.validate() {
            return RemoteDataStream::ready(RemoteData::from_error(&DataError::from(err)));
        }
        info!("Creating group {}", group.name);
        self.data.create(&group)
    }

    /// Not supported: resolves to a failed snapshot without contacting the
    /// backend.
    // TODO: send the metadata changes as a JSON Patch once the edit form
    // produces them.
    pub fn update_group(&self, group: &Group) -> RemoteDataStream<Group> {
        let err = DataError::Unsupported(format!(
            "updating group {} is not supported",
            group.id.as_deref().unwrap_or(&group.name)
        ));
        RemoteDataStream::ready(RemoteData::from_error(&err))
    }

    /// The group currently being edited
    pub fn get_active_group(&self) -> Option<Group> {
        self.session.active()
    }

    pub fn watch_active_group(&self) -> watch::Receiver<EditSessionState<Group>> {
        self.session.subscribe()
    }

    pub fn edit_group(&self, group: Group) {
        self.session.dispatch(EditAction::Edit(group));
    }

    pub fn cancel_edit_group(&self) {
        self.session.dispatch(EditAction::Cancel);
    }

    /// Clear every cached groups request.
    pub async fn clear_groups_requests(&self) -> usize {
        self.data.invalidate_cache().await
    }
}
