//! Find options and href construction for list, search and item endpoints.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A named query parameter appended to a search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParam {
    pub field_name: String,
    pub field_value: String,
}

impl SearchParam {
    pub fn new(field_name: impl Into<String>, field_value: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            field_value: field_value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    ASC,
    DESC,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SortDirection::ASC => write!(f, "ASC"),
            SortDirection::DESC => write!(f, "DESC"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOptions {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Options for collection requests.
///
/// `current_page` is 1-based; the backend's `page` parameter is 0-based.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindListOptions {
    /// Restrict results to a community or collection
    pub scope_id: Option<String>,
    pub current_page: Option<u32>,
    pub element_count_per_page: Option<u32>,
    pub sort: Option<SortOptions>,
    /// Browse from the first entry at or after this prefix
    pub starts_with: Option<String>,
    #[serde(default)]
    pub search_params: Vec<SearchParam>,
}

impl FindListOptions {
    pub fn paged(current_page: u32, element_count_per_page: u32) -> Self {
        Self {
            current_page: Some(current_page),
            element_count_per_page: Some(element_count_per_page),
            ..Default::default()
        }
    }

    /// Copy of these options with `params` appended after the existing ones.
    pub fn with_search_params(&self, params: impl IntoIterator<Item = SearchParam>) -> Self {
        let mut options = self.clone();
        options.search_params.extend(params);
        options
    }

    fn query_args(&self) -> Vec<(String, String)> {
        let mut args = Vec::new();
        if let Some(page) = self.current_page {
            args.push(("page".to_string(), page.saturating_sub(1).to_string()));
        }
        if let Some(size) = self.element_count_per_page {
            args.push(("size".to_string(), size.to_string()));
        }
        if let Some(sort) = &self.sort {
            args.push(("sort".to_string(), format!("{},{}", sort.field, sort.direction)));
        }
        if let Some(starts_with) = &self.starts_with {
            args.push(("startsWith".to_string(), starts_with.clone()));
        }
        if let Some(scope) = &self.scope_id {
            args.push(("scope".to_string(), scope.clone()));
        }
        for param in &self.search_params {
            args.push((param.field_name.clone(), param.field_value.clone()));
        }
        args
    }
}

/// A related resource to embed in the response.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FollowLinkConfig {
    pub name: String,
    pub find_list_options: Option<FindListOptions>,
    pub links_to_follow: Vec<FollowLinkConfig>,
}

impl FollowLinkConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_child(mut self, child: FollowLinkConfig) -> Self {
        self.links_to_follow.push(child);
        self
    }

    fn embed_args(&self, prefix: &str, args: &mut Vec<(String, String)>) {
        let path = if prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{prefix}/{}", self.name)
        };
        if let Some(size) = self
            .find_list_options
            .as_ref()
            .and_then(|o| o.element_count_per_page)
        {
            args.push(("embed.size".to_string(), format!("{path}={size}")));
        }
        if self.links_to_follow.is_empty() {
            args.push(("embed".to_string(), path));
        } else {
            for child in &self.links_to_follow {
                child.embed_args(&path, args);
            }
        }
    }
}

fn embed_args(links: &[FollowLinkConfig]) -> Vec<(String, String)> {
    let mut args = Vec::new();
    for link in links {
        link.embed_args("", &mut args);
    }
    args
}

/// Append percent-encoded query arguments to `href`.
pub fn append_query_args(href: &str, args: &[(String, String)]) -> String {
    if args.is_empty() {
        return href.to_string();
    }
    let query = args
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    let separator = if href.contains('?') { '&' } else { '?' };
    format!("{href}{separator}{query}")
}

/// Href of a collection endpoint with paging, sorting and embeds applied.
pub fn find_all_href(
    endpoint: &str,
    options: &FindListOptions,
    links_to_follow: &[FollowLinkConfig],
) -> String {
    let mut args = options.query_args();
    args.extend(embed_args(links_to_follow));
    append_query_args(endpoint, &args)
}

/// Href of a named search endpoint: `<endpoint>/search/<name>?...`.
pub fn search_href(
    endpoint: &str,
    search_method: &str,
    options: &FindListOptions,
    links_to_follow: &[FollowLinkConfig],
) -> String {
    let base = format!("{}/search/{}", endpoint.trim_end_matches('/'), search_method);
    find_all_href(&base, options, links_to_follow)
}

/// Href of a single item: `<endpoint>/<id>`.
pub fn id_href(endpoint: &str, id: &str, links_to_follow: &[FollowLinkConfig]) -> String {
    let base = format!("{}/{}", endpoint.trim_end_matches('/'), id);
    append_query_args(&base, &embed_args(links_to_follow))
}
