//! Remote data builder
//!
//! Turns an observable href into a replay-latest stream of `RemoteData`
//! snapshots that follows the registry's view of the request behind it.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::watch;

use super::{
    registry::RequestRegistry,
    remote_data::{RemoteData, RemoteDataStream},
    request::{RawResponse, RequestId, RequestState},
    DataResult,
};
use crate::data::PaginatedList;

/// Resolution state of an href that may depend on other lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HrefState {
    Pending,
    Resolved(String),
    Failed(String),
}

pub type HrefSource = watch::Receiver<HrefState>;

/// An href source that is already resolved.
pub fn resolved_href(href: impl Into<String>) -> HrefSource {
    let (_, rx) = watch::channel(HrefState::Resolved(href.into()));
    rx
}

/// Turn a request state into a snapshot, decoding completed responses.
pub fn to_remote_data<T, F>(state: &RequestState, decode: &F) -> RemoteData<T>
where
    F: Fn(&RawResponse) -> DataResult<T>,
{
    match state {
        RequestState::Pending => RemoteData::pending(),
        RequestState::Completed(response) => match decode(response) {
            Ok(payload) => RemoteData::success(payload, response.status.as_u16()),
            Err(err) => RemoteData::from_error(&err),
        },
        RequestState::Failed(err) => RemoteData::from_error(err),
    }
}

pub fn decode_object<T: DeserializeOwned>(response: &RawResponse) -> DataResult<T> {
    response.json()
}

pub fn decode_list<T: DeserializeOwned>(response: &RawResponse) -> DataResult<PaginatedList<T>> {
    PaginatedList::from_hal(&response.body)
}

/// Identifies which snapshot was last forwarded, so repeats are not re-sent.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Waiting,
    Request(RequestId, bool),
    Unresolvable(String),
}

fn phase_of(id: &RequestId, state: &RequestState) -> Phase {
    Phase::Request(id.clone(), !state.is_pending())
}

pub struct RemoteDataBuilder {
    registry: Arc<RequestRegistry>,
}

impl RemoteDataBuilder {
    pub fn new(registry: Arc<RequestRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<RequestRegistry> {
        &self.registry
    }

    /// Stream of the single object behind `href`.
    pub fn build<T>(&self, href: HrefSource) -> RemoteDataStream<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.build_with(href, decode_object::<T>)
    }

    /// Stream of the collection page behind `href`.
    pub fn build_list<T>(&self, href: HrefSource) -> RemoteDataStream<PaginatedList<T>>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.build_with(href, decode_list::<T>)
    }

    /// Snapshot for a request configured under `id`, once it has resolved.
    pub async fn resolve_request<T, F>(&self, id: &str, decode: F) -> RemoteData<T>
    where
        F: Fn(&RawResponse) -> DataResult<T>,
    {
        match self.registry.wait_for_id(id).await {
            Some(state) => to_remote_data(&state, &decode),
            None => RemoteData::failed(format!("no request configured with id {id}"), None),
        }
    }

    /// Stream of the object produced by the request configured under `id`.
    ///
    /// For requests that are not indexed by href, such as a POST.
    pub fn build_from_request_id<T>(&self, id: &str) -> RemoteDataStream<T>
    where
        T: DeserializeOwned + Clone + Send + Sync + 'static,
    {
        let Some(mut state_rx) = self.registry.subscribe_by_id(id) else {
            return RemoteDataStream::ready(RemoteData::failed(
                format!("no request configured with id {id}"),
                None,
            ));
        };
        let decode = decode_object::<T>;
        let initial = to_remote_data(&state_rx.borrow_and_update(), &decode);
        if !initial.is_response_pending() {
            return RemoteDataStream::ready(initial);
        }

        let (tx, rx) = watch::channel(initial);
        tokio::spawn(async move {
            let resolved = tokio::select! {
                state = async { state_rx.wait_for(|s| !s.is_pending()).await.map(|s| s.clone()) } => state,
                _ = tx.closed() => return,
            };
            let state = match resolved {
                Ok(state) => state,
                Err(_) => state_rx.borrow().clone(),
            };
            tx.send_replace(to_remote_data(&state, &decode));
        });
        RemoteDataStream::new(rx)
    }

    pub fn build_with<T, F>(&self, mut href: HrefSource, decode: F) -> RemoteDataStream<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn(&RawResponse) -> DataResult<T> + Send + Sync + 'static,
    {
        // Whatever is already known is visible before the first poll.
        let (initial, mut phase) = self.snapshot(&href.borrow_and_update(), &decode);
        let (tx, rx) = watch::channel(initial);
        let registry = self.registry.clone();

        tokio::spawn(async move {
            let mut href_open = true;
            loop {
                let href_state = href.borrow_and_update().clone();
                let mut request_rx = None;

                match href_state {
                    HrefState::Pending => {}
                    HrefState::Failed(message) => {
                        let next = Phase::Unresolvable(message.clone());
                        if next != phase {
                            tx.send_replace(RemoteData::failed(message, None));
                            phase = next;
                        }
                    }
                    HrefState::Resolved(url) => {
                        let id = registry.get_by_href(&url).map(|r| r.id.clone());
                        match (id, registry.subscribe_by_href(&url)) {
                            (Some(id), Some(rx)) => request_rx = Some((id, rx)),
                            _ => {
                                let message = format!("no request configured for {url}");
                                let next = Phase::Unresolvable(message.clone());
                                if next != phase {
                                    tx.send_replace(RemoteData::failed(message, None));
                                    phase = next;
                                }
                            }
                        }
                    }
                }

                match request_rx {
                    Some((id, mut state_rx)) => loop {
                        {
                            let state = state_rx.borrow_and_update();
                            let next = phase_of(&id, &state);
                            if next != phase {
                                tx.send_replace(to_remote_data(&state, &decode));
                                phase = next;
                            }
                        }
                        tokio::select! {
                            changed = state_rx.changed() => {
                                if changed.is_err() {
                                    // Request entry is gone; only a new href can change anything.
                                    if !href_open {
                                        return;
                                    }
                                    tokio::select! {
                                        changed = href.changed() => {
                                            if changed.is_err() {
                                                return;
                                            }
                                        }
                                        _ = tx.closed() => return,
                                    }
                                    break;
                                }
                            }
                            changed = href.changed(), if href_open => {
                                if changed.is_err() {
                                    href_open = false;
                                } else {
                                    break;
                                }
                            }
                            _ = tx.closed() => return,
                        }
                    },
                    None => {
                        if !href_open {
                            return;
                        }
                        tokio::select! {
                            changed = href.changed() => {
                                if changed.is_err() {
                                    return;
                                }
                            }
                            _ = tx.closed() => return,
                        }
                    }
                }
            }
        });

        RemoteDataStream::new(rx)
    }

    fn snapshot<T, F>(&self, href: &HrefState, decode: &F) -> (RemoteData<T>, Phase)
    where
        F: Fn(&RawResponse) -> DataResult<T>,
    {
        match href {
            HrefState::Resolved(url) => {
                let id = self.registry.get_by_href(url).map(|r| r.id.clone());
                match (id, self.registry.state_by_href(url)) {
                    (Some(id), Some(state)) => {
                        let phase = phase_of(&id, &state);
                        (to_remote_data(&state, decode), phase)
                    }
                    _ => (RemoteData::pending(), Phase::Waiting),
                }
            }
            _ => (RemoteData::pending(), Phase::Waiting),
        }
    }
}
