//! Edit-session store
//!
//! Holds the entity currently being edited for one entity type. The state only
//! changes through dispatched actions, folded in by a pure reducer; readers
//! go through a selector.

use log::debug;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq)]
pub enum EditAction<E> {
    Edit(E),
    Cancel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditSessionState<E> {
    pub editing: Option<E>,
}

impl<E> Default for EditSessionState<E> {
    fn default() -> Self {
        Self { editing: None }
    }
}

pub fn reduce<E>(_state: &EditSessionState<E>, action: EditAction<E>) -> EditSessionState<E> {
    match action {
        EditAction::Edit(entity) => EditSessionState {
            editing: Some(entity),
        },
        EditAction::Cancel => EditSessionState { editing: None },
    }
}

pub fn select_editing<E>(state: &EditSessionState<E>) -> Option<&E> {
    state.editing.as_ref()
}

/// Single-writer container for an `EditSessionState`.
pub struct EditSessionStore<E> {
    name: &'static str,
    state: watch::Sender<EditSessionState<E>>,
}

impl<E: Clone> EditSessionStore<E> {
    pub fn new(name: &'static str) -> Self {
        let (state, _) = watch::channel(EditSessionState::default());
        Self { name, state }
    }

    pub fn dispatch(&self, action: EditAction<E>) {
        debug!(
            "{} edit session: {}",
            self.name,
            match action {
                EditAction::Edit(_) => "edit",
                EditAction::Cancel => "cancel",
            }
        );
        self.state.send_modify(|state| *state = reduce(state, action));
    }

    /// Entity currently under edit.
    pub fn active(&self) -> Option<E> {
        select_editing(&*self.state.borrow()).cloned()
    }

    /// Replay-latest view of the session state.
    pub fn subscribe(&self) -> watch::Receiver<EditSessionState<E>> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reducer() {
        let state = EditSessionState::default();
        let state = reduce(&state, EditAction::Edit("x"));
        assert_eq!(select_editing(&state), Some(&"x"));
        let state = reduce(&state, EditAction::Cancel);
        assert_eq!(select_editing(&state), None);
    }

    #[test]
    fn test_last_edit_wins() {
        let store = EditSessionStore::new("group");
        store.dispatch(EditAction::Edit("x".to_string()));
        assert_eq!(store.active(), Some("x".to_string()));
        store.dispatch(EditAction::Edit("y".to_string()));
        assert_eq!(store.active(), Some("y".to_string()));
        store.dispatch(EditAction::Cancel);
        assert_eq!(store.active(), None);
    }

    #[tokio::test]
    async fn test_subscribers_observe_dispatches() {
        let store = EditSessionStore::new("group");
        let mut rx = store.subscribe();
        assert_eq!(select_editing(&*rx.borrow()), None);

        store.dispatch(EditAction::Edit(7));
        rx.changed().await.unwrap();
        assert_eq!(select_editing(&*rx.borrow_and_update()), Some(&7));

        let late = store.subscribe();
        assert_eq!(select_editing(&*late.borrow()).copied(), Some(7));
    }
}
