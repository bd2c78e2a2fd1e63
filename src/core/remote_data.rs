//! Remote data: a backend-originated value together with its request state.

use tokio::sync::watch;

use super::error::DataError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteDataState {
    Pending,
    Success,
    Failed,
}

/// Snapshot of a backend value.
///
/// Exactly one of pending, succeeded or failed holds; the constructors are the
/// only way to build one.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteData<T> {
    state: RemoteDataState,
    payload: Option<T>,
    error_message: Option<String>,
    status_code: Option<u16>,
}

impl<T> RemoteData<T> {
    pub fn pending() -> Self {
        Self {
            state: RemoteDataState::Pending,
            payload: None,
            error_message: None,
            status_code: None,
        }
    }

    pub fn success(payload: T, status_code: u16) -> Self {
        Self {
            state: RemoteDataState::Success,
            payload: Some(payload),
            error_message: None,
            status_code: Some(status_code),
        }
    }

    pub fn failed(error_message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self {
            state: RemoteDataState::Failed,
            payload: None,
            error_message: Some(error_message.into()),
            status_code,
        }
    }

    pub fn from_error(err: &DataError) -> Self {
        Self::failed(err.to_string(), err.status_code())
    }

    pub fn state(&self) -> RemoteDataState {
        self.state
    }

    pub fn is_response_pending(&self) -> bool {
        self.state == RemoteDataState::Pending
    }

    pub fn has_succeeded(&self) -> bool {
        self.state == RemoteDataState::Success
    }

    pub fn has_failed(&self) -> bool {
        self.state == RemoteDataState::Failed
    }

    pub fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    pub fn into_payload(self) -> Option<T> {
        self.payload
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> RemoteData<U> {
        RemoteData {
            state: self.state,
            payload: self.payload.map(f),
            error_message: self.error_message,
            status_code: self.status_code,
        }
    }
}

/// Replay-latest sequence of `RemoteData` snapshots.
///
/// Cloning gives another subscriber that starts from the latest snapshot.
/// Dropping every clone stops the updates but not a call already sent.
#[derive(Debug, Clone)]
pub struct RemoteDataStream<T> {
    rx: watch::Receiver<RemoteData<T>>,
}

impl<T> RemoteDataStream<T> {
    pub(crate) fn new(rx: watch::Receiver<RemoteData<T>>) -> Self {
        Self { rx }
    }

    /// A stream that already holds its final snapshot.
    pub fn ready(snapshot: RemoteData<T>) -> Self {
        let (_, rx) = watch::channel(snapshot);
        Self { rx }
    }

    /// A pending stream and the sender that resolves it.
    pub(crate) fn channel() -> (watch::Sender<RemoteData<T>>, Self) {
        let (tx, rx) = watch::channel(RemoteData::pending());
        (tx, Self { rx })
    }
}

impl<T: Clone> RemoteDataStream<T> {
    pub fn current(&self) -> RemoteData<T> {
        self.rx.borrow().clone()
    }

    /// Wait for the next snapshot. `None` once no further snapshot can arrive.
    pub async fn changed(&mut self) -> Option<RemoteData<T>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// First non-pending snapshot.
    ///
    /// If the producer goes away while still pending, the pending snapshot is
    /// returned.
    pub async fn terminal(&mut self) -> RemoteData<T> {
        let _ = self.rx.wait_for(|rd| !rd.is_response_pending()).await;
        self.rx.borrow_and_update().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_one_state_holds() {
        let snapshots = [
            RemoteData::<u32>::pending(),
            RemoteData::success(7, 200),
            RemoteData::failed("boom", Some(500)),
        ];
        for rd in snapshots {
            let flags = [rd.is_response_pending(), rd.has_succeeded(), rd.has_failed()];
            assert_eq!(flags.iter().filter(|f| **f).count(), 1);
        }
    }

    #[test]
    fn test_from_error_keeps_status() {
        let rd = RemoteData::<()>::from_error(&DataError::NotFound("groups/1".to_string()));
        assert!(rd.has_failed());
        assert_eq!(rd.status_code(), Some(404));
        assert_eq!(rd.error_message(), Some("Resource not found: groups/1"));
    }

    #[test]
    fn test_map_keeps_state() {
        let rd = RemoteData::success(vec![1, 2, 3], 200).map(|v| v.len());
        assert!(rd.has_succeeded());
        assert_eq!(rd.payload(), Some(&3));
    }

    #[tokio::test]
    async fn test_ready_stream_is_terminal() {
        let mut stream = RemoteDataStream::ready(RemoteData::success("x", 200));
        assert!(stream.current().has_succeeded());
        assert_eq!(stream.terminal().await.payload(), Some(&"x"));
        assert!(stream.changed().await.is_none());
    }

    #[tokio::test]
    async fn test_terminal_waits_for_resolution() {
        let (tx, mut stream) = RemoteDataStream::<u32>::channel();
        let mut late = stream.clone();
        assert!(stream.current().is_response_pending());

        tokio::spawn(async move {
            tx.send_replace(RemoteData::success(42, 200));
        });

        assert_eq!(stream.terminal().await.payload(), Some(&42));
        assert_eq!(late.terminal().await.payload(), Some(&42));
    }
}
