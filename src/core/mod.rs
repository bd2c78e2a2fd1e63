//! Core abstractions of the data layer
//!
//! This module provides the request registry, remote data values and their
//! builder, the edit-session store and the traits at the network seam.

pub mod builder;
pub mod container;
pub mod error;
pub mod registry;
pub mod remote_data;
pub mod request;
pub mod store;
pub mod traits;


// Re-export commonly used types
pub use builder::{HrefState, RemoteDataBuilder};
pub use container::ServiceContainer;
pub use error::{DataError, DataResult, ErrorContext};
pub use registry::{RegistryStats, RequestRegistry};
pub use remote_data::{RemoteData, RemoteDataState, RemoteDataStream};
pub use request::{RawResponse, RequestId, RequestState, RestRequest};
pub use store::{EditAction, EditSessionState, EditSessionStore};
pub use traits::*;
