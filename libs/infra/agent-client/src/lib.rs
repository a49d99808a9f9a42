pub mod client;
pub mod errors;
pub mod file_sync;

pub use client::{ControlChannel, CoordinatorClient, RegistrationRequest, RegistrationResponse};
pub use errors::AgentClientError;
pub use file_sync::{FileSyncClient, SyncTarget};
