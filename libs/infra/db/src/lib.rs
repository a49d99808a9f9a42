pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::CoordinatorDb;
pub use errors::DbError;
pub use repositories::{
    AgentRepository, ClaimVoucherRepository, ClientRepository, FileRegistryRepository, HashStoreRepository,
    HashTypeRepository, HashlistRepository, JobRepository, PresetJobRepository, SettingsRepository, WorkflowRepository,
};
