pub mod agent;
pub mod file_registry;
pub mod hash_store;
pub mod hash_type;
pub mod hashlist;
pub mod job;
pub mod settings;

pub use agent::{AgentRepository, ClaimVoucherRepository};
pub use file_registry::FileRegistryRepository;
pub use hash_store::HashStoreRepository;
pub use hash_type::HashTypeRepository;
pub use hashlist::{ClientRepository, HashlistRepository};
pub use job::{JobRepository, PresetJobRepository, WorkflowRepository};
pub use settings::SettingsRepository;
