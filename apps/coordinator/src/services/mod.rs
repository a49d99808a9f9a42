pub mod event_bus;
pub mod file_sync;
pub mod hash_extract;
pub mod hashlist_processor;
pub mod message_router;
pub mod reaper;
pub mod scheduler;

pub use file_sync::spawn_file_sync_daemon;
pub use reaper::spawn_reaper;
pub use scheduler::spawn_scheduler;
