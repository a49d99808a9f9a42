pub mod handlers;
pub mod kernel;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

/// Re-exports needed to ignite the coordinator from `main.rs`.
pub mod prelude {
    pub use crate::kernel::CoordinatorKernel;
    pub use crate::state::{AppState, CoordinatorMode};
}
