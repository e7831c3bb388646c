pub mod adapter;
pub mod architecture;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod metrics;
pub mod orchestrator;
pub mod positions;
pub mod rules;
pub mod viewport;

pub use adapter::{ViewState, to_graph};
pub use architecture::Architecture;
#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, load_config};
pub use dispatch::{DispatchPath, LayoutDispatcher, WorkerRequest};
pub use layout::{EngineKind, LayoutEngine, LayoutError, LayoutOutput, apply_incremental_layout};
pub use orchestrator::{LayoutCommit, LayoutObserver, LayoutOrchestrator, LayoutReport};
pub use positions::PositionStore;
pub use rules::select_layout_config;
