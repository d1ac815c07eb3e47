/// Usage enforcement
///
/// This module provides:
/// - The reporter loop that reports usage and re-reads the remaining budget
/// - The once-per-mount warning latch and the lock decision
/// - Process-wide lock and budget cells for route guards and status widgets
/// - A supervisor that keeps one loop per user

pub mod effects;
pub mod gate;
pub mod policy;
pub mod reporter;
pub mod scheduler;
pub mod supervisor;

pub use effects::{LogNotifier, Navigator, Notifier, OverrideStore, RouteNavigator};
pub use gate::{BudgetView, LockGate};
pub use policy::{LockState, WarningLatch};
pub use reporter::{Collaborators, Reporter, ReporterHandle, ReporterPhase, ReporterSettings};
pub use scheduler::{Accounting, TickScheduler};
pub use supervisor::Supervisor;
