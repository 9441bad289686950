//! Dashboard lifecycle controller and the document it owns.

pub mod controller;
pub mod document;
pub mod route;
pub mod share;
pub mod timers;

pub use controller::{
    ControllerCommand, DashboardController, DashboardError, LifecycleState, LoadOutcome,
    PendingLoad,
};
pub use document::{DashboardDocument, IndexSettings, Services};
pub use route::{DashboardSources, LoadSource, Navigation};
pub use share::ShareLink;
pub use timers::{TimerId, Timers};
