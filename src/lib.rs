//! State and coordination layer behind a dashboard application.
//!
//! Panels talk to each other over the scoped [`events::EventBus`]. The
//! [`dashboard::DashboardController`] owns the current dashboard document,
//! including its query and filter [`registry::Registry`] instances, and keeps
//! the active partition set in step with the filters through
//! [`index::IndexExpander`].

pub mod config;
pub mod consts;
pub mod dashboard;
pub mod events;
pub mod fields;
pub mod index;
pub mod logging;
pub mod network;
pub mod predicate;
pub mod registry;
pub mod store;
