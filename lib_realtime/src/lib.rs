//! Real-time data synchronization core for the memberhub dashboard.
//!
//! All dashboard data (statistics, members, events, content) flows through a
//! single reducer-driven store: pollers and push sources feed `Action`s in,
//! subscribers observe committed `DomainCache` snapshots coming out. Nothing
//! mutates a cache directly.

// Declare the modules to re-export
pub mod adapters;
pub mod config;
pub mod core;
pub mod errors;

// Re-export everything
pub use crate::adapters::*;
pub use crate::config::*;
pub use crate::core::action::*;
pub use crate::core::cache::*;
pub use crate::core::reconciler::*;
pub use crate::core::reducer::*;
pub use crate::core::scheduler::*;
pub use crate::core::store::*;
pub use crate::errors::*;
