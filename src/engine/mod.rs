//! Engine: index lifecycle and request dispatch

mod dispatch;
mod lifecycle;

pub use dispatch::QueryEngine;
pub use lifecycle::IndexLifecycleManager;
