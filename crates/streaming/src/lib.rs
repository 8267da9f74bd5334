//! Progressive loading of a paginated geospatial search index.
//!
//! A [`ScopeController`] owns at most one [`LoadSession`] at a time. Each
//! session is driven by a [`ProgressionScheduler`] task that fetches one page
//! per iteration through a [`SearchBackend`], appends it to the
//! [`ResultSink`], and waits a pacing delay before the next page.

pub mod client;
pub mod controller;
pub mod error;
pub mod protocol;
pub mod record;
pub mod scheduler;
pub mod session;
pub mod sink;

#[cfg(test)]
pub(crate) mod testing;

pub use client::*;
pub use controller::*;
pub use error::*;
pub use protocol::*;
pub use record::*;
pub use scheduler::*;
pub use session::*;
pub use sink::*;
