// src/watch/mod.rs

//! File watching.
//!
//! This module is responsible for:
//! - Deciding which paths may be watched at all ([`ignore`]).
//! - Abstracting the low-level watch primitive ([`backend`]), with a
//!   `notify`-based implementation and an in-memory mock.
//! - Keeping track of which physical watchers back which logical file
//!   ([`registry`]).
//!
//! It does **not** know about debouncing or builds; it only turns
//! filesystem changes into `RuntimeEvent`s tagged with a target id.

pub mod backend;
pub mod ignore;
pub mod mock;
pub mod notify_backend;
pub mod registry;

pub use backend::{EventSender, TargetId, TargetSink, WatchBackend, WatcherHandle};
pub use ignore::IgnoreFilter;
pub use notify_backend::NotifyBackend;
pub use registry::{TargetOwner, WatchOutcome, WatchRegistry, WatchTarget};
