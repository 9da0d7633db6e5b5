//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. Services depend
//! only on these traits and receive implementations through their
//! constructors.

mod repository;

pub use repository::{LedgerStore, UserStore};
