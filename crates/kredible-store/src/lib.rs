//! # Kredible Store
//!
//! Document-store abstraction for the Kredible lending core.
//!
//! The platform persists every record - users, loan requests, offers,
//! market listings, matches, and per-party transaction records - in
//! independent collections behind the [`DocumentStore`] trait. Referential
//! integrity across collections is enforced by the services, not the
//! storage layer.
//!
//! - [`DocumentStore`]: collection-based async persistence, including the
//!   `update_if` conditional update used for every status transition
//! - [`InMemoryStore`]: DashMap-backed backend for tests and embedding
//! - [`Collection`] / [`Ledger`]: typed handles that (de)serialize at the
//!   boundary, so malformed documents fail loudly

pub mod collections;
pub mod memory;
pub mod store;

pub use collections::{names, Collection, Ledger};
pub use memory::InMemoryStore;
pub use store::{DocumentStore, Filter, FilterOp, Order, StoreError};
