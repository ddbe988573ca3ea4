//! Route leases: validation, per-source replacement semantics, and the
//! resolve path used by edge proxies.

pub mod handler;
pub mod store;

pub use store::{Route, RouteStore};

// vim: ts=4
