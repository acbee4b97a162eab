//! Runtime support for locating the store.
//!
//! This module provides the process-wide default store and thread-local
//! scoped stores, so tests and embedded apps can run against isolated
//! instances.

mod context;
