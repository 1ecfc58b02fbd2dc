//! Structured storage using redb
//!
//! This module provides queryable, mutable storage for:
//! - Sessions
//! - Messages and network tasks (keyed by dense ids)
//! - Label and domain usage counts
//! - Blob handles and inline payloads

pub mod sessions;
pub mod tables;

pub use sessions::SessionStore;
pub use tables::{RedbStorage, RedbStorageConfig};
