// --- File: crates/docpersist_common/src/lib.rs ---

// Declare modules within this crate
pub mod error;    // Error handling
pub mod logging;  // Logging utilities
pub mod models;   // Connection and credential descriptors
pub mod services; // External service abstractions

// Re-export error types and utilities for easier access
pub use error::{config_error, ServiceError};

// Re-export logging utilities for easier access
pub use logging::{init, init_with_level, log_result};

pub use models::{ConnectionDescriptor, CredentialDescriptor};

pub use services::{
    CredentialStore, DiscoveryService, IdGenerator, MemoryCredentialStore, MemoryDiscovery,
    RandomIdGenerator, UuidIdGenerator,
};

// This crate provides functionality shared by the docpersist crates: descriptors,
// errors, logging and the traits for discovery, credential stores and id generation.
