//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the client core and the host it runs
//! in. Each trait represents a capability that the core requires but that must
//! be implemented differently per platform (desktop, mobile, web shell).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Raw async HTTP transport. Knows nothing
//!   about credentials; the authenticated decorator lives in `core-auth`.
//!
//! ### Security & Storage
//! - [`SecureStore`](storage::SecureStore) - Durable credential persistence
//!   (Keychain/Keystore/Secret Service)
//!
//! ### Platform Integration
//! - [`Navigator`](navigation::Navigator) - Routes the host UI to the main or
//!   unauthenticated entry point
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate | Status |
//! |----------|---------------------|--------|
//! | Desktop  | `bridge-desktop`    | ✅ Available |
//! | Mobile   | TBD                 | 📋 Planned |
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! let secure_store = config.secure_store
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "SecureStore".to_string(),
//!         message: "No secure store implementation provided.".to_string(),
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! convert platform-specific errors into it and must never put secret values in
//! error messages.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across async
//! tasks behind `Arc<dyn Trait>`.

pub mod error;
pub mod http;
pub mod logging;
pub mod navigation;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use navigation::{NavigationTarget, Navigator};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use storage::SecureStore;
