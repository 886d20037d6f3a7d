//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the client core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the auth stack and the service
//! façade depend on. It establishes the logging conventions, the validated
//! configuration and the event broadcasting used to decouple the transport
//! from navigation.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
