//! # Ports Layer
//!
//! Trait definitions for the hexagonal architecture.
//! - **Inbound (Driving)**: API that callers use
//! - **Outbound (Driven)**: the worker transport this crate depends on

pub mod inbound;
pub mod outbound;
