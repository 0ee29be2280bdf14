//! Use-case orchestration.
//!
//! # Responsibility
//! - Turn user actions into store, history, mirror and assistant calls.
//! - Keep UI layers decoupled from storage and transport details.

pub mod session;
