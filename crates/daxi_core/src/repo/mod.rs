//! Persistence contracts and implementations.
//!
//! # Responsibility
//! - Define the project store contract used by the session layer.
//! - Keep file layout details (`{slug}.json`) inside this module.
//!
//! # Invariants
//! - Store APIs return semantic errors (`NotFound`, `NoChange`, ...) in
//!   addition to I/O failures.

pub mod project_repo;
