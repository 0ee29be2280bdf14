//! Domain model for schema-diagram projects.
//!
//! # Responsibility
//! - Define the opaque schema document carried through every layer.
//! - Define the project record and its name-derived slug identity.
//!
//! # Invariants
//! - A document is always well-formed structured data, never partial text.
//! - A project's file identity is its slug, not its `id`.

pub mod document;
pub mod project;
