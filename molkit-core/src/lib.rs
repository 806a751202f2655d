//! Shared primitives for the molkit workspace.
//!
//! `molkit-core` holds what every molkit crate agrees on:
//!
//! - **Error types**: [`MolkitError`] and [`Result`] for structured error handling
//! - **Traits**: [`Annotated`], [`Summarizable`] and [`ContentAddressable`]
//! - **Hashing**: SHA-256 digests used for structural identity

pub mod error;
pub mod hash;
pub mod traits;

pub use error::{MolkitError, Result};
pub use traits::*;
