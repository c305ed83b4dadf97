//! Econ Core - Shared domain types.
//!
//! This crate provides the types shared by every econ component:
//! - `storefront` - Public catalog, payment webhook and download gateway
//! - `admin` - Product catalog management behind Basic auth
//! - `cli` - Migrations and operator tooling
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. The `postgres` feature adds `sqlx` encode/decode
//! implementations so the binaries can read rows straight into these types.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, emails and prices
//! - [`catalog`] - Catalog records (products, users, orders, download verifications)
//! - [`blob_key`] - Blob key derivation for stored file paths

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod blob_key;
pub mod catalog;
pub mod types;

pub use blob_key::{BlobKey, PRODUCT_FILE_PREFIX, PRODUCT_IMAGE_PREFIX};
pub use catalog::*;
pub use types::*;
