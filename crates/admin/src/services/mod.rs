//! Business logic services for admin.
//!
//! - `assets` - Product file and cover image uploads to the blob store

pub mod assets;
