//! Catalog records.
//!
//! These mirror the rows of the catalog database one-to-one. With the
//! `postgres` feature each record derives `sqlx::FromRow`.
//!
//! ```text
//! products 1 ── * orders * ── 1 users
//!     1
//!     └── * download_verifications
//! ```

pub mod download;
pub mod order;
pub mod product;
pub mod user;

pub use download::{DOWNLOAD_LINK_TTL_HOURS, DownloadVerification};
pub use order::Order;
pub use product::Product;
pub use user::User;
