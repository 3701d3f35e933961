//! Plumbing shared by every exchange adapter.
//!
//! `paginate` holds the offset-paginated, rate-paced sync loop; `rest` the
//! HTTP error mapping and nonce generation; `scripted` (feature `testing`) an
//! in-memory exchange for tests.

pub mod paginate;
pub mod rest;
#[cfg(any(test, feature = "testing"))]
pub mod scripted;

pub use paginate::{PageSource, PaginatedSync};
