//! Object storage holding the daily trades flat files
//!
//! The pipeline only reads: GET by key, plus HEAD for the `check` audit.

pub mod s3;
pub mod traits;

pub use s3::S3ObjectStore;
pub use traits::ObjectStore;
