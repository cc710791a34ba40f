//! Cloud object storage clients with a single interface over S3, Google Cloud
//! Storage and the local filesystem, plus the small SQL and cache helpers that
//! share their configuration conventions.

pub mod logging;
pub mod services;
