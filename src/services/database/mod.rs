//! Relational session helper for Postgres.
//!
//! ```ignore
//! use cloudstore::services::database::{QueryParam, SqlSession};
//!
//! let session = SqlSession::from_env()?;
//! let rows = session
//!     .run_query("SELECT id, name FROM installs WHERE day = $1", &[QueryParam::from("2024-01-01")])
//!     .await?;
//! for row in rows {
//!     println!("{:?}", row.get("NAME"));
//! }
//! ```

mod session;
mod types;

pub use session::{PG_CONN_URL_ENV, SessionOptions, SqlSession};
pub use types::{QueryParam, RowMap};
