//! Embedded SQL handle shared by the Atlas storage domains.
//!
//! Each logical database (config, QC, data) is one [`SqliteStore`] with a
//! single connection held for the owner's lifetime.

pub mod error;
pub mod sqlite;
pub mod traits;

pub use error::SQLError;
pub use sqlite::SqliteStore;
pub use traits::{Row, SQLStore, Value};
