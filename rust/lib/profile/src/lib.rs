//! Typed, cached, persistent property store.
//!
//! One [`PropertyStore`] per process (see [`PropertyStore::global`]) owns
//! the config, QC and data databases, a per-key [`ValueCache`], and a
//! [`ChangeNotifier`] that publishes every mutation synchronously.
//!
//! ```no_run
//! use atlas_profile::{Color, PropertyStore};
//!
//! let store = PropertyStore::open_file("/var/lib/atlas/config.db".as_ref())?;
//! store.set_color_of_null_result(Color::DARK_RED, true)?;
//! let prefix: String = store.get_with_fallback("module.prefix", "global.prefix", "S".into())?;
//! # Ok::<(), atlas_profile::ProfileError>(())
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod notify;
pub mod properties;
pub mod store;
pub mod table;
pub mod value;

pub use cache::{CacheEntry, ValueCache};
pub use config::{ProfileConfig, StorageConfig};
pub use error::ProfileError;
pub use notify::{ChangeNotifier, EventHandler, ProfileEvent, SubscriptionId};
pub use properties::{Property, PropertyDef, PROPERTIES};
pub use store::PropertyStore;
pub use table::PropertyTable;
pub use value::{Color, ParseValueError, PropertyType, PropertyValue, ValueKind};
