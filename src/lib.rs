//! A tiny embedded record store backed by a single delimited text file.
//!
//! ```no_run
//! use csvbase::{Entry, RecordStore, StoreConfig};
//!
//! let mut store = RecordStore::open(StoreConfig::new("defects.csv", "data"))?;
//! let id = store.insert([Entry::new()
//!     .set("panel_id", "SP-1001")
//!     .set("defect_type", "CC")
//!     .set("cause", "Operator")])?;
//! assert!(store.contains(id));
//! # Ok::<(), csvbase::StoreError>(())
//! ```

pub mod config;
pub use config::{SaveOptions, StoreConfig};

pub mod guard;
pub use guard::{FileModeGuard, PermissionGuard};

pub mod record;
pub use record::{Column, ColumnType, Entry, Record, Value};

pub mod result;
pub use result::{StoreError, StoreResult};

pub mod store;
pub use store::{RecordStore, TableInfo};

mod encoding;
mod table;

#[cfg(test)]
mod fixture;
