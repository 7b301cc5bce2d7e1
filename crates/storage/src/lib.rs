//! winagg Storage - spillable multi-cursor row store for window aggregation.
//!
//! This crate provides the partition buffer used by the window executor:
//!
//! - `RowStore`: append-only row sequence with independent read cursors
//! - `CursorFlags`: per-cursor capabilities (`REWIND`, `BACKWARD`)
//! - `SpillFile`: the private scratch file a store migrates to past its memory budget
//! - `StoreConfig`: memory budget and spill directory
//!
//! # Example
//!
//! ```rust
//! use winagg_core::{Row, Value};
//! use winagg_storage::{CursorFlags, RowStore, StoreConfig};
//!
//! let mut store = RowStore::new(StoreConfig::default());
//! let lagging = store.allocate_cursor(CursorFlags::NONE).unwrap();
//! for i in 0..3 {
//!     store.append(Row::new(i, vec![Value::Int64(i as i64)])).unwrap();
//! }
//!
//! store.advance(true).unwrap();
//! store.select(lagging).unwrap();
//! let first = store.fetch(true).unwrap().unwrap();
//! assert_eq!(first.get(0), Some(&Value::Int64(0)));
//! ```

pub mod config;
pub mod cursor;
pub mod error;
pub mod row_store;
pub mod spill;

pub use config::{StoreConfig, DEFAULT_WORK_MEM};
pub use cursor::{CursorFlags, CursorId};
pub use error::{Result, StoreError};
pub use row_store::{RowStore, Status};
pub use spill::SpillFile;
