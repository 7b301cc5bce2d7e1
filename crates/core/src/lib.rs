//! winagg Core - value, row and error types for the winagg window aggregation engine.
//!
//! This crate provides the foundational types shared by the storage and query crates:
//!
//! - `DataType`: Supported data types (Boolean, Int32, Int64, Float64, String, DateTime, Bytes, Array)
//! - `Value`: Runtime values held in rows and aggregate transition states
//! - `Row`: A row of values with an identifier carried from input to output
//! - `Error`: Error types shared across crates
//!
//! # Example
//!
//! ```rust
//! use winagg_core::{Row, Value};
//!
//! let row = Row::new(1, vec![
//!     Value::Int64(1),
//!     Value::String("Alice".into()),
//! ]);
//!
//! assert_eq!(row.id(), 1);
//! assert_eq!(row.get(1), Some(&Value::String("Alice".into())));
//! ```

#![no_std]

extern crate alloc;

mod error;
mod row;
mod types;
mod value;

pub use error::{Error, Result};
pub use row::{Row, RowId, DUMMY_ROW_ID};
pub use types::DataType;
pub use value::Value;
