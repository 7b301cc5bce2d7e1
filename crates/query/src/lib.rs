//! Winagg Query - Sliding-window aggregation executor.
//!
//! This crate evaluates window functions and aggregates over a row stream that arrives
//! grouped by partition and sorted within each partition:
//!
//! - `executor`: The window executor, its partition buffer, frame tracking and checkpoints
//! - `frame`: Frame clauses (`ROWS` / `RANGE` with their bounds)
//! - `aggregate`: Aggregates with transition, final and combine steps
//! - `window`: Ranking and value window functions
//! - `catalog`: Resolution of function names and argument types
//! - `config`: Memory budget and checkpoint tuning
//!
//! # Example
//!
//! ```rust
//! use winagg_core::{DataType, Row, Value};
//! use winagg_query::{ArgExpr, ColumnKeys, VecSource, WindowAggExecutor, WindowCall};
//!
//! // (team, score)
//! let rows = vec![
//!     Row::new(1, vec![Value::Int64(1), Value::Int64(7)]),
//!     Row::new(2, vec![Value::Int64(1), Value::Int64(9)]),
//!     Row::new(3, vec![Value::Int64(2), Value::Int64(4)]),
//! ];
//!
//! let out = WindowAggExecutor::builder(VecSource::new(rows))
//!     .partition_by(ColumnKeys::new([0]))
//!     .order_by(ColumnKeys::new([1]))
//!     .call(WindowCall::new("rank"))
//!     .call(WindowCall::new("sum").arg(ArgExpr::column(1), DataType::Int64))
//!     .build()
//!     .unwrap()
//!     .execute()
//!     .unwrap();
//!
//! assert_eq!(out[1].values()[2..], [Value::Int64(2), Value::Int64(16)]);
//! assert_eq!(out[2].values()[2..], [Value::Int64(1), Value::Int64(4)]);
//! ```

pub mod aggregate;
pub mod catalog;
pub mod compare;
pub mod config;
pub mod error;
pub mod executor;
pub mod expr;
pub mod frame;
pub mod source;
pub mod window;

pub use aggregate::{AggregateFunction, Transition, TransitionState};
pub use catalog::{BuiltinCatalog, FunctionCatalog, ResolvedFunction};
pub use compare::{ColumnKeys, KeyComparator};
pub use config::{CheckpointConfig, WindowConfig, MAX_CHECKPOINTS};
pub use error::{Result, WindowError};
pub use executor::{ArgFetch, WindowAggBuilder, WindowAggExecutor, WindowCall, WindowObject, WindowSeek};
pub use expr::ArgExpr;
pub use frame::{FrameBound, FrameMode, FrameSpec};
pub use source::{IterSource, RowSource, VecSource};
pub use window::WindowFunction;
