//! Window executor configuration.

use crate::error::{Result, WindowError};
use winagg_storage::StoreConfig;

/// Upper bound on checkpoints kept per partition.
pub const MAX_CHECKPOINTS: usize = 16;

/// Tuning of the aggregate checkpoint cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckpointConfig {
    /// Schedule checkpoints at all.
    pub enabled: bool,
    /// Checkpoints kept per partition.
    pub count: usize,
    /// Spacing used on the first row of a partition, before any frame size is known.
    pub first_step: i64,
    /// Checkpoints are only consulted when the previous frame held more rows than this.
    pub min_frame_size: i64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            count: 1,
            first_step: 100,
            min_frame_size: 4,
        }
    }
}

impl CheckpointConfig {
    /// Checkpointing turned off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Configuration of a [`WindowAggExecutor`](crate::WindowAggExecutor).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WindowConfig {
    /// Row store settings, applied to every partition.
    pub store: StoreConfig,
    /// Checkpoint cache settings.
    pub checkpoints: CheckpointConfig,
}

impl WindowConfig {
    /// Creates a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-partition memory budget in bytes.
    pub fn with_work_mem(mut self, work_mem: usize) -> Self {
        self.store.work_mem = work_mem;
        self
    }

    /// Sets the store configuration.
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Enables or disables checkpoints.
    pub fn with_checkpoints_enabled(mut self, enabled: bool) -> Self {
        self.checkpoints.enabled = enabled;
        self
    }

    /// Sets the number of checkpoints per partition.
    pub fn with_checkpoint_count(mut self, count: usize) -> Self {
        self.checkpoints.count = count;
        self
    }

    /// Sets the checkpoint spacing used on the first row of a partition.
    pub fn with_first_step(mut self, step: i64) -> Self {
        self.checkpoints.first_step = step;
        self
    }

    /// Sets the frame size below which checkpoints are ignored.
    pub fn with_min_frame_size(mut self, size: i64) -> Self {
        self.checkpoints.min_frame_size = size;
        self
    }

    /// Rejects values the executor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.store.work_mem == 0 {
            return Err(WindowError::configuration("work_mem must be positive"));
        }
        let cp = &self.checkpoints;
        if cp.count == 0 || cp.count > MAX_CHECKPOINTS {
            return Err(WindowError::configuration(format!(
                "checkpoint count must be between 1 and {}, got {}",
                MAX_CHECKPOINTS, cp.count
            )));
        }
        if cp.first_step <= 0 {
            return Err(WindowError::configuration(format!(
                "checkpoint first step must be positive, got {}",
                cp.first_step
            )));
        }
        if cp.min_frame_size < 0 {
            return Err(WindowError::configuration(format!(
                "checkpoint minimum frame size must not be negative, got {}",
                cp.min_frame_size
            )));
        }
        Ok(())
    }
}
