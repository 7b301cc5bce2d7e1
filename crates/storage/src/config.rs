//! Row store configuration.

use std::path::PathBuf;

/// Default in-memory budget before a store spills: 4 MiB.
pub const DEFAULT_WORK_MEM: usize = 4 * 1024 * 1024;

/// Settings for a [`RowStore`](crate::RowStore).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Bytes the store may hold in memory before migrating to a spill file.
    pub work_mem: usize,
    /// Directory for spill files. `None` uses the platform temp directory.
    pub temp_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            work_mem: DEFAULT_WORK_MEM,
            temp_dir: None,
        }
    }
}

impl StoreConfig {
    /// Creates a config with the default budget.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the memory budget in bytes.
    pub fn with_work_mem(mut self, work_mem: usize) -> Self {
        self.work_mem = work_mem;
        self
    }

    /// Sets the spill directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.work_mem, DEFAULT_WORK_MEM);
        assert!(config.temp_dir.is_none());
    }

    #[test]
    fn test_builder() {
        let config = StoreConfig::new().with_work_mem(1024).with_temp_dir("/tmp");
        assert_eq!(config.work_mem, 1024);
        assert_eq!(config.temp_dir, Some(PathBuf::from("/tmp")));
    }
}
