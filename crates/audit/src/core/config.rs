use crate::runner::registry::DEFAULT_CHECKER;
use std::num::NonZeroUsize;

/// Frames a session may run before the engine stops it, regardless of what
/// the checker wants.
pub const DEFAULT_FRAME_CEILING: u64 = 120;

#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub recurse: bool,
    pub concurrent: bool,
    pub checker: String,
    pub frame_ceiling: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            recurse: false,
            concurrent: false,
            checker: DEFAULT_CHECKER.to_string(),
            frame_ceiling: DEFAULT_FRAME_CEILING,
        }
    }
}

impl AuditConfig {
    pub fn with_recurse(mut self, recurse: bool) -> Self {
        self.recurse = recurse;
        self
    }

    pub fn with_concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    pub fn with_checker(mut self, checker: impl Into<String>) -> Self {
        self.checker = checker.into();
        self
    }

    pub fn with_frame_ceiling(mut self, frames: u64) -> Self {
        self.frame_ceiling = frames.max(1);
        self
    }

    /// Number of sessions allowed in flight at once.
    pub fn workers(&self) -> usize {
        if self.concurrent {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        } else {
            1
        }
    }

    /// Whether a node at `depth` below a root should be visited. The root is
    /// depth 0; without recursion nothing below depth 1 is.
    pub fn visits_depth(&self, depth: usize) -> bool {
        self.recurse || depth <= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_by_default() {
        let config = AuditConfig::default();
        assert_eq!(config.workers(), 1);
        assert_eq!(config.checker, "default");
        assert_eq!(config.frame_ceiling, DEFAULT_FRAME_CEILING);
    }

    #[test]
    fn test_depth_limit_without_recursion() {
        let config = AuditConfig::default();
        assert!(config.visits_depth(0));
        assert!(config.visits_depth(1));
        assert!(!config.visits_depth(2));

        let config = config.with_recurse(true);
        assert!(config.visits_depth(5));
    }

    #[test]
    fn test_concurrent_uses_host_parallelism() {
        let config = AuditConfig::default().with_concurrent(true);
        assert!(config.workers() >= 1);
    }

    #[test]
    fn test_zero_ceiling_is_clamped() {
        let config = AuditConfig::default().with_frame_ceiling(0);
        assert_eq!(config.frame_ceiling, 1);
    }
}
