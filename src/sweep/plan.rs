//! Worker planning -- local vs. distributed execution and parallelism degree.

/// Sweeps at or below this estimate (and at most two models) stay in-process.
pub const LOCAL_LIMIT_MINUTES: u64 = 30;

/// Above this estimate a single process would exceed its safe execution
/// window; the sweep must be offloaded to the dispatcher.
pub const OFFLOAD_LIMIT_MINUTES: u64 = 45;

/// Target wall-clock minutes per distributed worker.
pub const TARGET_PER_WORKER_MINUTES: u64 = 45;

pub const MIN_WORKERS: u32 = 2;
pub const MAX_WORKERS: u32 = 8;

/// How a campaign will be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Single batch on the in-process worker pool.
    Local,
    /// Fanned out across parallel workers via the dispatcher.
    Distributed { workers: u32 },
}

/// Decide execution mode from the duration estimate and model count.
///
/// Short sweeps over at most two models run locally. Everything else is
/// distributed; estimates in the 30-45 minute band are merely eligible but
/// we distribute them anyway rather than risk the execution window.
pub fn plan(estimated_minutes: u64, model_count: usize) -> ExecutionMode {
    if estimated_minutes <= LOCAL_LIMIT_MINUTES && model_count <= 2 {
        return ExecutionMode::Local;
    }

    let workers = estimated_minutes
        .div_ceil(TARGET_PER_WORKER_MINUTES)
        .clamp(MIN_WORKERS as u64, MAX_WORKERS as u64) as u32;

    ExecutionMode::Distributed { workers }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_sweep_stays_local() {
        assert_eq!(plan(7, 2), ExecutionMode::Local);
        assert_eq!(plan(30, 1), ExecutionMode::Local);
    }

    #[test]
    fn test_many_models_forces_distribution() {
        assert!(matches!(plan(10, 3), ExecutionMode::Distributed { .. }));
    }

    #[test]
    fn test_long_sweep_forces_distribution() {
        assert!(matches!(plan(46, 1), ExecutionMode::Distributed { .. }));
    }

    #[test]
    fn test_worker_count_scales_with_estimate() {
        assert_eq!(plan(60, 4), ExecutionMode::Distributed { workers: 2 });
        assert_eq!(plan(120, 4), ExecutionMode::Distributed { workers: 3 });
        assert_eq!(plan(200, 4), ExecutionMode::Distributed { workers: 5 });
    }

    #[test]
    fn test_worker_count_clamped() {
        // Never below 2, never above 8.
        assert_eq!(plan(31, 3), ExecutionMode::Distributed { workers: 2 });
        assert_eq!(plan(10_000, 4), ExecutionMode::Distributed { workers: 8 });
    }
}
