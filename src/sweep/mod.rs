//! Sweep planning -- expansion, duration estimation, worker planning, and
//! batch splitting. Everything here is pure: no I/O, no clocks.

pub mod batch;
pub mod estimate;
pub mod expand;
pub mod plan;

pub use self::batch::split_batches;
pub use self::estimate::estimate_minutes;
pub use self::expand::expand;
pub use self::plan::{plan, ExecutionMode};

use serde::{Deserialize, Serialize};

/// One atomic unit of work: a single question against a single
/// (model, user_type, think_mode) combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub model: String,
    pub user_type: String,
    pub think_mode: bool,
    pub question: String,
    pub iteration: u32,
}

/// A contiguous slice of cases assigned to one worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: String,
    pub worker_index: u32,
    pub cases: Vec<TestCase>,
    pub estimated_minutes: u64,
}
