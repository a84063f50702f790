//! Batch splitting -- partition cases into balanced, timeout-safe batches.

use super::estimate::estimate_minutes;
use super::{Batch, TestCase};

/// Hard ceiling on estimated per-batch duration. Each worker invocation runs
/// on a platform with a bounded execution window; batches are sized so no
/// single invocation approaches it.
pub const MAX_BATCH_MINUTES: u64 = 20;

/// Cap on how far the timeout-avoidance pass may raise the worker count.
pub const RESPLIT_WORKER_CAP: u32 = 6;

/// Split cases into contiguous batches of `ceil(N / W)`, one per worker.
///
/// If the resulting per-batch estimate exceeds [`MAX_BATCH_MINUTES`], the
/// worker count is raised (capped at [`RESPLIT_WORKER_CAP`]) and the split
/// redone. Batches partition the input exactly: disjoint, in order, with the
/// final batch holding the remainder.
pub fn split_batches(cases: &[TestCase], workers: u32, delay_secs: f64) -> Vec<Batch> {
    if cases.is_empty() {
        return Vec::new();
    }

    let mut workers = workers.max(1);

    let batch_size = cases.len().div_ceil(workers as usize);
    if estimate_minutes(batch_size, delay_secs) > MAX_BATCH_MINUTES {
        let total_minutes = estimate_minutes(cases.len(), delay_secs);
        let needed = total_minutes.div_ceil(MAX_BATCH_MINUTES) as u32;
        let raised = needed.min(RESPLIT_WORKER_CAP);
        if raised > workers {
            tracing::info!(
                from = workers,
                to = raised,
                "raising worker count to keep batches under the per-batch ceiling"
            );
            workers = raised;
        }
    }

    chunk(cases, workers, delay_secs)
}

fn chunk(cases: &[TestCase], workers: u32, delay_secs: f64) -> Vec<Batch> {
    let batch_size = cases.len().div_ceil(workers as usize);

    cases
        .chunks(batch_size)
        .enumerate()
        .map(|(i, slice)| Batch {
            batch_id: format!("batch_{}", i),
            worker_index: i as u32,
            cases: slice.to_vec(),
            estimated_minutes: estimate_minutes(slice.len(), delay_secs),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cases(n: usize) -> Vec<TestCase> {
        (0..n)
            .map(|i| TestCase {
                model: "model-a".to_string(),
                user_type: "business".to_string(),
                think_mode: false,
                question: format!("q{}", i),
                iteration: 0,
            })
            .collect()
    }

    fn assert_partition(input: &[TestCase], batches: &[Batch]) {
        let reassembled: Vec<TestCase> = batches
            .iter()
            .flat_map(|b| b.cases.iter().cloned())
            .collect();
        assert_eq!(reassembled, input, "batches must partition the input exactly");

        let expected_size = input.len().div_ceil(batches.len());
        for batch in &batches[..batches.len() - 1] {
            assert_eq!(batch.cases.len(), expected_size);
        }
        assert!(batches.last().unwrap().cases.len() <= expected_size);
    }

    #[test]
    fn test_partition_property() {
        for n in [1, 5, 9, 10, 11, 40, 97] {
            for w in [1, 2, 3, 4, 6, 8] {
                let input = cases(n);
                let batches = split_batches(&input, w, 0.0);
                assert!(!batches.is_empty());
                assert!(batches.len() <= n.max(1));
                assert_partition(&input, &batches);
            }
        }
    }

    #[test]
    fn test_fewer_batches_than_workers_when_few_cases() {
        let input = cases(3);
        let batches = split_batches(&input, 8, 0.0);
        assert_eq!(batches.len(), 3);
    }

    #[test]
    fn test_worker_indices_and_ids_are_sequential() {
        let input = cases(20);
        let batches = split_batches(&input, 4, 0.0);
        for (i, batch) in batches.iter().enumerate() {
            assert_eq!(batch.worker_index, i as u32);
            assert_eq!(batch.batch_id, format!("batch_{}", i));
        }
    }

    #[test]
    fn test_resplit_when_batches_exceed_ceiling() {
        // 200 cases at 30s each across 2 workers: 100 cases/batch is
        // ~60 estimated minutes, well over the 20 minute ceiling.
        let input = cases(200);
        let batches = split_batches(&input, 2, 0.0);
        assert!(batches.len() > 2);
        assert!(batches.len() <= RESPLIT_WORKER_CAP as usize);
        assert_partition(&input, &batches);
    }

    #[test]
    fn test_resplit_never_lowers_worker_count() {
        let input = cases(10);
        let batches = split_batches(&input, 5, 0.0);
        assert_eq!(batches.len(), 5);
    }

    #[test]
    fn test_empty_input_yields_no_batches() {
        assert!(split_batches(&[], 4, 5.0).is_empty());
    }
}
