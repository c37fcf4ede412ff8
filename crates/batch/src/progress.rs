//! Progress aggregation.
//!
//! Progress is always derived from the item collection and never edited by hand.
//! `compute` is a pure function: calling it any number of times over the same
//! items yields the same counts, and the terminal status it suggests is applied
//! by the caller through a `processing -> {completed, failed}` check-and-set, so
//! the derived transition happens at most once.

use serde::{Deserialize, Serialize};

use crate::item::BatchItem;
use crate::status::JobStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub total: u64,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl Progress {
    pub fn compute<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a BatchItem>,
    {
        let mut p = Progress::default();
        for item in items {
            p.total += 1;
            if item.status.is_finished() {
                p.processed += 1;
            }
            if item.succeeded() {
                p.succeeded += 1;
            } else if item.failed() {
                p.failed += 1;
            }
        }
        p
    }

    pub fn is_done(&self) -> bool {
        self.total > 0 && self.processed == self.total
    }

    /// Terminal status implied by these counts, if every item is finished.
    ///
    /// Mixed outcomes fold into `Completed`; callers read `failed` for the split.
    pub fn terminal_status(&self) -> Option<JobStatus> {
        if !self.is_done() {
            return None;
        }
        if self.succeeded == 0 {
            Some(JobStatus::Failed)
        } else {
            Some(JobStatus::Completed)
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "batch job finished (succeeded: {}, failed: {})",
            self.succeeded, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::item::{ItemResult, ItemType};

    fn items(succeeded: usize, failed: usize, pending: usize) -> Vec<BatchItem> {
        let mut out = Vec::new();
        for i in 0..succeeded {
            let mut item = BatchItem::new(format!("ok-{i}"), ItemType::Product);
            item.record_success(ItemResult::ok("done", serde_json::Value::Null), 1, Utc::now());
            out.push(item);
        }
        for i in 0..failed {
            let mut item = BatchItem::new(format!("bad-{i}"), ItemType::Product);
            item.record_failure("boom", 1, Utc::now());
            out.push(item);
        }
        for i in 0..pending {
            out.push(BatchItem::new(format!("todo-{i}"), ItemType::Product));
        }
        out
    }

    #[test]
    fn all_succeeded_is_completed() {
        let p = Progress::compute(&items(10, 0, 0));
        assert_eq!(p, Progress { total: 10, processed: 10, succeeded: 10, failed: 0 });
        assert_eq!(p.terminal_status(), Some(JobStatus::Completed));
    }

    #[test]
    fn all_failed_is_failed() {
        let p = Progress::compute(&items(0, 10, 0));
        assert_eq!(p.failed, 10);
        assert_eq!(p.terminal_status(), Some(JobStatus::Failed));
    }

    #[test]
    fn mixed_outcome_is_completed_with_failures() {
        let p = Progress::compute(&items(6, 4, 0));
        assert_eq!(p.failed, 4);
        assert_eq!(p.terminal_status(), Some(JobStatus::Completed));
        assert_eq!(p.summary(), "batch job finished (succeeded: 6, failed: 4)");
    }

    #[test]
    fn unfinished_or_empty_has_no_terminal_status() {
        assert_eq!(Progress::compute(&items(3, 1, 2)).terminal_status(), None);
        assert_eq!(Progress::compute(&Vec::<BatchItem>::new()).terminal_status(), None);
    }

    #[test]
    fn rejected_results_count_as_failed() {
        let mut item = BatchItem::new("p-1", ItemType::Product);
        item.record_success(ItemResult::rejected("product not found"), 1, Utc::now());
        let p = Progress::compute([&item]);
        assert_eq!(p.failed, 1);
        assert_eq!(p.terminal_status(), Some(JobStatus::Failed));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 200,
                ..ProptestConfig::default()
            })]

            /// Property: counts are consistent with the item collection.
            #[test]
            fn counts_are_consistent(s in 0usize..30, f in 0usize..30, p in 0usize..30) {
                let all = items(s, f, p);
                let progress = Progress::compute(&all);
                prop_assert_eq!(progress.total, all.len() as u64);
                prop_assert_eq!(progress.processed, progress.succeeded + progress.failed);
                prop_assert_eq!(progress.succeeded, s as u64);
                prop_assert_eq!(progress.failed, f as u64);
            }

            /// Property: recomputation is idempotent.
            #[test]
            fn compute_is_idempotent(s in 0usize..20, f in 0usize..20, p in 0usize..20) {
                let all = items(s, f, p);
                let first = Progress::compute(&all);
                let second = Progress::compute(&all);
                prop_assert_eq!(first, second);
                prop_assert_eq!(first.terminal_status(), second.terminal_status());
            }
        }
    }
}
