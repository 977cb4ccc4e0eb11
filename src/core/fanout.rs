//! Structured per-node task group.
//!
//! Every node's work runs on its own scoped thread. Outcomes arrive over a
//! channel and every thread is joined before the report is returned, so no
//! worker outlives the stage that spawned it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

use crate::error::{Error, ErrorCode, Result};
use crate::node::Node;

/// How sibling tasks react to a failing node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Every task runs to completion regardless of failures.
    #[default]
    WaitForAll,
    /// Siblings observe a cancellation flag at their next checkpoint.
    CancelSiblings,
}

/// Per-task view handed to the work closure.
pub struct TaskContext<'a> {
    pub index: usize,
    pub node: &'a Node,
    label: &'a str,
    cancelled: &'a AtomicBool,
}

impl TaskContext<'_> {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with `task.cancelled` once a sibling has failed under
    /// [`FailurePolicy::CancelSiblings`].
    pub fn checkpoint(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::task_cancelled(self.label, self.index, &self.node.ip));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NodeFailure {
    pub index: usize,
    pub ip: String,
    pub error: Error,
}

/// Outcome of one fan-out stage.
#[derive(Debug)]
pub struct FanOutReport<T> {
    /// Successful results keyed by node index.
    pub completed: BTreeMap<usize, T>,
    /// Failures in arrival order.
    pub failures: Vec<NodeFailure>,
}

impl<T> FanOutReport<T> {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// The first failure observed, preferring a root cause over the
    /// cancellations it triggered.
    pub fn first_error(&self) -> Option<&Error> {
        self.root_cause().map(|position| &self.failures[position].error)
    }

    fn root_cause(&self) -> Option<usize> {
        self.failures
            .iter()
            .position(|f| f.error.code != ErrorCode::TaskCancelled)
            .or_else(|| (!self.failures.is_empty()).then_some(0))
    }

    /// Collapse into the first error, with every other failure attached as a hint.
    pub fn into_result(self) -> Result<BTreeMap<usize, T>> {
        let Some(position) = self.root_cause() else {
            return Ok(self.completed);
        };

        let mut failures = self.failures;
        let mut error = failures.remove(position).error;
        for failure in failures {
            error = error.with_hint(format!("{}: {}", failure.ip, failure.error.message));
        }
        Err(error)
    }
}

/// A labelled task group with a fixed failure policy.
#[derive(Debug, Clone)]
pub struct FanOut {
    label: String,
    policy: FailurePolicy,
}

impl FanOut {
    pub fn new(label: impl Into<String>, policy: FailurePolicy) -> Self {
        Self {
            label: label.into(),
            policy,
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Run `work` for every node concurrently and wait for all of them.
    pub fn run<T, F>(&self, nodes: &[Node], work: F) -> FanOutReport<T>
    where
        T: Send,
        F: Fn(&TaskContext) -> Result<T> + Sync,
    {
        let cancelled = AtomicBool::new(false);
        let (tx, rx) = mpsc::channel();

        let unjoined = thread::scope(|scope| {
            let handles: Vec<_> = nodes
                .iter()
                .enumerate()
                .map(|(index, node)| {
                    let tx = tx.clone();
                    let work = &work;
                    let cancelled = &cancelled;
                    let handle = scope.spawn(move || {
                        let ctx = TaskContext {
                            index,
                            node,
                            label: &self.label,
                            cancelled,
                        };
                        let outcome = self.execute(&ctx, work);
                        let failed = outcome.is_err();
                        let _ = tx.send((index, outcome));
                        if failed && self.policy == FailurePolicy::CancelSiblings {
                            cancelled.store(true, Ordering::SeqCst);
                        }
                    });
                    (index, handle)
                })
                .collect();

            handles
                .into_iter()
                .filter_map(|(index, handle)| handle.join().err().map(|_| index))
                .collect::<Vec<_>>()
        });
        drop(tx);

        let mut report = self.collect(nodes, rx.iter());
        for index in unjoined {
            report.failures.push(NodeFailure {
                index,
                ip: nodes[index].ip.clone(),
                error: Error::task_panicked(&self.label, index, &nodes[index].ip),
            });
        }

        self.log_summary(nodes.len(), &report);
        report
    }

    /// Run `work` node by node in index order.
    pub fn run_serial<T, F>(&self, nodes: &[Node], work: F) -> FanOutReport<T>
    where
        F: Fn(&TaskContext) -> Result<T>,
    {
        let cancelled = AtomicBool::new(false);
        let mut outcomes = Vec::with_capacity(nodes.len());

        for (index, node) in nodes.iter().enumerate() {
            let ctx = TaskContext {
                index,
                node,
                label: &self.label,
                cancelled: &cancelled,
            };
            let outcome = self.execute(&ctx, &work);
            if outcome.is_err() && self.policy == FailurePolicy::CancelSiblings {
                cancelled.store(true, Ordering::SeqCst);
            }
            outcomes.push((index, outcome));
        }

        let report = self.collect(nodes, outcomes);
        self.log_summary(nodes.len(), &report);
        report
    }

    fn execute<T, F>(&self, ctx: &TaskContext, work: &F) -> Result<T>
    where
        F: Fn(&TaskContext) -> Result<T>,
    {
        ctx.checkpoint()?;
        panic::catch_unwind(AssertUnwindSafe(|| work(ctx)))
            .unwrap_or_else(|_| Err(Error::task_panicked(&self.label, ctx.index, &ctx.node.ip)))
    }

    fn collect<T>(
        &self,
        nodes: &[Node],
        outcomes: impl IntoIterator<Item = (usize, Result<T>)>,
    ) -> FanOutReport<T> {
        let mut report = FanOutReport {
            completed: BTreeMap::new(),
            failures: Vec::new(),
        };

        for (index, outcome) in outcomes {
            match outcome {
                Ok(value) => {
                    report.completed.insert(index, value);
                }
                Err(error) => {
                    log_status!("fanout", "{}: {} failed: {}", self.label, nodes[index].ip, error);
                    report.failures.push(NodeFailure {
                        index,
                        ip: nodes[index].ip.clone(),
                        error,
                    });
                }
            }
        }

        report
    }

    fn log_summary<T>(&self, total: usize, report: &FanOutReport<T>) {
        log_status!(
            "fanout",
            "{}: {}/{} node(s) succeeded",
            self.label,
            report.completed.len(),
            total
        );
    }
}
