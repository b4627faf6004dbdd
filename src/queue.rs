//! Task queue - accepts learning requests, orders them, and drives them
//! to completion one at a time.
//!
//! Draining is strictly by priority (critical > high > normal > low) with
//! FIFO order inside a tier, re-evaluated at every dequeue. A failure in
//! one task is recorded and never stops the drain.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::LearningEngine;
use crate::error::LearnError;
use crate::types::{Depth, LearningResult, LearningTask, TaskPriority, TaskStatus};

/// Most recent error messages kept for status/reporting
const RECENT_ERRORS_KEPT: usize = 10;

/// Idle poll interval of the background drain loop
const IDLE_POLL: Duration = Duration::from_millis(100);

#[derive(Default)]
struct QueueInner {
    tasks: Vec<LearningTask>,
    next_seq: u64,
    completed: u64,
    failed: u64,
    proficiency_sum: f64,
    finished_runs: u64,
    recent_errors: VecDeque<String>,
}

impl QueueInner {
    /// Atomically claim the next runnable task: highest priority first,
    /// FIFO within a tier.
    fn claim_next(&mut self) -> Option<LearningTask> {
        let idx = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.status == TaskStatus::Pending)
            .max_by(|(_, a), (_, b)| a.priority.cmp(&b.priority).then(b.seq.cmp(&a.seq)))
            .map(|(i, _)| i)?;
        self.tasks[idx].status = TaskStatus::Running;
        Some(self.tasks[idx].clone())
    }

    fn record_outcome(&mut self, task_id: Uuid, result: &LearningResult) {
        if let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) {
            task.status = if result.success {
                TaskStatus::Completed
            } else {
                TaskStatus::Failed
            };
        }
        if result.success {
            self.completed += 1;
        } else {
            self.failed += 1;
        }
        self.proficiency_sum += result.proficiency;
        self.finished_runs += 1;
        for error in &result.errors {
            if self.recent_errors.len() >= RECENT_ERRORS_KEPT {
                self.recent_errors.pop_front();
            }
            self.recent_errors.push_back(format!("{}: {}", result.technology, error));
        }
    }

    fn pending(&self) -> u64 {
        self.tasks.iter().filter(|t| t.status == TaskStatus::Pending).count() as u64
    }

    fn running(&self) -> u64 {
        self.tasks.iter().filter(|t| t.status == TaskStatus::Running).count() as u64
    }
}

/// Read-only snapshot of queue state
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub pending: u64,
    pub running: u64,
    pub completed: u64,
    pub failed: u64,
    /// Mean proficiency across finished runs, 0 when none finished
    pub average_proficiency: f64,
    pub recent_errors: Vec<String>,
}

impl QueueStats {
    pub fn success_rate(&self) -> f64 {
        let finished = self.completed + self.failed;
        if finished == 0 {
            0.0
        } else {
            self.completed as f64 / finished as f64
        }
    }
}

/// Priority queue of learning tasks with a cooperative drain loop
#[derive(Clone)]
pub struct LearningQueue {
    inner: Arc<Mutex<QueueInner>>,
    engine: Arc<LearningEngine>,
    running: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
}

impl LearningQueue {
    pub fn new(engine: Arc<LearningEngine>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueInner::default())),
            engine,
            running: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Append a pending task. Callable while a drain is in progress.
    pub fn enqueue(
        &self,
        technology: &str,
        depth: Depth,
        priority: TaskPriority,
    ) -> Result<Uuid, LearnError> {
        let technology = technology.trim();
        if technology.is_empty() {
            return Err(LearnError::InvalidTask("technology must not be empty".to_string()));
        }

        let mut inner = self.inner.lock().expect("queue lock poisoned");
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let task = LearningTask::new(technology, depth, priority, seq);
        let id = task.id;
        info!(technology, %depth, %priority, seq, "task enqueued");
        inner.tasks.push(task);
        Ok(id)
    }

    /// Begin draining in the background.
    ///
    /// Idempotent: calling while a drain loop is already running is a
    /// no-op.
    pub fn start(&self) {
        // Clear the stop flag before the ownership CAS: a start() racing
        // an old loop's shutdown must not be lost. If the CAS fails, the
        // still-running loop sees the cleared flag and keeps going.
        self.stop.store(false, Ordering::SeqCst);
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("drain loop already running, start ignored");
            return;
        }
        let queue = self.clone();
        tokio::spawn(async move {
            info!("drain loop started");
            loop {
                if queue.stop.load(Ordering::SeqCst) {
                    queue.running.store(false, Ordering::SeqCst);
                    // A start() may have cleared the stop flag between
                    // the two loads; reclaim the loop instead of losing
                    // that start. The CAS keeps at most one loop alive.
                    if !queue.stop.load(Ordering::SeqCst)
                        && queue
                            .running
                            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                            .is_ok()
                    {
                        continue;
                    }
                    info!("drain loop stopped");
                    break;
                }
                if !queue.drain_one().await {
                    tokio::time::sleep(IDLE_POLL).await;
                }
            }
        });
    }

    /// Signal the drain loop to halt after the in-flight task finishes.
    /// Never aborts a running task.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Drain every pending task sequentially, returning when none remain.
    pub async fn drain(&self) {
        while self.drain_one().await {}
    }

    /// Claim and run a single task; false when nothing was pending.
    async fn drain_one(&self) -> bool {
        let task = {
            let mut inner = self.inner.lock().expect("queue lock poisoned");
            inner.claim_next()
        };
        let Some(task) = task else {
            return false;
        };

        // The lock is not held while the engine runs, so enqueue stays
        // callable mid-drain.
        let result = self.engine.learn(&task.technology, task.depth).await;
        if !result.success {
            warn!(
                technology = %task.technology,
                errors = result.errors.len(),
                "task failed"
            );
        }

        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.record_outcome(task.id, &result);
        true
    }

    /// Snapshot of counts and recent errors
    pub fn stats(&self) -> QueueStats {
        let inner = self.inner.lock().expect("queue lock poisoned");
        QueueStats {
            pending: inner.pending(),
            running: inner.running(),
            completed: inner.completed,
            failed: inner.failed,
            average_proficiency: if inner.finished_runs == 0 {
                0.0
            } else {
                inner.proficiency_sum / inner.finished_runs as f64
            },
            recent_errors: inner.recent_errors.iter().cloned().collect(),
        }
    }

    /// Statuses of all known tasks in enqueue order (for inspection)
    pub fn tasks(&self) -> Vec<LearningTask> {
        let inner = self.inner.lock().expect("queue lock poisoned");
        inner.tasks.clone()
    }
}
