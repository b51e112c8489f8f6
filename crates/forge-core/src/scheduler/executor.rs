//! Layer execution
//!
//! [`LayerScheduler`] drives an execution plan through the lock manager, the
//! task agent and the review oracle.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::{join_all, try_join_all};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::batch::split_into_batches;
use super::cross_reference::cross_reference;
use super::report::{BatchReport, LayerReport, RunReport, TaskReport, TaskStatus};
use super::validation::check_result;
use super::{GateMode, SchedulerConfig};
use crate::agents::{ReviewKind, ReviewOracle, TaskAgent, Verdict};
use crate::domain::blueprint::{Blueprint, ExecutionPlan};
use crate::domain::locking::{LockManager, LockTimeout};
use crate::error::{Error, Result};

/// Runs execution plans layer by layer
pub struct LayerScheduler {
    config: SchedulerConfig,
    locks: LockManager,
    agent: Arc<dyn TaskAgent>,
    oracle: Option<Arc<dyn ReviewOracle>>,
}

impl LayerScheduler {
    /// Create a scheduler without a review oracle; both gates are skipped
    /// until one is attached
    pub fn new(config: SchedulerConfig, locks: LockManager, agent: Arc<dyn TaskAgent>) -> Self {
        Self {
            config,
            locks,
            agent,
            oracle: None,
        }
    }

    pub fn with_review_oracle(mut self, oracle: Arc<dyn ReviewOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    /// Run a plan to completion
    ///
    /// The plan is validated first. Task failures end up in the report; only
    /// plan errors and review-oracle failures are returned as `Err`. A reaper
    /// runs for the duration of the call.
    pub async fn run(&self, plan: &ExecutionPlan) -> Result<RunReport> {
        plan.validate()?;
        let _reaper = self.locks.spawn_reaper();
        let started_at = Utc::now();

        info!(
            session_id = %plan.session_id,
            layers = plan.layers.len(),
            tasks = plan.task_count(),
            parallel = self.config.parallel,
            max_concurrency = self.config.max_concurrency,
            gate_mode = %self.config.gate_mode,
            "Starting run"
        );

        let mut layers = Vec::with_capacity(plan.layers.len());
        for (index, ids) in plan.layers.iter().enumerate() {
            let blueprints = ids
                .iter()
                .map(|id| {
                    plan.blueprint(id)
                        .ok_or_else(|| Error::BlueprintNotFound(id.clone()))
                })
                .collect::<Result<Vec<_>>>()?;
            layers.push(self.run_layer(index, &blueprints, &plan.session_id).await?);
        }

        let report = RunReport {
            session_id: plan.session_id.clone(),
            started_at,
            finished_at: Utc::now(),
            layers,
        };

        info!(
            succeeded = report.count(TaskStatus::Succeeded),
            failed = report.count(TaskStatus::Failed),
            timed_out = report.count(TaskStatus::TimedOut),
            rejected = report.count(TaskStatus::Rejected),
            "Run finished"
        );
        Ok(report)
    }

    async fn run_layer(
        &self,
        index: usize,
        blueprints: &[&Blueprint],
        session_id: &str,
    ) -> Result<LayerReport> {
        let batches = split_into_batches(blueprints, self.config.max_concurrency);
        info!(
            layer = index,
            tasks = blueprints.len(),
            batches = batches.len(),
            "Starting layer"
        );

        let mut reports = Vec::with_capacity(batches.len());
        for (batch_index, batch) in batches.iter().enumerate() {
            reports.push(self.run_batch(index, batch_index, batch, session_id).await?);
        }

        info!(layer = index, "Layer complete");
        Ok(LayerReport {
            index,
            batches: reports,
        })
    }

    async fn run_batch(
        &self,
        layer: usize,
        index: usize,
        batch: &[&Blueprint],
        session_id: &str,
    ) -> Result<BatchReport> {
        debug!(
            layer,
            batch = index,
            tasks = ?batch.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(),
            "Starting batch"
        );

        let verdicts = self.pre_validate(batch).await?;

        let work = batch.iter().zip(verdicts);
        let mut tasks = if self.config.parallel {
            join_all(work.map(|(bp, verdict)| self.execute_task(bp, verdict, session_id))).await
        } else {
            let mut tasks = Vec::with_capacity(batch.len());
            for (bp, verdict) in work {
                tasks.push(self.execute_task(bp, verdict, session_id).await);
            }
            tasks
        };

        // Every task that produced a summary, including ones judged failed.
        let results: Vec<(&Blueprint, &str)> = batch
            .iter()
            .zip(&tasks)
            .filter_map(|(bp, t)| t.summary.as_deref().map(|s| (*bp, s)))
            .collect();
        let xref = cross_reference(&results);
        for conflict in &xref.conflicts {
            warn!(
                layer,
                batch = index,
                path = %conflict.path,
                tasks = ?conflict.tasks,
                "Output path claimed by more than one task"
            );
        }
        for link in &xref.links {
            debug!(
                kind = ?link.kind,
                from = %link.from,
                to = %link.to,
                via = %link.via,
                "Integration link"
            );
        }
        for warning in &xref.warnings {
            warn!(layer, batch = index, "{}", warning);
        }

        self.post_verify(&mut tasks).await?;

        Ok(BatchReport {
            index,
            tasks,
            cross_reference: xref,
        })
    }

    /// Ask the oracle about every specification in the batch
    async fn pre_validate(&self, batch: &[&Blueprint]) -> Result<Vec<Option<Verdict>>> {
        let oracle = match (&self.oracle, self.config.pre_validate) {
            (Some(oracle), true) => oracle,
            _ => return Ok(vec![None; batch.len()]),
        };

        let texts = try_join_all(
            batch
                .iter()
                .map(|bp| oracle.review(ReviewKind::PreValidation, &bp.specifications)),
        )
        .await?;

        Ok(batch
            .iter()
            .zip(texts)
            .map(|(bp, text)| {
                let verdict = Verdict::parse(text);
                if !verdict.approved {
                    warn!(
                        task_id = %bp.id,
                        verdict = %verdict.headline(),
                        gate_mode = %self.config.gate_mode,
                        "Pre-validation did not approve"
                    );
                }
                Some(verdict)
            })
            .collect())
    }

    /// Ask the oracle about every successful summary
    async fn post_verify(&self, tasks: &mut [TaskReport]) -> Result<()> {
        let oracle = match (&self.oracle, self.config.post_verify) {
            (Some(oracle), true) => oracle,
            _ => return Ok(()),
        };

        let texts = try_join_all(tasks.iter().map(|task| async move {
            match (task.status, task.summary.as_deref()) {
                (TaskStatus::Succeeded, Some(summary)) => oracle
                    .review(ReviewKind::PostVerification, summary)
                    .await
                    .map(Some),
                _ => Ok(None),
            }
        }))
        .await?;

        for (task, text) in tasks.iter_mut().zip(texts) {
            let Some(text) = text else { continue };
            let verdict = Verdict::parse(text);
            if !verdict.approved {
                warn!(
                    task_id = %task.task_id,
                    verdict = %verdict.headline(),
                    gate_mode = %self.config.gate_mode,
                    "Post-verification did not approve"
                );
                if self.config.gate_mode == GateMode::Blocking {
                    task.status = TaskStatus::Rejected;
                    task.error = Some(format!(
                        "post-verification not approved: {}",
                        verdict.headline()
                    ));
                }
            }
            task.post_verification = Some(verdict);
        }
        Ok(())
    }

    /// Acquire, invoke, release and validate one task
    async fn execute_task(
        &self,
        blueprint: &Blueprint,
        pre_validation: Option<Verdict>,
        session_id: &str,
    ) -> TaskReport {
        let mut report = TaskReport::new(&blueprint.id, blueprint.kind, TaskStatus::Succeeded);

        if self.config.gate_mode == GateMode::Blocking {
            if let Some(verdict) = pre_validation.as_ref().filter(|v| !v.approved) {
                report.status = TaskStatus::Rejected;
                report.error = Some(format!(
                    "pre-validation not approved: {}",
                    verdict.headline()
                ));
                report.pre_validation = pre_validation;
                return report;
            }
        }
        report.pre_validation = pre_validation;

        let started = Instant::now();
        // Subscribe before acquiring so a deadline that fires early is seen.
        let mut timeouts = self.locks.subscribe_timeouts();
        let held = self.locks.acquire_locks_waiting(blueprint).await;
        info!(task_id = %blueprint.id, locks = held.len(), "Dispatching task");

        let invocation = self.agent.invoke(blueprint);
        let outcome = if held.is_empty() {
            Some(invocation.await)
        } else {
            tokio::select! {
                result = invocation => Some(result),
                _ = self.wait_for_timeout(&mut timeouts, &blueprint.id) => None,
            }
        };
        self.locks.release_locks(&blueprint.id).await;
        report.duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            None => {
                warn!(task_id = %blueprint.id, "Task lost its locks to the deadline");
                report.status = TaskStatus::TimedOut;
                report.error = Some(Error::LockTimeout(blueprint.id.clone()).to_string());
            }
            Some(Err(e)) => {
                warn!(task_id = %blueprint.id, error = %e, "Task failed");
                report.status = TaskStatus::Failed;
                report.error = Some(e.to_string());
            }
            Some(Ok(summary)) => {
                let check = check_result(
                    blueprint,
                    &summary,
                    session_id,
                    self.config.max_summary_lines,
                );
                for warning in &check.warnings {
                    warn!(task_id = %blueprint.id, "{}", warning);
                }
                match check.failure {
                    Some(reason) => {
                        warn!(
                            task_id = %blueprint.id,
                            reason = %reason,
                            "Task result reports failure"
                        );
                        report.status = TaskStatus::Failed;
                        report.error = Some(reason);
                    }
                    None => info!(
                        task_id = %blueprint.id,
                        duration_ms = report.duration_ms,
                        "Task succeeded"
                    ),
                }
                report.warnings = check.warnings;
                report.summary = Some(summary);
            }
        }
        report
    }

    /// Resolve once this task's locks are reclaimed by expiry
    async fn wait_for_timeout(
        &self,
        timeouts: &mut broadcast::Receiver<LockTimeout>,
        task_id: &str,
    ) {
        loop {
            match timeouts.recv().await {
                Ok(timeout) if timeout.task_id == task_id => return,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!(task_id = %task_id, skipped, "Timeout notifications lagged");
                    if !self.locks.holds_locks(task_id).await {
                        return;
                    }
                }
                Err(RecvError::Closed) => std::future::pending::<()>().await,
            }
        }
    }
}
