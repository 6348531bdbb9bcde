//! The master's dispatch loop.
//!
//! Each phase walks its task indices in order. An index is handed to the
//! next idle worker and only advances once some worker reports success; a
//! failed attempt is retried right away on the next worker popped from the
//! registry. Only one task is ever outstanding.

use std::time::Duration;

use anyhow::{anyhow, Result};
use thiserror::Error;
use tonic::Status;
use tracing::{debug, info, warn};

use crate::registry::WorkerRegistry;
use crate::rpc::worker_client::WorkerClient;
use crate::rpc::RunTaskArgs;
use crate::{Job, Phase};

/// Why a single `RunTask` attempt did not succeed.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("worker {worker} unreachable")]
    Transport {
        worker: String,
        #[source]
        source: tonic::transport::Error,
    },
    #[error("worker {worker} failed the task: {status}")]
    Remote { worker: String, status: Status },
    #[error("worker {worker} did not answer within {limit:?}")]
    Timeout { worker: String, limit: Duration },
}

/// What happens to a worker after one of its attempts failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FailedWorkerPolicy {
    /// Never hand the worker another task for the rest of the job.
    #[default]
    Drop,
    /// Put the worker back at the end of the idle queue.
    Requeue,
}

#[derive(Debug, Clone, Default)]
pub struct SchedulerConfig {
    /// Upper bound on one `RunTask` call. `None` waits forever.
    pub rpc_timeout: Option<Duration>,
    pub failed_worker_policy: FailedWorkerPolicy,
}

/// Sends one task to one worker and waits for the outcome.
#[tonic::async_trait]
pub trait Dispatch: Send + Sync {
    async fn run_task(&self, worker: &str, args: RunTaskArgs) -> Result<(), DispatchError>;
}

/// [`Dispatch`] over the `mapreduce.Worker` gRPC service. A fresh channel
/// is opened per attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrpcDispatch;

pub(crate) fn endpoint(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    }
}

#[tonic::async_trait]
impl Dispatch for GrpcDispatch {
    async fn run_task(&self, worker: &str, args: RunTaskArgs) -> Result<(), DispatchError> {
        let mut client = WorkerClient::connect(endpoint(worker))
            .await
            .map_err(|source| DispatchError::Transport {
                worker: worker.to_string(),
                source,
            })?;
        client
            .run_task(args)
            .await
            .map_err(|status| DispatchError::Remote {
                worker: worker.to_string(),
                status,
            })?;
        Ok(())
    }
}

/// Counters for one finished phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: Phase,
    pub tasks: u32,
    pub attempts: u32,
    pub failures: u32,
}

pub struct Scheduler<D> {
    job: Job,
    config: SchedulerConfig,
    dispatch: D,
    registry: WorkerRegistry,
}

impl<D: Dispatch> Scheduler<D> {
    pub fn new(job: Job, config: SchedulerConfig, dispatch: D, registry: WorkerRegistry) -> Self {
        Self {
            job,
            config,
            dispatch,
            registry,
        }
    }

    pub fn registry_mut(&mut self) -> &mut WorkerRegistry {
        &mut self.registry
    }

    /// Runs every task of `phase` to success and returns once the last one
    /// has been acknowledged.
    pub async fn schedule(&mut self, phase: Phase) -> Result<PhaseReport> {
        let (ntasks, n_other) = match phase {
            Phase::Map => (self.job.n_map(), self.job.n_reduce),
            Phase::Reduce => (self.job.n_reduce, self.job.n_map()),
        };
        info!(job = %self.job.name, %phase, ntasks, n_other, "scheduling phase");

        let mut report = PhaseReport {
            phase,
            tasks: ntasks,
            attempts: 0,
            failures: 0,
        };
        for task_index in 0..ntasks {
            let input_file = match phase {
                Phase::Map => self.job.input_files[task_index as usize]
                    .to_string_lossy()
                    .into_owned(),
                Phase::Reduce => String::new(),
            };
            let args = RunTaskArgs::new(&self.job.name, &input_file, phase, task_index, n_other);

            loop {
                let worker = self
                    .registry
                    .next()
                    .await
                    .ok_or_else(|| anyhow!("worker registry closed during {phase} phase"))?;
                report.attempts += 1;
                debug!(%worker, %phase, task_index, "dispatching task");

                match self.attempt(&worker, args.clone()).await {
                    Ok(()) => {
                        self.registry.register(worker)?;
                        break;
                    }
                    Err(e) => {
                        report.failures += 1;
                        warn!(%phase, task_index, error = %e, "task attempt failed, retrying on another worker");
                        if self.config.failed_worker_policy == FailedWorkerPolicy::Requeue {
                            self.registry.register(worker)?;
                        }
                    }
                }
            }
        }

        info!(job = %self.job.name, %phase, attempts = report.attempts, failures = report.failures, "phase done");
        Ok(report)
    }

    async fn attempt(&self, worker: &str, args: RunTaskArgs) -> Result<(), DispatchError> {
        let call = self.dispatch.run_task(worker, args);
        match self.config.rpc_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
                Err(DispatchError::Timeout {
                    worker: worker.to_string(),
                    limit,
                })
            }),
            None => call.await,
        }
    }
}
