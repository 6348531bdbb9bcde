//! The worker process: serves `mapreduce.Worker` and runs one task at a time.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, Notify};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{transport::Server, Request, Response, Status};
use tracing::{info, warn};

use crate::rpc::master_client::MasterClient;
use crate::rpc::worker_server::{Worker, WorkerServer};
use crate::rpc::{Ack, RegisterArgs, RunTaskArgs, ShutdownArgs, ShutdownReply};
use crate::schedule::endpoint;
use crate::store::Store;
use crate::task::{run_map_task, run_reduce_task};
use crate::{Phase, Workload};

/// Runs the task described by `args` with the given application.
pub fn execute_task(store: &Store, workload: Workload, args: &RunTaskArgs) -> Result<()> {
    let phase = Phase::try_from(args.phase).map_err(|_| anyhow!("unknown phase {}", args.phase))?;
    anyhow::ensure!(
        !args.job_name.is_empty() && !args.job_name.contains(std::path::is_separator),
        "invalid job name {:?}",
        args.job_name
    );
    match phase {
        Phase::Map => run_map_task(
            store,
            &args.job_name,
            args.task_index,
            Path::new(&args.input_file),
            args.n_other,
            workload.map_fn,
        ),
        Phase::Reduce => run_reduce_task(
            store,
            &args.job_name,
            args.task_index,
            args.n_other,
            workload.reduce_fn,
        ),
    }
    .with_context(|| format!("{phase} task {} of job {}", args.task_index, args.job_name))
}

#[derive(Clone)]
pub struct WorkerConfig {
    pub store: Store,
    pub workload: Workload,
    /// Stop accepting tasks after this many `RunTask` calls. Later calls
    /// fail as if the worker had crashed.
    pub task_budget: Option<u32>,
    /// Address the master should dial; defaults to the listener's address.
    pub advertise: Option<String>,
}

pub struct WorkerService {
    config: WorkerConfig,
    busy: Arc<Mutex<()>>,
    calls: AtomicU32,
    completed: Arc<AtomicU32>,
    shutdown: Arc<Notify>,
}

impl WorkerService {
    fn new(config: WorkerConfig, completed: Arc<AtomicU32>, shutdown: Arc<Notify>) -> Self {
        Self {
            config,
            busy: Arc::new(Mutex::new(())),
            calls: AtomicU32::new(0),
            completed,
            shutdown,
        }
    }
}

#[tonic::async_trait]
impl Worker for WorkerService {
    async fn run_task(&self, request: Request<RunTaskArgs>) -> Result<Response<Ack>, Status> {
        let args = request.into_inner();
        // Held by the blocking task, so a caller that gives up on this RPC
        // does not free the worker while the task is still running.
        let busy = self
            .busy
            .clone()
            .try_lock_owned()
            .map_err(|_| Status::resource_exhausted("worker is already running a task"))?;

        if let Some(budget) = self.config.task_budget {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= budget {
                warn!(task_index = args.task_index, "task budget exhausted, refusing task");
                return Err(Status::unavailable("worker task budget exhausted"));
            }
        }

        info!(job = %args.job_name, phase = %args.phase(), task_index = args.task_index, "running task");
        let store = self.config.store.clone();
        let workload = self.config.workload;
        let task = args.clone();
        let result = tokio::task::spawn_blocking(move || {
            let _busy = busy;
            execute_task(&store, workload, &task)
        })
        .await
            .map_err(|e| Status::internal(format!("task aborted: {e}")))?;

        match result {
            Ok(()) => {
                self.completed.fetch_add(1, Ordering::SeqCst);
                Ok(Response::new(Ack {}))
            }
            Err(e) => {
                warn!(task_index = args.task_index, error = %format!("{e:#}"), "task failed");
                Err(Status::internal(format!("{e:#}")))
            }
        }
    }

    async fn shutdown(&self, _request: Request<ShutdownArgs>) -> Result<Response<ShutdownReply>, Status> {
        let ntasks = self.completed.load(Ordering::SeqCst);
        info!(ntasks, "shutting down");
        self.shutdown.notify_one();
        Ok(Response::new(ShutdownReply { ntasks }))
    }
}

/// Announces `worker_address` to the master at `master`.
pub async fn register(master: &str, worker_address: &str) -> Result<()> {
    let mut client = MasterClient::connect(endpoint(master))
        .await
        .with_context(|| format!("connecting to master at {master}"))?;
    client
        .register(RegisterArgs {
            worker_address: worker_address.to_string(),
        })
        .await
        .with_context(|| format!("registering with master at {master}"))?;
    Ok(())
}

/// Serves tasks on `listener` after registering with `master`, until the
/// master sends `Shutdown`. Returns the number of tasks completed.
pub async fn run_worker(config: WorkerConfig, listener: TcpListener, master: &str) -> Result<u32> {
    let address = match &config.advertise {
        Some(address) => address.clone(),
        None => listener.local_addr()?.to_string(),
    };
    let completed = Arc::new(AtomicU32::new(0));
    let shutdown = Arc::new(Notify::new());
    let service = WorkerService::new(config, completed.clone(), shutdown.clone());

    let signal = shutdown.clone();
    let server = tokio::spawn(
        Server::builder()
            .add_service(WorkerServer::new(service))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                signal.notified().await
            }),
    );
    info!(worker = %address, %master, "worker listening");

    if let Err(e) = register(master, &address).await {
        shutdown.notify_one();
        let _ = server.await;
        return Err(e);
    }

    server.await??;
    Ok(completed.load(Ordering::SeqCst))
}
