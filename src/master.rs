//! The distributed master: accepts worker registrations over gRPC and drives
//! a job through its map and reduce phases.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{transport::Server, Request, Response, Status};
use tracing::{error, info, warn};

use crate::job::merge;
use crate::registry::{Registrar, WorkerRegistry};
use crate::rpc::master_server::{Master as MasterRpc, MasterServer};
use crate::rpc::worker_client::WorkerClient;
use crate::rpc::{Ack, RegisterArgs, ShutdownArgs};
use crate::schedule::{endpoint, GrpcDispatch, PhaseReport, Scheduler, SchedulerConfig};
use crate::store::Store;
use crate::{Job, Phase};

#[derive(Debug, Clone, Default)]
pub struct MasterConfig {
    pub scheduler: SchedulerConfig,
    /// Leave the per-(map, reduce) files on disk after the job.
    pub keep_intermediate: bool,
}

/// Outcome of a finished job.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub map: PhaseReport,
    pub reduce: PhaseReport,
    /// The merged, sorted output file.
    pub output: PathBuf,
    /// Tasks completed per worker, as reported on shutdown.
    pub worker_tasks: Vec<(String, u32)>,
}

// Serves `Master.Register`. Every address that ever registered is also
// remembered so the workers can be shut down when the job ends.
struct MasterService {
    registrar: Registrar,
    known: Arc<Mutex<Vec<String>>>,
}

#[tonic::async_trait]
impl MasterRpc for MasterService {
    async fn register(&self, request: Request<RegisterArgs>) -> Result<Response<Ack>, Status> {
        let address = request.into_inner().worker_address;
        if address.is_empty() {
            return Err(Status::invalid_argument("empty worker address"));
        }
        {
            let mut known = self.known.lock().unwrap_or_else(|e| e.into_inner());
            if !known.contains(&address) {
                known.push(address.clone());
            }
        }
        info!(worker = %address, "worker registered");
        self.registrar
            .register(address)
            .map_err(|e| Status::failed_precondition(e.to_string()))?;
        Ok(Response::new(Ack {}))
    }
}

pub struct Master {
    job: Job,
    store: Store,
    config: MasterConfig,
}

impl Master {
    pub fn new(job: Job, store: Store, config: MasterConfig) -> Self {
        Self { job, store, config }
    }

    /// Serves registrations on `listener` and runs the job to completion:
    /// map phase, reduce phase, merge, then worker shutdown.
    ///
    /// Registered workers are shut down and the listener is closed even when
    /// a phase or the merge fails; the error is returned afterwards.
    pub async fn run(self, listener: TcpListener) -> Result<JobReport> {
        let registry = WorkerRegistry::new();
        let known = Arc::new(Mutex::new(Vec::new()));
        let service = MasterService {
            registrar: registry.registrar(),
            known: known.clone(),
        };

        info!(job = %self.job.name, addr = %listener.local_addr()?, "master listening");
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(
            Server::builder()
                .add_service(MasterServer::new(service))
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                    let _ = stop_rx.await;
                }),
        );

        let mut scheduler = Scheduler::new(
            self.job.clone(),
            self.config.scheduler.clone(),
            GrpcDispatch,
            registry,
        );
        let outcome = async {
            let map = scheduler.schedule(Phase::Map).await?;
            let reduce = scheduler.schedule(Phase::Reduce).await?;
            let output = merge(&self.store, &self.job)?;
            anyhow::Ok((map, reduce, output))
        }
        .await;
        if let Err(e) = &outcome {
            error!(job = %self.job.name, error = %format!("{e:#}"), "job failed");
        }

        scheduler.registry_mut().close();
        let _ = stop_tx.send(());
        let served = match server.await {
            Ok(served) => served.map_err(anyhow::Error::from),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = &served {
            warn!(error = %e, "master server stopped with an error");
        }

        let workers = known.lock().unwrap_or_else(|e| e.into_inner()).clone();
        let worker_tasks = shutdown_workers(&workers).await;

        let (map, reduce, output) = outcome?;
        served?;

        if !self.config.keep_intermediate {
            self.store
                .remove_intermediate(&self.job.name, self.job.n_map(), self.job.n_reduce)?;
        }
        info!(job = %self.job.name, output = %output.display(), "job complete");

        Ok(JobReport {
            map,
            reduce,
            output,
            worker_tasks,
        })
    }
}

/// Tells every worker to exit and collects how many tasks each ran.
/// Workers that cannot be reached are skipped.
async fn shutdown_workers(workers: &[String]) -> Vec<(String, u32)> {
    let mut tasks = Vec::new();
    for worker in workers {
        let reply = match WorkerClient::connect(endpoint(worker)).await {
            Ok(mut client) => client.shutdown(ShutdownArgs {}).await.map_err(anyhow::Error::from),
            Err(e) => Err(e.into()),
        };
        match reply {
            Ok(reply) => tasks.push((worker.clone(), reply.into_inner().ntasks)),
            Err(e) => warn!(%worker, error = %e, "could not shut down worker"),
        }
    }
    tasks
}
