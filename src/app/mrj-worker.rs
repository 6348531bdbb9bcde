use anyhow::{Context, Result};
use clap::Parser;
use mrjob::cmd::worker::Args;
use mrjob::store::Store;
use mrjob::worker::{run_worker, WorkerConfig};
use mrjob::*;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    utils::init_tracing(args.verbose);

    let config = WorkerConfig {
        store: Store::new(&args.work_dir),
        workload: workload::named(&args.workload)?,
        task_budget: args.fail_after,
        advertise: args.advertise.clone(),
    };
    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;

    let ntasks = run_worker(config, listener, &args.join).await?;
    info!(ntasks, "worker done");
    Ok(())
}
