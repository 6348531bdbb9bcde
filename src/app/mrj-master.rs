use anyhow::{Context, Result};
use clap::Parser;
use mrjob::cmd::master::Args;
use mrjob::master::Master;
use mrjob::store::Store;
use mrjob::*;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    utils::init_tracing(args.verbose);

    let job = Job::from_globs(&args.job_name, &args.inputs, args.n_reduce)?;
    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;

    let master = Master::new(job, Store::new(&args.work_dir), args.master_config());
    let report = master.run(listener).await?;

    for (worker, ntasks) in &report.worker_tasks {
        println!("[{worker}]\tTASKS: {ntasks}");
    }
    println!(
        "map: {} tasks in {} attempts, reduce: {} tasks in {} attempts",
        report.map.tasks, report.map.attempts, report.reduce.tasks, report.reduce.attempts
    );
    println!("{}", report.output.display());
    Ok(())
}
