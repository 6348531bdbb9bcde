use anyhow::Result;
use clap::Parser;
use mrjob::standalone::{engine::run_sequential, Args};
use mrjob::store::Store;
use mrjob::*;

fn main() -> Result<()> {
    let args = Args::parse();
    utils::init_tracing(args.verbose);

    let engine = workload::named(&args.workload)?;
    let job = Job::from_globs(&args.job_name, &args.inputs, args.n_reduce)?;
    let store = Store::new(&args.work_dir);

    let output = run_sequential(&job, &store, &engine)?;
    if !args.keep_intermediate {
        store.remove_intermediate(&job.name, job.n_map(), job.n_reduce)?;
    }
    println!("{}", output.display());
    Ok(())
}
