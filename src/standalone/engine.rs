use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::job::merge;
use crate::store::Store;
use crate::task::{run_map_task, run_reduce_task};
use crate::*;

/// Runs every map task, then every reduce task, then merges the reduce
/// outputs. Returns the merged output file.
pub fn run_sequential(job: &Job, store: &Store, engine: &Workload) -> Result<PathBuf> {
    info!(job = %job.name, n_map = job.n_map(), n_reduce = job.n_reduce, "running sequentially");
    for (map_index, input) in job.input_files.iter().enumerate() {
        run_map_task(store, &job.name, map_index as u32, input, job.n_reduce, engine.map_fn)?;
    }
    for reduce_index in 0..job.n_reduce {
        run_reduce_task(store, &job.name, reduce_index, job.n_map(), engine.reduce_fn)?;
    }
    merge(store, job)
}
