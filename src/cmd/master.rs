use std::time::Duration;

use clap::Parser;

use crate::master::MasterConfig;
use crate::schedule::{FailedWorkerPolicy, SchedulerConfig};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Glob specs for the input files, one map task per matched file
    #[arg(required = true)]
    pub inputs: Vec<String>,
    /// Address to accept worker registrations on
    #[clap(short, long, default_value = "127.0.0.1:7777")]
    pub listen: String,
    /// Job name, used to name every intermediate and output file
    #[clap(short, long, default_value = "wcnt_dist")]
    pub job_name: String,
    /// Number of reduce tasks
    #[clap(short, long, default_value_t = 3)]
    pub n_reduce: u32,
    /// Directory for intermediate and output files, shared with the workers
    #[clap(short = 'd', long, default_value = ".")]
    pub work_dir: String,
    /// Give up on a RunTask call after this many seconds (default: wait forever)
    #[clap(short, long, default_value = None)]
    pub timeout: Option<u64>,
    /// What to do with a worker whose task attempt failed
    #[clap(long, value_enum, default_value_t = FailedWorkerPolicy::Drop)]
    pub failed_workers: FailedWorkerPolicy,
    /// Keep intermediate files after the job
    #[clap(long)]
    pub keep_intermediate: bool,
    /// More output per occurrence (-v, -vv)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn master_config(&self) -> MasterConfig {
        MasterConfig {
            scheduler: SchedulerConfig {
                rpc_timeout: self.timeout.map(Duration::from_secs),
                failed_worker_policy: self.failed_workers,
            },
            keep_intermediate: self.keep_intermediate,
        }
    }
}
