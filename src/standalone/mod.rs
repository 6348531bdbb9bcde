use clap::Parser;

pub mod engine;

/// Runs a whole job in this process, without workers or RPC.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Glob specs for the input files, one map task per matched file
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// Name of the workload
    #[arg(short, long, default_value = "wc")]
    pub workload: String,

    /// Job name, used to name every intermediate and output file
    #[arg(short, long, default_value = "wcnt_seq")]
    pub job_name: String,

    /// Number of reduce tasks
    #[arg(short, long, default_value_t = 3)]
    pub n_reduce: u32,

    /// Directory for intermediate and output files
    #[arg(short = 'd', long, default_value = ".")]
    pub work_dir: String,

    /// Keep intermediate files after the job
    #[arg(long)]
    pub keep_intermediate: bool,

    /// More output per occurrence (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
