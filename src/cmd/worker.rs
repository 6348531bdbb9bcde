use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Connect to a master at the given IP address and port
    #[clap(short, long)]
    pub join: String,
    /// Address to serve tasks on
    #[clap(short, long, default_value = "127.0.0.1:0")]
    pub listen: String,
    /// Address the master should use to reach this worker (default: the bound address)
    #[clap(short, long)]
    pub advertise: Option<String>,
    /// Name of the workload
    #[clap(short, long, default_value = "wc")]
    pub workload: String,
    /// Directory for intermediate and output files, shared with the master
    #[clap(short = 'd', long, default_value = ".")]
    pub work_dir: String,
    /// Refuse every task after this many (simulates a crash)
    #[clap(long)]
    pub fail_after: Option<u32>,
    /// More output per occurrence (-v, -vv)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
