//! Messages and generated gRPC plumbing for the `mapreduce.Master` and
//! `mapreduce.Worker` services.

use std::fmt;

include!(concat!(env!("OUT_DIR"), "/mapreduce.Master.rs"));
include!(concat!(env!("OUT_DIR"), "/mapreduce.Worker.rs"));

/// Which half of a job a task belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Phase {
    Map = 0,
    Reduce = 1,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Map => write!(f, "map"),
            Phase::Reduce => write!(f, "reduce"),
        }
    }
}

/// Instructs a worker to run one map or reduce task.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RunTaskArgs {
    #[prost(string, tag = "1")]
    pub job_name: String,
    /// Input shard for map tasks; empty for reduce tasks.
    #[prost(string, tag = "2")]
    pub input_file: String,
    #[prost(enumeration = "Phase", tag = "3")]
    pub phase: i32,
    #[prost(uint32, tag = "4")]
    pub task_index: u32,
    /// Task count of the other phase: `n_reduce` for a map task, the number
    /// of map tasks for a reduce task.
    #[prost(uint32, tag = "5")]
    pub n_other: u32,
}

/// Announces a worker's RPC address to the master.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RegisterArgs {
    #[prost(string, tag = "1")]
    pub worker_address: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Ack {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ShutdownArgs {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ShutdownReply {
    /// Number of tasks the worker ran successfully.
    #[prost(uint32, tag = "1")]
    pub ntasks: u32,
}

impl RunTaskArgs {
    pub fn new(job_name: &str, input_file: &str, phase: Phase, task_index: u32, n_other: u32) -> Self {
        Self {
            job_name: job_name.to_string(),
            input_file: input_file.to_string(),
            phase: phase.into(),
            task_index,
            n_other,
        }
    }
}
