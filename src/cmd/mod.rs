//! Command line arguments of the master and worker binaries.

pub mod master;
pub mod worker;
