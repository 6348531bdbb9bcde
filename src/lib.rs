//! A fault-tolerant MapReduce job runner.
//!
//! A master splits a job into one map task per input file and `n_reduce`
//! reduce tasks, hands them one at a time to workers that registered with it,
//! and retries any task whose worker failed on the next available worker.
//! Map and reduce tasks hand data to each other through deterministically
//! named files in a shared directory, so no state is shared between worker
//! processes beyond that directory.

use serde::{Deserialize, Serialize};

pub mod cmd;
pub mod job;
pub mod master;
pub mod registry;
pub mod rpc;
pub mod schedule;
pub mod standalone;
pub mod store;
pub mod task;
pub mod utils;
pub mod worker;
pub mod workload;

pub use job::Job;
pub use rpc::Phase;

/////////////////////////////////////////////////////////////////////////////
// MapReduce application types
/////////////////////////////////////////////////////////////////////////////

/// What a map function hands back to the task runner.
///
/// An `Err` from the call itself fails the task before any pair is routed.
/// Each item is a `Result` too, so a map function may produce its pairs
/// lazily and still fail partway through the document.
pub type MapOutput = anyhow::Result<Box<dyn Iterator<Item = anyhow::Result<KeyValue>>>>;

/// A map function takes a key-value pair whose key is the input file name
/// and whose value is the whole file contents.
///
/// It returns an iterator that yields intermediate key-value pairs.
pub type MapFn = fn(input: KeyValue) -> MapOutput;

/// A reduce function takes in a key and an iterator over every value
/// emitted for that key. It returns a single output value.
pub type ReduceFn =
    fn(key: &str, values: Box<dyn Iterator<Item = String> + '_>) -> anyhow::Result<String>;

/// A map reduce application.
#[derive(Copy, Clone)]
pub struct Workload {
    pub map_fn: MapFn,
    pub reduce_fn: ReduceFn,
}

/////////////////////////////////////////////////////////////////////////////
// Key-value pairs
/////////////////////////////////////////////////////////////////////////////

/// A single key-value pair.
///
/// On disk this is one JSON object per line with the fields `Key` and
/// `Value`.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
pub struct KeyValue {
    /// The key.
    #[serde(rename = "Key")]
    pub key: String,
    /// The value.
    #[serde(rename = "Value")]
    pub value: String,
}

impl KeyValue {
    /// Construct a new key-value pair from the given key and value.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Get the key of this key-value pair.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the value of this key-value pair.
    #[inline]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Consumes the key-value pair and returns the value.
    #[inline]
    pub fn into_value(self) -> String {
        self.value
    }
}

const FNV32_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;

/// Hashes an intermediate key with 32-bit FNV-1a. Compute a reduce bucket
/// for a given key by calculating `ihash(key) % n_reduce`.
///
/// Every process of a job must agree on this value. `fnv::FnvHasher` is
/// 64-bit only.
pub fn ihash(key: &str) -> u32 {
    key.bytes().fold(FNV32_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV32_PRIME)
    })
}
