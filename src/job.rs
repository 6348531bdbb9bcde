use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use glob::glob;
use tracing::info;

use crate::store::{read_records, Store};

/// A MapReduce job: one map task per input file and `n_reduce` reduce tasks.
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub input_files: Vec<PathBuf>,
    pub n_reduce: u32,
}

impl Job {
    pub fn new(name: impl Into<String>, input_files: Vec<PathBuf>, n_reduce: u32) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.contains(std::path::is_separator) {
            bail!("invalid job name {name:?}");
        }
        if n_reduce == 0 {
            bail!("a job needs at least one reduce task");
        }
        Ok(Self {
            name,
            input_files,
            n_reduce,
        })
    }

    /// Builds a job whose inputs are every file matched by `patterns`, in
    /// the order the patterns are given.
    pub fn from_globs(name: impl Into<String>, patterns: &[String], n_reduce: u32) -> Result<Self> {
        let mut input_files = Vec::new();
        for pattern in patterns {
            let before = input_files.len();
            for entry in glob(pattern).with_context(|| format!("bad input pattern {pattern:?}"))? {
                let path = entry?;
                if path.is_file() {
                    input_files.push(path);
                }
            }
            if input_files.len() == before {
                bail!("no input files match {pattern:?}");
            }
        }
        Self::new(name, input_files, n_reduce)
    }

    pub fn n_map(&self) -> u32 {
        self.input_files.len() as u32
    }
}

/// Combines the reduce outputs of a finished job into one file of
/// `key: value` lines sorted by key.
pub fn merge(store: &Store, job: &Job) -> Result<PathBuf> {
    let mut merged = BTreeMap::new();
    for reduce_index in 0..job.n_reduce {
        let path = store.locate_output(&job.name, reduce_index);
        for kv in read_records(&path)? {
            merged.insert(kv.key, kv.value);
        }
    }

    let out_path = store.locate_merged(&job.name);
    let file = File::create(&out_path).with_context(|| format!("creating {}", out_path.display()))?;
    let mut out = BufWriter::new(file);
    for (key, value) in &merged {
        writeln!(out, "{key}: {value}")?;
    }
    out.flush()?;

    info!(job = %job.name, keys = merged.len(), output = %out_path.display(), "merged reduce outputs");
    Ok(out_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordWriter;
    use crate::KeyValue;
    use std::fs;

    #[test]
    fn rejects_zero_reducers_and_path_like_names() {
        assert!(Job::new("wc", vec![], 0).is_err());
        assert!(Job::new("a/b", vec![], 1).is_err());
        assert!(Job::new("", vec![], 1).is_err());
        assert_eq!(Job::new("wc", vec!["x".into(), "y".into()], 2).unwrap().n_map(), 2);
    }

    #[test]
    fn from_globs_expands_patterns() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("c.md"), "c").unwrap();

        let pattern = format!("{}/*.txt", dir.path().display());
        let job = Job::from_globs("wc", &[pattern], 3).unwrap();
        assert_eq!(
            job.input_files,
            vec![dir.path().join("a.txt"), dir.path().join("b.txt")]
        );

        let missing = format!("{}/*.csv", dir.path().display());
        assert!(Job::from_globs("wc", &[missing], 3).is_err());
    }

    #[test]
    fn merge_sorts_across_reduce_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let job = Job::new("m", vec![], 2).unwrap();

        let mut first = RecordWriter::create(store.locate_output("m", 0)).unwrap();
        first.append(&KeyValue::new("b", "2")).unwrap();
        first.append(&KeyValue::new("d", "4")).unwrap();
        first.finish().unwrap();
        let mut second = RecordWriter::create(store.locate_output("m", 1)).unwrap();
        second.append(&KeyValue::new("a", "1")).unwrap();
        second.append(&KeyValue::new("c", "3")).unwrap();
        second.finish().unwrap();

        let path = merge(&store, &job).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "a: 1\nb: 2\nc: 3\nd: 4\n");
    }
}
