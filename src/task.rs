//! Map and reduce task runners.
//!
//! Both runners are plain functions over explicit inputs so the sequential
//! engine and the RPC worker execute exactly the same code.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use fnv::FnvHashMap;
use itertools::Itertools;
use tracing::debug;

use crate::store::{read_records, RecordWriter, Store};
use crate::{ihash, KeyValue, MapFn, ReduceFn};

/// Runs map task `map_index` over `input_file`, partitioning its output into
/// `n_reduce` intermediate files.
///
/// All `n_reduce` files are created before the map function runs, so every
/// bucket file exists afterwards even if nothing was emitted into it.
pub fn run_map_task(
    store: &Store,
    job_name: &str,
    map_index: u32,
    input_file: &Path,
    n_reduce: u32,
    map_fn: MapFn,
) -> Result<()> {
    anyhow::ensure!(n_reduce > 0, "map task needs at least one reduce bucket");

    let bytes =
        fs::read(input_file).with_context(|| format!("reading input {}", input_file.display()))?;
    // Invalid UTF-8 becomes U+FFFD instead of failing the task.
    let contents = String::from_utf8_lossy(&bytes).into_owned();

    let mut buckets = (0..n_reduce)
        .map(|reduce_index| RecordWriter::create(store.locate(job_name, map_index, reduce_index)))
        .collect::<Result<Vec<_>>>()?;

    let filename = input_file.to_string_lossy().into_owned();
    let mut emitted = 0usize;
    for item in map_fn(KeyValue::new(filename, contents))? {
        let kv = item?;
        let bucket_no = ihash(&kv.key) % n_reduce;
        buckets[bucket_no as usize].append(&kv)?;
        emitted += 1;
    }

    for bucket in buckets {
        bucket.finish()?;
    }
    debug!(job = job_name, map_index, emitted, "map task finished");
    Ok(())
}

/// Runs reduce task `reduce_index`, reading the bucket's file from each of
/// the `n_map` map tasks and writing one record per distinct key, sorted by
/// key.
pub fn run_reduce_task(
    store: &Store,
    job_name: &str,
    reduce_index: u32,
    n_map: u32,
    reduce_fn: ReduceFn,
) -> Result<()> {
    // Values keep the order they were read in, duplicates included.
    let mut grouped: FnvHashMap<String, Vec<String>> = FnvHashMap::default();
    for map_index in 0..n_map {
        let path = store.locate(job_name, map_index, reduce_index);
        for KeyValue { key, value } in read_records(&path)? {
            grouped.entry(key).or_default().push(value);
        }
    }

    let out_path = store.locate_output(job_name, reduce_index);
    let mut out = RecordWriter::create(&out_path)?;
    let n_keys = grouped.len();
    for (key, values) in grouped.into_iter().sorted_unstable_by(|a, b| a.0.cmp(&b.0)) {
        let value = reduce_fn(&key, Box::new(values.into_iter()))
            .with_context(|| format!("reducing key {key:?}"))?;
        out.append(&KeyValue { key, value })?;
    }
    out.finish()?;

    debug!(job = job_name, reduce_index, keys = n_keys, "reduce task finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload;
    use std::collections::BTreeMap;

    fn write_input(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn map_creates_every_bucket_and_routes_by_hash() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let wc = workload::named("wc").unwrap();
        let input = write_input(dir.path(), "a.txt", "the cat sat on the mat with a hat");

        run_map_task(&store, "j", 0, &input, 3, wc.map_fn).unwrap();

        let mut total = 0;
        for reduce_index in 0..3 {
            let records = read_records(&store.locate("j", 0, reduce_index)).unwrap();
            for kv in &records {
                assert_eq!(ihash(&kv.key) % 3, reduce_index);
            }
            total += records.len();
        }
        // one pair per distinct word
        assert_eq!(total, 8);
    }

    #[test]
    fn empty_input_still_creates_all_bucket_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let wc = workload::named("wc").unwrap();
        let input = write_input(dir.path(), "empty.txt", "");

        run_map_task(&store, "j", 0, &input, 4, wc.map_fn).unwrap();

        for reduce_index in 0..4 {
            let path = store.locate("j", 0, reduce_index);
            assert!(path.exists());
            assert!(read_records(&path).unwrap().is_empty());
        }
    }

    #[test]
    fn map_accepts_input_that_is_not_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let wc = workload::named("wc").unwrap();
        let input = dir.path().join("latin1.txt");
        fs::write(&input, b"caf\xe9 the cat").unwrap();

        run_map_task(&store, "j", 0, &input, 1, wc.map_fn).unwrap();

        let records = read_records(&store.locate("j", 0, 0)).unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().any(|kv| kv.key == "caf\u{fffd}"));
    }

    #[test]
    fn map_fails_on_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let wc = workload::named("wc").unwrap();

        let err = run_map_task(&store, "j", 0, &dir.path().join("nope"), 2, wc.map_fn);
        assert!(err.is_err());
    }

    #[test]
    fn reduce_groups_and_sorts_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());

        let mut first = RecordWriter::create(store.locate("j", 0, 0)).unwrap();
        first.append(&KeyValue::new("zebra", "1")).unwrap();
        first.append(&KeyValue::new("apple", "2")).unwrap();
        first.finish().unwrap();
        let mut second = RecordWriter::create(store.locate("j", 1, 0)).unwrap();
        second.append(&KeyValue::new("apple", "3")).unwrap();
        second.append(&KeyValue::new("mango", "1")).unwrap();
        second.append(&KeyValue::new("apple", "3")).unwrap();
        second.finish().unwrap();

        fn concat(_key: &str, values: Box<dyn Iterator<Item = String> + '_>) -> Result<String> {
            Ok(values.collect::<Vec<_>>().join("+"))
        }
        run_reduce_task(&store, "j", 0, 2, concat).unwrap();

        let out = read_records(&store.locate_output("j", 0)).unwrap();
        assert_eq!(
            out,
            vec![
                KeyValue::new("apple", "2+3+3"),
                KeyValue::new("mango", "1"),
                KeyValue::new("zebra", "1"),
            ]
        );
    }

    #[test]
    fn reduce_fails_when_a_map_output_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        RecordWriter::create(store.locate("j", 0, 0)).unwrap().finish().unwrap();
        let wc = workload::named("wc").unwrap();

        assert!(run_reduce_task(&store, "j", 0, 2, wc.reduce_fn).is_err());
    }

    #[test]
    fn map_then_reduce_counts_words() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        let wc = workload::named("wc").unwrap();
        let inputs = [
            write_input(dir.path(), "a.txt", "the cat sat"),
            write_input(dir.path(), "b.txt", "the dog sat"),
        ];

        for (i, input) in inputs.iter().enumerate() {
            run_map_task(&store, "wc", i as u32, input, 2, wc.map_fn).unwrap();
        }
        let mut counts = BTreeMap::new();
        for reduce_index in 0..2 {
            run_reduce_task(&store, "wc", reduce_index, 2, wc.reduce_fn).unwrap();
            let out = read_records(&store.locate_output("wc", reduce_index)).unwrap();
            assert!(out.windows(2).all(|w| w[0].key < w[1].key));
            counts.extend(out.into_iter().map(|kv| (kv.key, kv.value)));
        }

        let expected: BTreeMap<String, String> = [("cat", "1"), ("dog", "1"), ("sat", "2"), ("the", "2")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(counts, expected);
    }
}
