//! Naming and record encoding for the files exchanged between tasks.
//!
//! Every file a job touches is named purely from the job name and task
//! indices, so map and reduce tasks running in different processes agree on
//! locations without talking to each other.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use uuid::Uuid;

use crate::KeyValue;

/// The directory holding a job's intermediate and output files.
#[derive(Clone, Debug)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file map task `map_index` writes for reduce task `reduce_index`.
    pub fn locate(&self, job_name: &str, map_index: u32, reduce_index: u32) -> PathBuf {
        self.dir
            .join(format!("mrtmp.{job_name}-{map_index}-{reduce_index}"))
    }

    /// The output file of reduce task `reduce_index`.
    pub fn locate_output(&self, job_name: &str, reduce_index: u32) -> PathBuf {
        self.dir.join(format!("mrtmp.{job_name}-res-{reduce_index}"))
    }

    /// The merged, sorted result of the whole job.
    pub fn locate_merged(&self, job_name: &str) -> PathBuf {
        self.dir.join(format!("mrtmp.{job_name}"))
    }

    /// Removes every intermediate file of a finished job. Files that are
    /// already gone are skipped.
    pub fn remove_intermediate(&self, job_name: &str, n_map: u32, n_reduce: u32) -> Result<()> {
        for map_index in 0..n_map {
            for reduce_index in 0..n_reduce {
                let path = self.locate(job_name, map_index, reduce_index);
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(e).with_context(|| format!("removing {}", path.display()))
                    }
                }
            }
        }
        Ok(())
    }
}

/// Appends JSON-line records to a private file of this attempt and moves it
/// onto its final name in [`finish`](Self::finish).
///
/// Two attempts at the same task never share an inode: whichever finishes
/// last replaces the file whole. The scratch file is removed if the writer
/// is dropped unfinished or the rename fails.
pub struct RecordWriter {
    path: PathBuf,
    scratch: PathBuf,
    out: Option<BufWriter<File>>,
}

impl RecordWriter {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let name = path
            .file_name()
            .with_context(|| format!("no file name in {}", path.display()))?
            .to_string_lossy();
        let scratch = path.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4()));
        let file =
            File::create(&scratch).with_context(|| format!("creating {}", scratch.display()))?;
        Ok(Self {
            path,
            scratch,
            out: Some(BufWriter::new(file)),
        })
    }

    pub fn append(&mut self, kv: &KeyValue) -> Result<()> {
        let Some(out) = self.out.as_mut() else {
            bail!("{} already finished", self.path.display());
        };
        serde_json::to_writer(&mut *out, kv)
            .with_context(|| format!("writing record to {}", self.scratch.display()))?;
        out.write_all(b"\n")
            .with_context(|| format!("writing record to {}", self.scratch.display()))
    }

    /// Flushes buffered records, closes the file and renames it onto its
    /// final path, replacing whatever an earlier attempt left there.
    pub fn finish(mut self) -> Result<()> {
        if let Some(out) = self.out.take() {
            let file = out
                .into_inner()
                .map_err(|e| e.into_error())
                .with_context(|| format!("flushing {}", self.scratch.display()))?;
            drop(file);
        }
        fs::rename(&self.scratch, &self.path).with_context(|| {
            format!("moving {} to {}", self.scratch.display(), self.path.display())
        })
    }
}

impl Drop for RecordWriter {
    fn drop(&mut self) {
        // Already gone after a successful rename.
        let _ = fs::remove_file(&self.scratch);
    }
}

/// Reads every record of a file written by [`RecordWriter`].
///
/// Hitting end of input in the middle of a record ends the read like a clean
/// end of file does; any other decode error is returned.
pub fn read_records(path: &Path) -> Result<Vec<KeyValue>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let stream = serde_json::Deserializer::from_reader(BufReader::new(file)).into_iter::<KeyValue>();

    let mut records = Vec::new();
    for record in stream {
        match record {
            Ok(kv) => records.push(kv),
            Err(e) if e.is_eof() => break,
            Err(e) => return Err(e).with_context(|| format!("decoding {}", path.display())),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn naming_is_deterministic() {
        let store = Store::new("/tmp/jobs");
        assert_eq!(store.locate("wc", 3, 1), store.locate("wc", 3, 1));
        assert_eq!(store.locate("wc", 3, 1), PathBuf::from("/tmp/jobs/mrtmp.wc-3-1"));
        assert_eq!(store.locate_output("wc", 2), PathBuf::from("/tmp/jobs/mrtmp.wc-res-2"));
        assert_eq!(store.locate_merged("wc"), PathBuf::from("/tmp/jobs/mrtmp.wc"));
    }

    #[test]
    fn naming_is_collision_free() {
        let store = Store::new(".");
        let mut seen = HashSet::new();
        for map_index in 0..12 {
            for reduce_index in 0..12 {
                assert!(seen.insert(store.locate("job", map_index, reduce_index)));
            }
        }
        for reduce_index in 0..12 {
            assert!(seen.insert(store.locate_output("job", reduce_index)));
        }
        assert!(seen.insert(store.locate_merged("job")));
    }

    #[test]
    fn records_are_read_back_in_write_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records");

        let mut writer = RecordWriter::create(&path).unwrap();
        writer.append(&KeyValue::new("b", "1")).unwrap();
        writer.append(&KeyValue::new("a", "line\nbreak")).unwrap();
        writer.append(&KeyValue::new("b", "2")).unwrap();
        writer.finish().unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(
            records,
            vec![
                KeyValue::new("b", "1"),
                KeyValue::new("a", "line\nbreak"),
                KeyValue::new("b", "2"),
            ]
        );
    }

    #[test]
    fn truncated_trailing_record_ends_the_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records");
        fs::write(&path, "{\"Key\":\"a\",\"Value\":\"1\"}\n{\"Key\":\"b\",\"Val").unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records, vec![KeyValue::new("a", "1")]);
    }

    #[test]
    fn garbage_in_the_middle_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records");
        fs::write(&path, "{\"Key\":\"a\",\"Value\":\"1\"}\nnot json\n").unwrap();

        assert!(read_records(&path).is_err());
    }

    #[test]
    fn create_truncates_a_previous_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records");
        fs::write(&path, "{\"Key\":\"stale\",\"Value\":\"1\"}\n").unwrap();

        RecordWriter::create(&path).unwrap().finish().unwrap();
        assert!(read_records(&path).unwrap().is_empty());
    }

    #[test]
    fn overlapping_attempts_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records");

        let mut slow = RecordWriter::create(&path).unwrap();
        for i in 0..100 {
            slow.append(&KeyValue::new(format!("slow{i}"), "1")).unwrap();
        }
        let mut fast = RecordWriter::create(&path).unwrap();
        for i in 0..100 {
            fast.append(&KeyValue::new(format!("fast{i}"), "1")).unwrap();
        }
        fast.finish().unwrap();
        assert!(read_records(&path).unwrap().iter().all(|kv| kv.key.starts_with("fast")));

        for i in 100..200 {
            slow.append(&KeyValue::new(format!("slow{i}"), "1")).unwrap();
        }
        slow.finish().unwrap();

        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 200);
        assert!(records.iter().all(|kv| kv.key.starts_with("slow")));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn unfinished_writer_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records");

        let mut writer = RecordWriter::create(&path).unwrap();
        writer.append(&KeyValue::new("a", "1")).unwrap();
        drop(writer);

        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn remove_intermediate_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path());
        RecordWriter::create(store.locate("j", 0, 0)).unwrap().finish().unwrap();
        RecordWriter::create(store.locate("j", 1, 1)).unwrap().finish().unwrap();

        store.remove_intermediate("j", 2, 2).unwrap();
        assert!(!store.locate("j", 0, 0).exists());
        assert!(!store.locate("j", 1, 1).exists());
    }
}
