//! CSV latency reports.
//!
//! Reports live in a single directory and are numbered by how many entries
//! that directory already held, e.g. `files/tangle-hornet-reading-time_3.csv`.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::SamplerError;
use crate::sampler::SampleStore;

pub const REPORT_PREFIX: &str = "tangle-hornet-reading-time_";
pub const REPORT_EXTENSION: &str = "csv";
pub const REPORT_HEADER: [&str; 2] = ["Índice", "Tempo de consulta (s)"];

/// Picks report paths and writes reports into one directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Open the next report file in sequence and write its header.
    ///
    /// Creates the directory if needed. The file is created exclusively, so
    /// if the counted name is taken the index moves forward until it is not.
    pub fn create(&self) -> Result<ReportFile, SamplerError> {
        fs::create_dir_all(&self.dir).map_err(|e| SamplerError::io(&self.dir, e))?;

        let mut index = fs::read_dir(&self.dir)
            .map_err(|e| SamplerError::io(&self.dir, e))?
            .count();

        loop {
            let path = self.report_path(index);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return ReportFile::start(path, file),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => index += 1,
                Err(e) => return Err(SamplerError::io(path, e)),
            }
        }
    }

    /// Write every sample in the store as one report.
    ///
    /// The store must be quiescent; rows are numbered from 1 in whatever
    /// order the map yields them.
    pub fn write(&self, store: &SampleStore) -> Result<PathBuf, SamplerError> {
        let mut report = self.create()?;
        for sample in store.samples() {
            report.append(sample.latency_seconds())?;
        }
        let (path, rows) = report.finish()?;
        tracing::info!("Wrote {} samples to {}", rows, path.display());
        Ok(path)
    }

    fn report_path(&self, index: usize) -> PathBuf {
        self.dir
            .join(format!("{}{}.{}", REPORT_PREFIX, index, REPORT_EXTENSION))
    }
}

/// An open report. Row indices are local to this file.
pub struct ReportFile {
    path: PathBuf,
    out: BufWriter<File>,
    rows: usize,
}

impl ReportFile {
    fn start(path: PathBuf, file: File) -> Result<Self, SamplerError> {
        let mut report = Self {
            path,
            out: BufWriter::new(file),
            rows: 0,
        };
        let header = REPORT_HEADER.join(",");
        writeln!(report.out, "{}", header).map_err(|e| SamplerError::io(&report.path, e))?;
        Ok(report)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one latency row and return its 1-based index.
    pub fn append(&mut self, latency_seconds: f64) -> Result<usize, SamplerError> {
        self.rows += 1;
        writeln!(self.out, "{},{}", self.rows, format_seconds(latency_seconds))
            .map_err(|e| SamplerError::io(&self.path, e))?;
        Ok(self.rows)
    }

    pub fn flush(&mut self) -> Result<(), SamplerError> {
        self.out.flush().map_err(|e| SamplerError::io(&self.path, e))
    }

    /// Flush everything to disk and return the path and row count.
    pub fn finish(mut self) -> Result<(PathBuf, usize), SamplerError> {
        self.flush()?;
        self.out
            .get_ref()
            .sync_all()
            .map_err(|e| SamplerError::io(&self.path, e))?;
        Ok((self.path, self.rows))
    }
}

/// Shortest decimal that round-trips, never in exponent form.
pub fn format_seconds(seconds: f64) -> String {
    format!("{}", seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::Sample;
    use chrono::{DateTime, TimeDelta};
    use tempfile::TempDir;

    fn sample(id: &str, latency_millis: i64) -> Sample {
        let start_time = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        Sample {
            id: id.to_string(),
            start_time,
            receive_time: start_time + TimeDelta::milliseconds(latency_millis),
        }
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(1.5), "1.5");
        assert_eq!(format_seconds(2.0), "2");
        assert_eq!(format_seconds(0.000001), "0.000001");
        assert_eq!(format_seconds(-0.25), "-0.25");
        assert_eq!(format_seconds(0.1 + 0.2), "0.30000000000000004");
    }

    #[test]
    fn test_write_creates_directory_and_header() {
        let tmp = TempDir::new().unwrap();
        let writer = ReportWriter::new(tmp.path().join("files"));
        let store = SampleStore::new();
        store.insert_if_absent(sample("a", 1500));

        let path = writer.write(&store).unwrap();

        assert_eq!(path, tmp.path().join("files/tangle-hornet-reading-time_0.csv"));
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "Índice,Tempo de consulta (s)\n1,1.5\n");
    }

    #[test]
    fn test_rows_are_indexed_from_one_per_file() {
        let tmp = TempDir::new().unwrap();
        let writer = ReportWriter::new(tmp.path());
        let store = SampleStore::new();
        store.insert_if_absent(sample("a", 100));
        store.insert_if_absent(sample("b", 200));
        store.insert_if_absent(sample("c", 300));

        let first = writer.write(&store).unwrap();
        let second = writer.write(&store).unwrap();

        for path in [&first, &second] {
            let contents = fs::read_to_string(path).unwrap();
            let indices: Vec<&str> = contents
                .lines()
                .skip(1)
                .map(|line| line.split(',').next().unwrap())
                .collect();
            assert_eq!(indices, vec!["1", "2", "3"]);

            let mut latencies: Vec<&str> = contents
                .lines()
                .skip(1)
                .map(|line| line.split(',').nth(1).unwrap())
                .collect();
            latencies.sort();
            assert_eq!(latencies, vec!["0.1", "0.2", "0.3"]);
        }
    }

    #[test]
    fn test_next_index_counts_directory_entries() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        fs::write(tmp.path().join("other.csv"), "x").unwrap();
        let writer = ReportWriter::new(tmp.path());

        let path = writer.write(&SampleStore::new()).unwrap();

        assert_eq!(path.file_name().unwrap(), "tangle-hornet-reading-time_2.csv");
    }

    #[test]
    fn test_never_overwrites_existing_report() {
        let tmp = TempDir::new().unwrap();
        // One entry, but it already uses the name index 1 would get.
        let taken = tmp.path().join("tangle-hornet-reading-time_1.csv");
        fs::write(&taken, "keep me").unwrap();
        let writer = ReportWriter::new(tmp.path());

        let path = writer.write(&SampleStore::new()).unwrap();

        assert_eq!(path.file_name().unwrap(), "tangle-hornet-reading-time_2.csv");
        assert_eq!(fs::read_to_string(&taken).unwrap(), "keep me");
    }

    #[test]
    fn test_incremental_report_file() {
        let tmp = TempDir::new().unwrap();
        let mut report = ReportWriter::new(tmp.path()).create().unwrap();

        assert_eq!(report.append(0.5).unwrap(), 1);
        assert_eq!(report.append(0.75).unwrap(), 2);
        report.flush().unwrap();
        let (path, rows) = report.finish().unwrap();

        assert_eq!(rows, 2);
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "Índice,Tempo de consulta (s)\n1,0.5\n2,0.75\n"
        );
    }
}
