//! Resumable progress checkpoints for pairwise alignment.
//!
//! Each completed pair is appended as a line `i : j : similarity`. On
//! startup the file is read back and the recorded pairs are skipped, so a
//! multi-hour alignment interrupted half-way resumes where it stopped.
//! Blank and malformed lines are skipped with a warning.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::warn;

/// Reads previously completed `(i, j) -> similarity` records.
pub fn read_checkpoint<P: AsRef<Path>>(
    path: P,
) -> std::io::Result<HashMap<(usize, usize), f64>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut results = HashMap::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(':').map(str::trim).collect();
        let parsed = if fields.len() == 3 {
            match (
                fields[0].parse::<usize>(),
                fields[1].parse::<usize>(),
                fields[2].parse::<f64>(),
            ) {
                (Ok(i), Ok(j), Ok(sim)) => Some(((i, j), sim)),
                _ => None,
            }
        } else {
            None
        };

        match parsed {
            Some((pair, sim)) => {
                results.insert(pair, sim);
            }
            None => warn!(
                "ignoring malformed checkpoint line {}: {:?}",
                line_no + 1,
                line
            ),
        }
    }
    Ok(results)
}

/// Append-only writer for checkpoint records.
pub struct CheckpointWriter {
    out: BufWriter<File>,
}

impl CheckpointWriter {
    /// Opens (or creates) the checkpoint file for appending.
    pub fn append<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }

    /// Records one completed pair; flushed immediately so the record
    /// survives an unplanned termination.
    pub fn record(&mut self, i: usize, j: usize, similarity: f64) -> std::io::Result<()> {
        writeln!(self.out, "{i} : {j} : {similarity}")?;
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.txt");

        let mut writer = CheckpointWriter::append(&path).unwrap();
        writer.record(0, 1, 12.5).unwrap();
        writer.record(0, 2, -0.75).unwrap();
        drop(writer);

        let read = read_checkpoint(&path).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[&(0, 1)], 12.5);
        assert_eq!(read[&(0, 2)], -0.75);
    }

    #[test]
    fn appending_preserves_prior_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.txt");

        CheckpointWriter::append(&path)
            .unwrap()
            .record(1, 2, 3.0)
            .unwrap();
        CheckpointWriter::append(&path)
            .unwrap()
            .record(1, 3, 4.0)
            .unwrap();

        let read = read_checkpoint(&path).unwrap();
        assert_eq!(read.len(), 2);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pairs.txt");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "0 : 1 : 0.5").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "not a record").unwrap();
        writeln!(f, "2 : x : 0.5").unwrap();
        writeln!(f, "3 : 4 : 0.25 ").unwrap();

        let read = read_checkpoint(&path).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[&(3, 4)], 0.25);
    }
}
