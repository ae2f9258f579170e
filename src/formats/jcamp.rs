//! JCAMP-DX reader.
//!
//! JCAMP-DX files carry `##TAG=value` header lines and one XYDATA block
//! per scan, each a stream of comma- or whitespace-separated X,Y pairs.
//! The per-scan retention time arrives either as `##PAGE= T=<seconds>`
//! (FileConverter Pro style) or as `##RETENTION_TIME= <seconds>`
//! (OpenChrom style); when both occur for one scan, the duplicate is
//! dropped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::info;

use crate::raw::{scan_from_pairs, RawData, Scan};

use super::FormatError;

/// Header tags that open an XYDATA block.
const XYDATA_TAGS: [&str; 4] = ["XYDATA", "DATA TABLE", "PEAK TABLE", "XYPOINTS"];

/// Reads a JCAMP-DX file into raw GC-MS data.
pub fn read_jcamp<P: AsRef<Path>>(path: P) -> Result<RawData, FormatError> {
    let path = path.as_ref();
    info!("reading JCAMP file '{}'", path.display());
    let reader = BufReader::new(File::open(path)?);

    let mut times: Vec<f64> = Vec::new();
    let mut scans: Vec<Scan> = Vec::new();
    let mut pending: Vec<f64> = Vec::new();
    let mut page_count = 0_usize;
    let mut xydata_count = 0_usize;

    let flush_scan = |pending: &mut Vec<f64>, scans: &mut Vec<Scan>| -> Result<(), FormatError> {
        if pending.len() % 2 == 1 {
            return Err(FormatError::OddPairCount {
                scan: scans.len(),
                count: pending.len(),
            });
        }
        scans.push(scan_from_pairs(pending, scans.len())?);
        pending.clear();
        Ok(())
    };

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("##") {
            let (tag, value) = match rest.split_once('=') {
                Some((tag, value)) => (tag.trim().to_uppercase(), value.trim()),
                None => (rest.trim().to_uppercase(), ""),
            };

            if tag.contains("PAGE") {
                if let Some(t) = value.strip_prefix("T=") {
                    times.push(parse_number(t, line_no)?);
                }
                page_count += 1;
            } else if tag.contains("RETENTION_TIME") {
                let time = parse_number(value, line_no)?;
                // PAGE and RETENTION_TIME may both name the same scan
                if times.last() != Some(&time) {
                    times.push(time);
                }
            } else if XYDATA_TAGS.iter().any(|t| tag == *t) {
                xydata_count += 1;
            }
            continue;
        }

        // numeric data line; a second block flushes the previous scan
        if page_count > 1 || xydata_count > 1 {
            flush_scan(&mut pending, &mut scans)?;
            page_count = page_count.min(1);
            xydata_count = xydata_count.min(1);
        }
        for item in trimmed.split(|c: char| c == ',' || c.is_whitespace()) {
            if item.is_empty() {
                continue;
            }
            pending.push(parse_number(item, line_no)?);
        }
    }

    // the final scan has no following block to flush it
    flush_scan(&mut pending, &mut scans)?;

    if times.len() != scans.len() {
        return Err(FormatError::CountMismatch {
            times: times.len(),
            scans: scans.len(),
        });
    }

    Ok(RawData::new(times, scans)?)
}

fn parse_number(text: &str, line_no: usize) -> Result<f64, FormatError> {
    text.trim()
        .parse()
        .map_err(|_| FormatError::InvalidNumber {
            line: line_no + 1,
            value: text.trim().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jdx");
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    const THREE_SCANS: &str = "\
##TITLE=test run
##JCAMP-DX=4.24
##DATA TYPE=MASS SPECTRUM
##PAGE= T=10.0
##XYDATA= (XY..XY)
50.0,100.0 51.0,200.0
##PAGE= T=11.0
##XYDATA= (XY..XY)
50.0,50.0
52.0,300.0
##PAGE= T=12.0
##XYDATA= (XY..XY)
51.0,150.0 52.0,250.0
##END=
";

    #[test]
    fn parses_pages_and_scans() {
        let (_dir, path) = write_file(THREE_SCANS);
        let data = read_jcamp(&path).unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data.times(), &[10.0, 11.0, 12.0]);
        assert_eq!(data.scans()[1].masses(), &[50.0, 52.0]);
        assert_eq!(data.scans()[1].intensities(), &[50.0, 300.0]);
        assert_eq!(data.min_mass(), 50.0);
        assert_eq!(data.max_mass(), 52.0);
    }

    #[test]
    fn retention_time_tags_are_deduplicated() {
        let content = "\
##TITLE=t
##PAGE= T=10.0
##RETENTION_TIME= 10.0
##XYDATA= (XY..XY)
50.0,1.0
##PAGE= T=11.0
##RETENTION_TIME= 11.0
##XYDATA= (XY..XY)
50.0,2.0
";
        let (_dir, path) = write_file(content);
        let data = read_jcamp(&path).unwrap();
        assert_eq!(data.times(), &[10.0, 11.0]);
    }

    #[test]
    fn odd_parity_is_an_error() {
        let content = "\
##TITLE=t
##PAGE= T=10.0
##XYDATA= (XY..XY)
50.0,1.0 51.0
";
        let (_dir, path) = write_file(content);
        assert!(matches!(
            read_jcamp(&path),
            Err(FormatError::OddPairCount { .. })
        ));
    }

    #[test]
    fn count_mismatch_is_an_error() {
        let content = "\
##TITLE=t
##PAGE= T=10.0
##XYDATA= (XY..XY)
50.0,1.0
##XYDATA= (XY..XY)
50.0,2.0
";
        let (_dir, path) = write_file(content);
        assert!(matches!(
            read_jcamp(&path),
            Err(FormatError::CountMismatch { times: 1, scans: 2 })
        ));
    }

    #[test]
    fn bad_numbers_are_reported_with_their_line() {
        let content = "\
##TITLE=t
##PAGE= T=10.0
##XYDATA= (XY..XY)
50.0,abc
";
        let (_dir, path) = write_file(content);
        assert!(matches!(
            read_jcamp(&path),
            Err(FormatError::InvalidNumber { line: 4, .. })
        ));
    }
}
