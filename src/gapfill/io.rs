//! CSV surfaces for gap filling.
//!
//! The input is the common-ion area table written by
//! [`write_common_ion_csv`](crate::align::io::write_common_ion_csv):
//! columns `UID, RTavg, Quant Ion, <sample codes...>`. `NA` cells become
//! [`MissingPeak`]s; after the finder runs, the filled tables are written
//! back with the recovered values.

use std::path::Path;

use csv::{Reader, StringRecord, Writer};

use super::{GapFillError, MissingPeak, Sample};

/// Value marking an empty cell.
const NA: &str = "NA";

fn column_index(headers: &StringRecord, name: &str) -> Result<usize, GapFillError> {
    headers
        .iter()
        .position(|h| h.trim().trim_matches('"') == name)
        .ok_or_else(|| GapFillError::MissingColumn(name.to_string()))
}

/// Parses the qualifier ions and retention time out of a peak UID.
///
/// UIDs have the form `m1-m2-ratio-rt` (or bare `rt` for peaks without a
/// spectrum, which cannot seed a missing-peak search).
fn parse_uid(uid: &str) -> Result<(f64, f64, f64), GapFillError> {
    let fields: Vec<&str> = uid.split('-').collect();
    if fields.len() != 4 {
        return Err(GapFillError::MalformedUid(uid.to_string()));
    }
    let qual1: f64 = fields[0]
        .parse()
        .map_err(|_| GapFillError::MalformedUid(uid.to_string()))?;
    let qual2: f64 = fields[1]
        .parse()
        .map_err(|_| GapFillError::MalformedUid(uid.to_string()))?;
    let rt: f64 = fields[3]
        .parse()
        .map_err(|_| GapFillError::MalformedUid(uid.to_string()))?;
    Ok((qual1, qual2, rt))
}

/// Finds the `NA` cells of a common-ion area table.
///
/// Returns one [`Sample`] per experiment column, each carrying its missing
/// peaks. Rows whose UID carries no spectrum information are skipped.
pub fn mp_finder<P: AsRef<Path>>(path: P) -> Result<Vec<Sample>, GapFillError> {
    let mut reader = Reader::from_path(path.as_ref())?;
    let headers = reader.headers()?.clone();

    let uid_col = column_index(&headers, "UID")?;
    let ci_col = column_index(&headers, "Quant Ion")?;

    let mut samples: Vec<Sample> = headers
        .iter()
        .enumerate()
        .skip(ci_col + 1)
        .map(|(col, name)| Sample::new(name.trim_matches('"'), col))
        .collect();

    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let uid = record.get(uid_col).unwrap_or_default();
        let common_ion: f64 = match record.get(ci_col).map(str::trim) {
            Some(value) if value != NA && !value.is_empty() => value
                .parse()
                .map_err(|_| GapFillError::MalformedUid(value.to_string()))?,
            _ => continue,
        };
        let (qual1, qual2, rt) = match parse_uid(uid) {
            Ok(parsed) => parsed,
            Err(_) => continue,
        };

        for sample in &mut samples {
            if record.get(sample.column).map(str::trim) == Some(NA) {
                sample.add_missing_peak(MissingPeak::new(common_ion, qual1, qual2, rt, row));
            }
        }
    }
    Ok(samples)
}

fn rewrite_table<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    samples: &[Sample],
    cell: impl Fn(&MissingPeak) -> Option<String>,
) -> Result<(), GapFillError> {
    let mut reader = Reader::from_path(input.as_ref())?;
    let mut writer = Writer::from_path(output.as_ref())?;
    writer.write_record(reader.headers()?)?;

    let mut rows: Vec<StringRecord> = Vec::new();
    for record in reader.records() {
        rows.push(record?);
    }

    let mut table: Vec<Vec<String>> = rows
        .iter()
        .map(|record| record.iter().map(str::to_string).collect())
        .collect();
    for sample in samples {
        for mp in sample.missing_peaks() {
            if let Some(value) = cell(mp) {
                if let Some(slot) = table
                    .get_mut(mp.row())
                    .and_then(|row| row.get_mut(sample.column()))
                {
                    *slot = value;
                }
            }
        }
    }

    for row in table {
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Rewrites the area table with recovered areas in place of `NA`.
pub fn write_filled_csv<P: AsRef<Path>, Q: AsRef<Path>>(
    samples: &[Sample],
    area_file: P,
    filled_area_file: Q,
) -> Result<(), GapFillError> {
    rewrite_table(area_file, filled_area_file, samples, |mp| {
        mp.common_ion_area().map(|area| format!("{area:.0}"))
    })
}

/// Rewrites the retention-time table with recovered RTs in place of `NA`.
pub fn write_filled_rt_csv<P: AsRef<Path>, Q: AsRef<Path>>(
    samples: &[Sample],
    rt_file: P,
    filled_rt_file: Q,
    minutes: bool,
) -> Result<(), GapFillError> {
    rewrite_table(rt_file, filled_rt_file, samples, |mp| {
        mp.exact_rt().map(|rt| {
            if minutes {
                format!("{:.3}", rt / 60.0)
            } else {
                format!("{rt:.3}")
            }
        })
    })
}
