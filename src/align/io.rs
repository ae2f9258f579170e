//! CSV output for alignments.
//!
//! Two tables per alignment: retention times and areas. Columns are the
//! experiment codes, rows the aligned positions; each row leads with the
//! composite peak's UID and the average retention time. Missing cells are
//! written as `NA`.

use std::path::Path;

use csv::Writer;

use crate::peak::Peak;

use super::composite::composite_peak;
use super::{Alignment, AlignError};

/// Value written for an empty alignment cell.
const NA: &str = "NA";

fn format_rt(rt: f64, minutes: bool) -> String {
    if minutes {
        format!("{:.3}", rt / 60.0)
    } else {
        format!("{rt:.3}")
    }
}

fn header(alignment: &Alignment, extra: Option<&str>) -> Vec<String> {
    let mut row = vec!["UID".to_string(), "RTavg".to_string()];
    if let Some(extra) = extra {
        row.push(extra.to_string());
    }
    row.extend(alignment.expr_codes().iter().cloned());
    row
}

/// Writes the retention-time and area tables for an alignment.
///
/// `minutes` selects minutes instead of seconds for all retention times.
pub fn write_csv<P: AsRef<Path>, Q: AsRef<Path>>(
    alignment: &Alignment,
    rt_path: P,
    area_path: Q,
    minutes: bool,
) -> Result<(), AlignError> {
    let mut rt_out = Writer::from_path(rt_path.as_ref())?;
    let mut area_out = Writer::from_path(area_path.as_ref())?;

    rt_out.write_record(header(alignment, None))?;
    area_out.write_record(header(alignment, None))?;

    for position in alignment.positions() {
        let contributing: Vec<&Peak> = position.iter().flatten().collect();
        let compo = match composite_peak(&contributing, false) {
            Some(compo) => compo,
            None => continue,
        };

        let mut rt_row = vec![compo.uid().to_string(), format_rt(compo.rt(), minutes)];
        let mut area_row = rt_row.clone();
        for cell in position {
            match cell {
                Some(peak) => {
                    rt_row.push(format_rt(peak.rt(), minutes));
                    area_row.push(match peak.area() {
                        Some(area) => format!("{area:.0}"),
                        None => NA.to_string(),
                    });
                }
                None => {
                    rt_row.push(NA.to_string());
                    area_row.push(NA.to_string());
                }
            }
        }
        rt_out.write_record(&rt_row)?;
        area_out.write_record(&area_row)?;
    }

    rt_out.flush()?;
    area_out.flush()?;
    Ok(())
}

/// Writes the per-position common-ion area table.
///
/// Each row reports the quantifier ion chosen for the position and, per
/// experiment, the area of that ion under the experiment's peak.
pub fn write_common_ion_csv<P: AsRef<Path>>(
    alignment: &Alignment,
    path: P,
    minutes: bool,
) -> Result<(), AlignError> {
    let mut out = Writer::from_path(path.as_ref())?;
    out.write_record(header(alignment, Some("Quant Ion")))?;

    let common_ions = alignment.common_ion();
    for (position, common_ion) in alignment.positions().iter().zip(common_ions) {
        let contributing: Vec<&Peak> = position.iter().flatten().collect();
        let compo = match composite_peak(&contributing, false) {
            Some(compo) => compo,
            None => continue,
        };

        let ion_label = match common_ion {
            Some(mass) => format!("{mass}"),
            None => NA.to_string(),
        };
        let mut row = vec![
            compo.uid().to_string(),
            format_rt(compo.rt(), minutes),
            ion_label,
        ];
        for cell in position {
            let value = cell
                .as_ref()
                .zip(common_ion)
                .and_then(|(peak, mass)| peak.ion_area(mass))
                .map(|area| format!("{area:.0}"));
            row.push(value.unwrap_or_else(|| NA.to_string()));
        }
        out.write_record(&row)?;
    }

    out.flush()?;
    Ok(())
}
