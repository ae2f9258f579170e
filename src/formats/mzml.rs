//! mzML reader.
//!
//! Streams the XML with `quick-xml` and decodes the per-spectrum
//! `<binaryDataArray>` payloads: base64 text, optionally zlib-compressed,
//! holding little-endian 32- or 64-bit floats. Scan start times arrive as
//! CV parameter `MS:1000016`; values in minutes are converted to seconds.
//! Spectra without a scan time are skipped with a warning.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use base64::prelude::*;
use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::ZlibDecoder;
use log::{info, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::raw::{RawData, Scan};

use super::FormatError;

/// CV accession for scan start time.
const CV_SCAN_START_TIME: &str = "MS:1000016";
/// CV accession for the m/z array.
const CV_MZ_ARRAY: &str = "MS:1000514";
/// CV accession for the intensity array.
const CV_INTENSITY_ARRAY: &str = "MS:1000515";
/// CV accession for 32-bit float encoding.
const CV_FLOAT32: &str = "MS:1000521";
/// CV accession for 64-bit float encoding.
const CV_FLOAT64: &str = "MS:1000523";
/// CV accession for zlib compression.
const CV_ZLIB: &str = "MS:1000574";
/// CV accession for uncompressed payloads.
const CV_NO_COMPRESSION: &str = "MS:1000576";
/// Unit accession for minutes.
const UNIT_MINUTE: &str = "UO:0000031";
/// Unit accession for seconds.
const UNIT_SECOND: &str = "UO:0000010";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayKind {
    Mz,
    Intensity,
}

#[derive(Default)]
struct BinaryArrayState {
    kind: Option<ArrayKind>,
    float32: bool,
    zlib: bool,
    payload: String,
}

#[derive(Default)]
struct SpectrumState {
    scan_time: Option<f64>,
    mz: Option<Vec<f64>>,
    intensity: Option<Vec<f64>>,
}

/// Reads an mzML file into raw GC-MS data.
pub fn read_mzml<P: AsRef<Path>>(path: P) -> Result<RawData, FormatError> {
    let path = path.as_ref();
    info!("reading mzML file '{}'", path.display());

    let mut reader = Reader::from_reader(BufReader::with_capacity(
        64 * 1024,
        File::open(path)?,
    ));
    reader.config_mut().trim_text(true);

    let mut times: Vec<f64> = Vec::new();
    let mut scans: Vec<Scan> = Vec::new();

    let mut spectrum: Option<SpectrumState> = None;
    let mut binary: Option<BinaryArrayState> = None;
    let mut in_binary_text = false;
    let mut skipped = 0_usize;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"spectrum" => {
                    spectrum = Some(SpectrumState::default());
                }
                b"binaryDataArray" if spectrum.is_some() => {
                    binary = Some(BinaryArrayState::default());
                }
                b"binary" => {
                    in_binary_text = binary.is_some();
                }
                b"cvParam" => {
                    handle_cv_param(e, &mut spectrum, &mut binary)?;
                }
                _ => {}
            },
            // cvParam elements are usually self-closing
            Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"cvParam" {
                    handle_cv_param(e, &mut spectrum, &mut binary)?;
                }
            }
            Ok(Event::Text(ref t)) => {
                if in_binary_text {
                    if let Some(binary) = binary.as_mut() {
                        binary.payload = t.unescape()?.into_owned();
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"binary" => {
                    in_binary_text = false;
                }
                b"binaryDataArray" => {
                    if let (Some(state), Some(spectrum)) = (binary.take(), spectrum.as_mut()) {
                        let values =
                            decode_binary(&state.payload, state.float32, state.zlib)?;
                        match state.kind {
                            Some(ArrayKind::Mz) => spectrum.mz = Some(values),
                            Some(ArrayKind::Intensity) => spectrum.intensity = Some(values),
                            None => {}
                        }
                    }
                }
                b"spectrum" => {
                    if let Some(state) = spectrum.take() {
                        match finish_spectrum(state, scans.len())? {
                            Some((time, scan)) => {
                                times.push(time);
                                scans.push(scan);
                            }
                            None => skipped += 1,
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
        buf.clear();
    }

    if skipped > 0 {
        warn!("skipped {skipped} spectrum(s) without a scan start time");
    }
    if scans.is_empty() {
        return Err(FormatError::Malformed("no spectra with scan times".into()));
    }

    Ok(RawData::new(times, scans)?)
}

fn handle_cv_param(
    e: &BytesStart<'_>,
    spectrum: &mut Option<SpectrumState>,
    binary: &mut Option<BinaryArrayState>,
) -> Result<(), FormatError> {
    let accession = match get_attribute(e, "accession")? {
        Some(accession) => accession,
        None => return Ok(()),
    };

    if let Some(binary) = binary.as_mut() {
        match accession.as_str() {
            CV_MZ_ARRAY => binary.kind = Some(ArrayKind::Mz),
            CV_INTENSITY_ARRAY => binary.kind = Some(ArrayKind::Intensity),
            CV_FLOAT32 => binary.float32 = true,
            CV_FLOAT64 => binary.float32 = false,
            CV_ZLIB => binary.zlib = true,
            CV_NO_COMPRESSION => binary.zlib = false,
            _ => {}
        }
        return Ok(());
    }

    if accession == CV_SCAN_START_TIME {
        if let Some(spectrum) = spectrum.as_mut() {
            let value = get_attribute(e, "value")?
                .ok_or_else(|| FormatError::MissingField("scan start time value".into()))?;
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|_| FormatError::Malformed(format!("scan start time {value:?}")))?;
            // mzML scan times default to minutes
            let seconds = match get_attribute(e, "unitAccession")?.as_deref() {
                Some(UNIT_SECOND) => value,
                Some(UNIT_MINUTE) | None => value * 60.0,
                Some(_) => value * 60.0,
            };
            spectrum.scan_time = Some(seconds);
        }
    }
    Ok(())
}

fn finish_spectrum(
    state: SpectrumState,
    index: usize,
) -> Result<Option<(f64, Scan)>, FormatError> {
    let time = match state.scan_time {
        Some(time) => time,
        None => return Ok(None),
    };
    let mz = state.mz.unwrap_or_default();
    let intensity = state.intensity.unwrap_or_default();
    if mz.len() != intensity.len() {
        return Err(FormatError::Malformed(format!(
            "spectrum {index}: {} m/z values but {} intensities",
            mz.len(),
            intensity.len()
        )));
    }

    let mut points: Vec<(f64, f64)> = mz.into_iter().zip(intensity).collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    let scan = Scan::new(
        points.iter().map(|p| p.0).collect(),
        points.iter().map(|p| p.1.max(0.0)).collect(),
    )?;
    Ok(Some((time, scan)))
}

/// Decodes one base64 payload into a vector of f64 values.
fn decode_binary(payload: &str, float32: bool, zlib: bool) -> Result<Vec<f64>, FormatError> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let decoded = BASE64_STANDARD.decode(trimmed)?;
    let bytes = if zlib {
        let mut out = Vec::new();
        ZlibDecoder::new(&decoded[..]).read_to_end(&mut out)?;
        out
    } else {
        decoded
    };

    let mut cursor = &bytes[..];
    let mut values = Vec::new();
    if float32 {
        while let Ok(v) = cursor.read_f32::<LittleEndian>() {
            values.push(v as f64);
        }
    } else {
        while let Ok(v) = cursor.read_f64::<LittleEndian>() {
            values.push(v);
        }
    }
    Ok(values)
}

fn get_attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, FormatError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| FormatError::Xml(quick_xml::Error::from(e)))?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = std::str::from_utf8(&attr.value)?.to_string();
            return Ok(Some(value));
        }
    }
    Ok(None)
}
