//! Reading the tab-separated PDA export of a UV detector.
//!
//! The file is a series of blocks separated by blank lines. Each block starts
//! with a bracketed tag; only four of them are read:
//!
//! - `[File Information]`: acquisition date and time on the third line
//! - `[Sample Information]`: the sample id, third token of the seventh line
//! - `[Original Files]`: source data, method and batch files on lines 2-4
//! - `[PDA 3D]`: ten header lines, a wavelength row, then one row per retention time
use chrono::{NaiveDate, NaiveTime};
use tracing::debug;

use crate::error::UvParseError;
use crate::matrix::UvMatrix;
use crate::numeric::parse_decimal;
use crate::sample::SampleMetadata;

pub const FILE_INFORMATION: &str = "[File Information]";
pub const SAMPLE_INFORMATION: &str = "[Sample Information]";
pub const ORIGINAL_FILES: &str = "[Original Files]";
pub const PDA_3D: &str = "[PDA 3D]";

/// Lines of the PDA block before the wavelength row, the tag line included
const PDA_HEADER_LINES: usize = 10;
/// Raw wavelength headers are stored in hundredths of a nanometer
const WAVELENGTH_SCALE: f64 = 100.0;

/// The contents of one UV export
#[derive(Debug, Clone, PartialEq)]
pub struct UvFile {
    pub metadata: SampleMetadata,
    pub matrix: UvMatrix,
}

struct Block<'a> {
    tag: &'a str,
    lines: Vec<&'a str>,
}

fn blocks(contents: &str) -> Vec<Block<'_>> {
    contents
        .split("\n\n")
        .map(|block| block.trim_start_matches('\n'))
        .filter(|block| !block.is_empty())
        .map(|block| {
            let lines: Vec<&str> = block.split('\n').collect();
            Block {
                tag: lines[0].trim(),
                lines,
            }
        })
        .collect()
}

fn line<'a>(block: &Block<'a>, section: &'static str, index: usize) -> Result<&'a str, UvParseError> {
    block
        .lines
        .get(index)
        .copied()
        .ok_or(UvParseError::TruncatedSection {
            section,
            line: index + 1,
        })
}

/// File name of a path written by either operating system, without extension
fn file_stem_of(text: &str) -> String {
    let text = text.trim();
    let field = text.rsplit('\t').next().unwrap_or(text).trim();
    let base = field.rsplit(['/', '\\']).next().unwrap_or(field);
    base.split('.').next().unwrap_or(base).to_string()
}

fn parse_run_date(token: &str) -> Result<NaiveDate, UvParseError> {
    let malformed = || UvParseError::MalformedMetadata {
        section: FILE_INFORMATION,
        detail: format!("{token:?} is not a day/month/year date"),
    };
    let parts: Vec<&str> = token.split(['/', '-', '.']).collect();
    if parts.len() != 3 {
        return Err(malformed());
    }
    let day: u32 = parts[0].parse().map_err(|_| malformed())?;
    let month: u32 = parts[1].parse().map_err(|_| malformed())?;
    let year: i32 = parts[2].parse().map_err(|_| malformed())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(malformed)
}

fn parse_run_time(tokens: &[&str]) -> Result<Option<NaiveTime>, UvParseError> {
    let Some(time) = tokens.first() else {
        return Ok(None);
    };
    if let Some(meridiem) = tokens.get(1) {
        let joined = format!("{time} {meridiem}");
        if let Ok(t) = NaiveTime::parse_from_str(&joined, "%I:%M:%S %p") {
            return Ok(Some(t));
        }
    }
    NaiveTime::parse_from_str(time, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
        .map(Some)
        .map_err(|_| UvParseError::MalformedMetadata {
            section: FILE_INFORMATION,
            detail: format!("{time:?} is not a time of day"),
        })
}

fn split_fields(row: &str) -> Vec<&str> {
    let mut fields: Vec<&str> = row.trim_end_matches(['\r', '\n']).split('\t').collect();
    while fields.last().is_some_and(|f| f.trim().is_empty()) {
        fields.pop();
    }
    fields
}

fn parse_pda(block: &Block<'_>) -> Result<UvMatrix, UvParseError> {
    let header = line(block, PDA_3D, PDA_HEADER_LINES)?;
    let wavelengths = split_fields(header)
        .into_iter()
        .skip(1)
        .map(|f| parse_decimal(f).map(|w| w / WAVELENGTH_SCALE))
        .collect::<Result<Vec<f64>, _>>()
        .map_err(|source| UvParseError::Numeric { row: 0, source })?;

    let mut retention_times = Vec::new();
    let mut intensities = Vec::new();
    for (i, row) in block
        .lines
        .iter()
        .skip(PDA_HEADER_LINES + 1)
        .filter(|l| !l.trim().is_empty())
        .enumerate()
    {
        let row_number = i + 1;
        let fields = split_fields(row);
        let (time, values) = fields
            .split_first()
            .ok_or(UvParseError::NoData)?;
        if values.len() != wavelengths.len() {
            return Err(UvParseError::RaggedRow {
                row: row_number,
                found: values.len(),
                expected: wavelengths.len(),
            });
        }
        let numeric = |source| UvParseError::Numeric {
            row: row_number,
            source,
        };
        retention_times.push(parse_decimal(time).map_err(numeric)?);
        for value in values {
            intensities.push(parse_decimal(value).map_err(numeric)?);
        }
    }

    if retention_times.is_empty() {
        return Err(UvParseError::NoData);
    }
    debug!(
        "Read {} UV rows over {} wavelengths",
        retention_times.len(),
        wavelengths.len()
    );
    Ok(UvMatrix::new(retention_times, wavelengths, intensities))
}

/// Parse the full text of a UV export into its metadata and PDA matrix
pub fn parse_uv(contents: &str) -> Result<UvFile, UvParseError> {
    let contents = contents.replace("\r\n", "\n");
    let blocks = blocks(&contents);
    let find = |tag: &'static str| {
        blocks
            .iter()
            .find(|b| b.tag == tag)
            .ok_or(UvParseError::MissingSection(tag))
    };

    let file_info = find(FILE_INFORMATION)?;
    let stamp: Vec<&str> = line(file_info, FILE_INFORMATION, 2)?
        .split_whitespace()
        .collect();
    let date_token = stamp.get(1).ok_or(UvParseError::MalformedMetadata {
        section: FILE_INFORMATION,
        detail: "no acquisition date".to_string(),
    })?;
    let run_date = parse_run_date(date_token)?;
    let run_time = parse_run_time(stamp.get(2..).unwrap_or_default())?;

    let sample_info = find(SAMPLE_INFORMATION)?;
    let sample_id = line(sample_info, SAMPLE_INFORMATION, 6)?
        .split_whitespace()
        .nth(2)
        .ok_or(UvParseError::MalformedMetadata {
            section: SAMPLE_INFORMATION,
            detail: "no sample id on line 7".to_string(),
        })?
        .to_string();

    let original_files = find(ORIGINAL_FILES)?;
    let source_name = file_stem_of(line(original_files, ORIGINAL_FILES, 1)?);
    let method = file_stem_of(line(original_files, ORIGINAL_FILES, 2)?);
    let batch_id = file_stem_of(line(original_files, ORIGINAL_FILES, 3)?);

    let matrix = parse_pda(find(PDA_3D)?)?;

    Ok(UvFile {
        metadata: SampleMetadata {
            sample_id,
            batch_id,
            source_name,
            method,
            run_date,
            run_time,
        },
        matrix,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing_tools::make_uv_text;

    #[test]
    fn test_parse_uv() -> Result<(), UvParseError> {
        let text = make_uv_text(&[
            (0.0, [1.0, 2.0, 3.0]),
            (0.01, [1.5, 2.5, 3.5]),
            (0.02, [2.0, 3.0, 4.0]),
        ]);
        let uv = parse_uv(&text)?;
        assert_eq!(uv.metadata.sample_id, "CMP-0042");
        assert_eq!(uv.metadata.batch_id, "P1-2023-03");
        assert_eq!(uv.metadata.method, "purity_fast");
        assert_eq!(uv.metadata.source_name, "CMP-0042_01");
        assert_eq!(uv.metadata.run_date.to_string(), "2023-03-14");
        assert_eq!(
            uv.metadata.run_time,
            NaiveTime::from_hms_opt(9, 41, 7)
        );
        assert_eq!(uv.matrix.wavelengths, vec![210.0, 254.0, 280.0]);
        assert_eq!(uv.matrix.retention_times, vec![0.0, 0.01, 0.02]);
        assert_eq!(uv.matrix.row(1), &[1.5, 2.5, 3.5]);
        Ok(())
    }

    #[test]
    fn test_windows_line_endings() -> Result<(), UvParseError> {
        let text = make_uv_text(&[(0.0, [1.0, 2.0, 3.0])]).replace('\n', "\r\n");
        let uv = parse_uv(&text)?;
        assert_eq!(uv.matrix.rows(), 1);
        Ok(())
    }

    #[test]
    fn test_missing_pda() {
        let text = make_uv_text(&[(0.0, [1.0, 2.0, 3.0])]);
        let cut = text.find("[PDA 3D]").unwrap();
        let err = parse_uv(&text[..cut]).unwrap_err();
        assert_eq!(err, UvParseError::MissingSection(PDA_3D));
    }

    #[test]
    fn test_empty_pda() {
        let text = make_uv_text(&[]);
        assert_eq!(parse_uv(&text).unwrap_err(), UvParseError::NoData);
    }

    #[test]
    fn test_ragged_and_malformed_rows() {
        let mut text = make_uv_text(&[(0.0, [1.0, 2.0, 3.0])]);
        text.push_str("0,01\t1,0\t2,0\n");
        assert!(matches!(
            parse_uv(&text),
            Err(UvParseError::RaggedRow { row: 2, found: 2, expected: 3 })
        ));

        let mut text = make_uv_text(&[(0.0, [1.0, 2.0, 3.0])]);
        text.push_str("0,01\t1,0\tn/a\t3,0\n");
        assert!(matches!(
            parse_uv(&text),
            Err(UvParseError::Numeric { row: 2, .. })
        ));
    }

    #[test]
    fn test_run_date_formats() {
        assert_eq!(parse_run_date("02-11-2022").unwrap().to_string(), "2022-11-02");
        assert_eq!(parse_run_date("2.11.2022").unwrap().to_string(), "2022-11-02");
        assert!(parse_run_date("31/02/2022").is_err());
        assert!(parse_run_date("2022").is_err());
        assert_eq!(
            parse_run_time(&["1:05:09", "PM"]).unwrap(),
            NaiveTime::from_hms_opt(13, 5, 9)
        );
    }
}
