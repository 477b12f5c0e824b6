//! Reading JCAMP-style mass spectrum scan exports.
//!
//! Each scan starts with `##SCAN_NUMBER`. The second line of a scan carries its
//! retention time in seconds, the next three are labelled records, and the
//! m/z, intensity pairs follow until the next record marker (`##END` closes the
//! file).
use tracing::debug;

use crate::error::MsParseError;
use crate::grid::MzGrid;
use crate::matrix::MsMatrix;
use crate::numeric::{first_decimal, parse_decimal};

pub const SCAN_DELIMITER: &str = "##SCAN_NUMBER";
/// Lines of each scan fragment before its first data point
const SCAN_HEADER_LINES: usize = 5;

/// Split one data line into its m/z and intensity fields.
///
/// Three layouts are accepted:
/// - fields separated by whitespace or `;`, each with either decimal separator
/// - dot decimals with a single comma between the fields
/// - commas only, where the first comma is the m/z decimal separator and the
///   second separates the fields, e.g. `301,05,1200` or `301,05,1200,5`
fn split_pair(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.contains(|c: char| c.is_whitespace() || c == ';') {
        let fields: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ';')
            .map(|f| f.trim_matches(','))
            .filter(|f| !f.is_empty())
            .collect();
        return match fields.as_slice() {
            [mz, intensity] => Some((mz.to_string(), intensity.to_string())),
            _ => None,
        };
    }
    if line.contains('.') {
        let (mz, intensity) = line.split_once(',')?;
        return Some((mz.to_string(), intensity.to_string()));
    }
    let parts: Vec<&str> = line.split(',').collect();
    match parts.as_slice() {
        [mz, intensity] => Some((mz.to_string(), intensity.to_string())),
        [whole, frac, intensity] => Some((format!("{whole}.{frac}"), intensity.to_string())),
        [whole, frac, i_whole, i_frac] => {
            Some((format!("{whole}.{frac}"), format!("{i_whole}.{i_frac}")))
        }
        _ => None,
    }
}

struct Scan {
    retention_time: f64,
    points: Vec<(usize, f64)>,
}

fn parse_scan(scan: usize, fragment: &str, grid: &MzGrid) -> Result<Scan, MsParseError> {
    let lines: Vec<&str> = fragment.lines().collect();
    let time_line = lines
        .get(1)
        .ok_or(MsParseError::MissingRetentionTime { scan })?;
    let retention_time =
        first_decimal(time_line).map_err(|source| MsParseError::RetentionTime { scan, source })?;

    let mut points = Vec::new();
    for line in lines
        .iter()
        .skip(SCAN_HEADER_LINES)
        .take_while(|l| !l.trim_start().starts_with("##"))
        .filter(|l| !l.trim().is_empty())
    {
        let (mz, intensity) = split_pair(line).ok_or_else(|| MsParseError::MalformedPair {
            scan,
            line: line.to_string(),
        })?;
        let numeric = |source| MsParseError::Numeric { scan, source };
        let mz = parse_decimal(&mz).map_err(numeric)?;
        let intensity = parse_decimal(&intensity).map_err(numeric)?;
        let bin = grid
            .bin_index(mz)
            .map_err(|source| MsParseError::OffGrid { scan, source })?;
        points.push((bin, intensity));
    }
    Ok(Scan {
        retention_time,
        points,
    })
}

/// Parse the full text of a scan export onto `grid`, one matrix row per scan.
///
/// The file header before the first scan is ignored. An m/z that does not land
/// on the grid fails the whole file.
pub fn parse_ms(contents: &str, grid: &MzGrid) -> Result<MsMatrix, MsParseError> {
    let scans = contents
        .split(SCAN_DELIMITER)
        .skip(1)
        .enumerate()
        .map(|(i, fragment)| parse_scan(i + 1, fragment, grid))
        .collect::<Result<Vec<_>, _>>()?;

    let retention_times = scans.iter().map(|s| s.retention_time).collect();
    let mut matrix = MsMatrix::zeros(retention_times, *grid);
    for (i, scan) in scans.iter().enumerate() {
        for (bin, intensity) in scan.points.iter().copied() {
            matrix.set(i, bin, intensity);
        }
    }
    debug!(
        "Read {} MS scans onto a {} bin grid",
        matrix.scan_count(),
        matrix.width()
    );
    Ok(matrix)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::GridError;
    use crate::testing_tools::make_ms_text;

    #[test]
    fn test_split_pair_layouts() {
        let pair = |a: &str, b: &str| Some((a.to_string(), b.to_string()));
        assert_eq!(split_pair("301,05, 1200"), pair("301,05", "1200"));
        assert_eq!(split_pair("301,05\t1200,5"), pair("301,05", "1200,5"));
        assert_eq!(split_pair("301.05;1200"), pair("301.05", "1200"));
        assert_eq!(split_pair("301.05,1200.5"), pair("301.05", "1200.5"));
        assert_eq!(split_pair("301,05,1200"), pair("301.05", "1200"));
        assert_eq!(split_pair("301,05,1200,5"), pair("301.05", "1200.5"));
        assert_eq!(split_pair("301"), None);
        assert_eq!(split_pair("1 2 3"), None);
    }

    #[test]
    fn test_parse_ms() -> Result<(), MsParseError> {
        let text = make_ms_text(
            "CMP-0042_01",
            &[
                (0.6, vec![(100.05, 1500.0), (301.0, 25.0)]),
                (1.2, vec![(1000.0, 40.0)]),
                (1.8, vec![]),
            ],
        );
        let grid = MzGrid::default();
        let ms = parse_ms(&text, &grid)?;
        assert_eq!(ms.scan_count(), 3);
        assert_eq!(ms.retention_times, vec![0.6, 1.2, 1.8]);
        assert_eq!(ms.get(0, 1), 1500.0);
        assert_eq!(ms.get(0, grid.bin_index(301.0).unwrap()), 25.0);
        assert_eq!(ms.get(1, grid.len() - 1), 40.0);
        assert!(ms.scan(2).iter().all(|v| *v == 0.0));
        Ok(())
    }

    #[test]
    fn test_off_grid_mz_fails() {
        let text = make_ms_text("CMP-0042_01", &[(0.6, vec![(100.03, 10.0)])]);
        let err = parse_ms(&text, &MzGrid::default()).unwrap_err();
        assert!(matches!(
            err,
            MsParseError::OffGrid {
                scan: 1,
                source: GridError::OffGrid { .. }
            }
        ));
    }

    #[test]
    fn test_malformed_points() {
        let text = make_ms_text("x", &[(0.6, vec![(100.05, 10.0)])]).replace("100,05, 10", "100,05, ten");
        assert!(matches!(
            parse_ms(&text, &MzGrid::default()),
            Err(MsParseError::Numeric { scan: 1, .. })
        ));

        let text = "##TITLE= x\n##SCAN_NUMBER= 1\n##RETENTION_TIME= none\n";
        assert!(matches!(
            parse_ms(text, &MzGrid::default()),
            Err(MsParseError::RetentionTime { scan: 1, .. })
        ));
    }

    #[test]
    fn test_no_scans() -> Result<(), MsParseError> {
        let ms = parse_ms("##TITLE= empty\n##END=\n", &MzGrid::default())?;
        assert_eq!(ms.scan_count(), 0);
        Ok(())
    }
}
