//! Builders for synthetic raw files used across the unit tests
use std::fmt::Write;

pub fn make_uv_text_with(sample_id: &str, data_file: &str, rows: &[(f64, [f64; 3])]) -> String {
    let mut text = String::new();
    writeln!(text, "[Header]\nApplication Name\tLabSolutions\nVersion\t5.97\n").unwrap();
    writeln!(
        text,
        "[File Information]\nType\tData File\nGenerated\t14/03/2023 09:41:07\nGenerated by\tSystem Administrator\n"
    )
    .unwrap();
    writeln!(
        text,
        "[Sample Information]\nOperator Name\tAdmin\nAcquired\t14/03/2023 09:10:00\nSample Type\tUnknown\nLevel\t1\nSample Name\t{sample_id}\nSample ID\t{sample_id}\nISTD Amount\t1\n"
    )
    .unwrap();
    writeln!(
        text,
        "[Original Files]\nData File\tC:\\LabSolutions\\Data\\P1\\{data_file}.lcd\nMethod File\tC:\\LabSolutions\\Methods\\purity_fast.lcm\nBatch File\tC:\\LabSolutions\\Batches\\P1-2023-03.lcb\n"
    )
    .unwrap();
    text.push_str(
        "[PDA 3D]\nStart Time(min)\t0,00\nEnd Time(min)\t1,00\nStart Wavelength(nm)\t210\n\
         End Wavelength(nm)\t280\nWavelength Interval(nm)\t35\nTime Interval(msec)\t600\n\
         # of Time Axis Points\t3\n# of Wavelength Axis Points\t3\nIntensity Units\tuAU\n\
         R.Time (min)\t21000\t25400\t28000\n",
    );
    for (time, values) in rows {
        let time = format!("{time:.4}").replace('.', ",");
        let values: Vec<String> = values
            .iter()
            .map(|v| format!("{v:.1}").replace('.', ","))
            .collect();
        writeln!(text, "{time}\t{}", values.join("\t")).unwrap();
    }
    text
}

pub fn make_uv_text(rows: &[(f64, [f64; 3])]) -> String {
    make_uv_text_with("CMP-0042", "CMP-0042_01", rows)
}

/// A JCAMP-style scan file, one `(retention time (s), [(m/z, intensity)])` per scan
pub fn make_ms_text(title: &str, scans: &[(f64, Vec<(f64, f64)>)]) -> String {
    let mut text = String::new();
    writeln!(text, "##TITLE= {title}\n##JCAMP-DX= 5.01\n##DATA TYPE= MASS SPECTRUM").unwrap();
    for (i, (time, points)) in scans.iter().enumerate() {
        let tic: f64 = points.iter().map(|(_, v)| v).sum();
        writeln!(text, "##SCAN_NUMBER= {}", i + 1).unwrap();
        writeln!(text, "##RETENTION_TIME= {}", format!("{time:.3}").replace('.', ",")).unwrap();
        writeln!(text, "##TIC= {tic:.0}").unwrap();
        writeln!(text, "##NPOINTS= {}", points.len()).unwrap();
        writeln!(text, "##XYDATA= (XY..XY)").unwrap();
        for (mz, intensity) in points {
            writeln!(
                text,
                "{}, {intensity:.0}",
                format!("{mz:.2}").replace('.', ",")
            )
            .unwrap();
        }
    }
    writeln!(text, "##END=").unwrap();
    text
}
