use std::fs;
use std::io::{self, Write};
use std::path::Path;

use lcpurity::PurityRecord;
use tracing::debug;

/// Serialize `records` as a JSON array
pub fn write_output<W: Write>(mut writer: W, records: &[PurityRecord]) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writeln!(writer)?;
    writer.flush()
}

/// Write `records` to `path`, or to STDOUT if `path` is `-`
pub fn write_records(path: &Path, records: &[PurityRecord]) -> io::Result<()> {
    if path == Path::new("-") {
        write_output(io::stdout().lock(), records)
    } else {
        debug!("Writing {} records to {}", records.len(), path.display());
        let handle = io::BufWriter::new(fs::File::create(path)?);
        write_output(handle, records)
    }
}
