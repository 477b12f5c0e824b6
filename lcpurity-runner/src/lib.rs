mod driver;
mod mz_range;
mod progress;
mod write;

pub use driver::{collect_files, LcPurityRunner, LcPurityRunnerError};
pub use mz_range::{MzRange, MzRangeParseError};
pub use progress::ProgressRecord;
pub use write::{write_output, write_records};
