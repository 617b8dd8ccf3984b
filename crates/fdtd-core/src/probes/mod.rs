//! Probe output files: the filename grammar, parsed records and the reader.

mod filename;
mod reader;
mod record;

pub use filename::{
    CASE_SEPARATOR, FAR_FIELD_KIND_TOKEN, FAR_FIELD_PROBE_NAME, FormatError, PROBE_FILE_EXTENSION,
    ProbeFileName, WIRE_KIND_TOKENS,
};
pub use reader::{ParseError, ParseErrorKind, parse_probe_source, read_probe};
pub use record::{
    CURRENT_COLUMN, Column, FREQUENCY_COLUMN, ProbeRecord, ProbeSeries, TIME_COLUMN,
};
