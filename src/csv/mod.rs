//! CSV field state machine and record assembly

mod parser;

pub use parser::{CsvParser, ParseState, RecordBuilder, FIELD_LINE_BREAK};
