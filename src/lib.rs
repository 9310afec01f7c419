//! # csvstream
//!
//! Streaming CSV record reader with constant memory usage.
//!
//! ## Features
//!
//! - **Streaming**: one logical record in memory at a time
//! - **Multi-line records**: quoted fields may contain separators, doubled
//!   escape characters and line breaks
//! - **Lenient**: a quote left open at end of stream keeps its text instead of
//!   failing; read failures end iteration instead of panicking
//! - **Encodings**: any `encoding_rs` encoding, with byte-order-mark detection
//! - **Blocking and async**: [`CsvReader`] for `std::io::Read`,
//!   `AsyncCsvReader` for tokio `AsyncRead` (feature `async`), both driving
//!   the same state machine
//!
//! ## Quick Start
//!
//! ```no_run
//! use csvstream::{CsvReader, ParserOptions};
//!
//! let options = ParserOptions::default()
//!     .with_separator(';')
//!     .with_trim_values(true);
//!
//! let mut reader = CsvReader::open_with("data.csv", options)?;
//! reader.skip(1)?; // header
//!
//! while reader.advance() {
//!     if let Some(name) = reader.field(1) {
//!         println!("{}", name);
//!     }
//! }
//! # Ok::<(), csvstream::CsvError>(())
//! ```
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events (`trace` per record, `debug` for
//! lifecycle, `warn` for lenient recoveries) and never installs a subscriber.

pub mod csv;
pub mod csv_reader;
pub mod error;
pub mod line_source;
pub mod types;

#[cfg(feature = "async")]
pub mod async_csv_reader;

#[cfg(feature = "async")]
pub use async_csv_reader::AsyncCsvReader;
pub use csv::{CsvParser, ParseState, RecordBuilder};
pub use csv_reader::{CsvReader, CsvRecordIterator};
pub use error::{CsvError, Result};
pub use types::{ParserOptions, ReadOutcome, Record};
