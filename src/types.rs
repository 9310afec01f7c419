//! Type definitions for CSV records and reader configuration

use crate::csv::CsvParser;
use crate::error::{CsvError, Result};
use encoding_rs::Encoding;
use std::fmt;

/// One logical CSV record: field values in the order they were encountered.
///
/// Records are not tied to a header, and consecutive records may have a
/// different number of fields.
pub type Record = Vec<String>;

/// Default field separator
pub const DEFAULT_SEPARATOR: char = ',';

/// Default escape (quote) character
pub const DEFAULT_ESCAPE: char = '"';

/// Outcome of a single advance call on a record reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadOutcome {
    /// A new record was parsed and is now the current record
    Record,
    /// The stream has no more records (or fetching the next line failed)
    EndOfStream,
    /// The reader was disposed; nothing more can be read
    Disposed,
}

impl ReadOutcome {
    /// True when a record was produced
    pub fn is_record(&self) -> bool {
        matches!(self, ReadOutcome::Record)
    }
}

/// Immutable parsing options, fixed when a reader is constructed
///
/// # Examples
///
/// ```
/// use csvstream::ParserOptions;
///
/// let options = ParserOptions::default()
///     .with_separator(';')
///     .with_trim_values(true);
///
/// assert!(options.validate().is_ok());
/// ```
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ParserOptions {
    /// Character that delimits fields outside of quoting
    pub separator: char,
    /// Character that opens/closes quoted fields and, doubled, stands for itself
    pub escape: char,
    /// Trim surrounding whitespace from every field value
    pub trim_values: bool,
    /// Hand the underlying stream back on dispose instead of closing it
    pub leave_open: bool,
    /// Character encoding of the byte stream
    #[cfg_attr(feature = "serde", serde(with = "encoding_label"))]
    pub encoding: &'static Encoding,
    /// Let a byte-order mark override `encoding`
    pub detect_bom: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            separator: DEFAULT_SEPARATOR,
            escape: DEFAULT_ESCAPE,
            trim_values: false,
            leave_open: false,
            encoding: encoding_rs::UTF_8,
            detect_bom: true,
        }
    }
}

impl fmt::Debug for ParserOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserOptions")
            .field("separator", &self.separator)
            .field("escape", &self.escape)
            .field("trim_values", &self.trim_values)
            .field("leave_open", &self.leave_open)
            .field("encoding", &self.encoding.name())
            .field("detect_bom", &self.detect_bom)
            .finish()
    }
}

impl ParserOptions {
    /// Set the field separator (builder pattern)
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Set the escape/quote character (builder pattern)
    pub fn with_escape(mut self, escape: char) -> Self {
        self.escape = escape;
        self
    }

    /// Trim surrounding whitespace from field values (builder pattern)
    pub fn with_trim_values(mut self, trim: bool) -> Self {
        self.trim_values = trim;
        self
    }

    /// Keep the underlying stream alive after dispose (builder pattern)
    ///
    /// When set, [`CsvReader::into_inner`](crate::CsvReader::into_inner)
    /// returns the stream after the reader is disposed.
    pub fn with_leave_open(mut self, leave_open: bool) -> Self {
        self.leave_open = leave_open;
        self
    }

    /// Set the character encoding (builder pattern)
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set the character encoding from a WHATWG label such as `"utf-16le"`
    /// or `"windows-1252"`
    pub fn with_encoding_label(self, label: &str) -> Result<Self> {
        let encoding = Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
            CsvError::InvalidArgument(format!("Unknown encoding label: {}", label))
        })?;
        Ok(self.with_encoding(encoding))
    }

    /// Enable or disable byte-order-mark detection (builder pattern)
    pub fn with_detect_bom(mut self, detect: bool) -> Self {
        self.detect_bom = detect;
        self
    }

    /// Check the options for combinations the parser cannot honor
    pub fn validate(&self) -> Result<()> {
        CsvParser::new(self.separator, self.escape).map(|_| ())
    }
}

#[cfg(feature = "serde")]
mod encoding_label {
    use encoding_rs::Encoding;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        encoding: &&'static Encoding,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(encoding.name())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<&'static Encoding, D::Error> {
        let label = String::deserialize(deserializer)?;
        Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
            serde::de::Error::custom(format!("unknown encoding label: {}", label))
        })
    }
}
