//! CSV record reader with streaming support
//!
//! [`CsvReader`] pulls physical lines from a [`LineSource`] and runs them
//! through the field state machine until one logical record is complete.
//! The bookkeeping shared with the async reader lives in `ReaderCore`, so
//! both drivers report counts, current record and lifecycle identically.
//!
//! **Lifecycle:** `Ready → Ready` on every produced record, `Ready → Exhausted`
//! at end of stream or on a read failure, and `Ready | Exhausted → Disposed`.
//! Nothing leaves `Disposed` or `Exhausted`.
//!
//! **Thread confinement:** every read takes `&mut self`, so only one advance
//! can be in flight. There is no internal locking; share a reader across
//! threads by moving it behind a single owner (a channel or task).

use crate::csv::{CsvParser, RecordBuilder};
use crate::error::{CsvError, Result};
use crate::line_source::LineSource;
use crate::types::{ParserOptions, ReadOutcome, Record};
use encoding_rs::Encoding;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::iter::FusedIterator;
use std::path::Path;

/// Counts, current record and lifecycle flags shared by the blocking and
/// async readers
#[derive(Debug)]
pub(crate) struct ReaderCore {
    options: ParserOptions,
    parser: CsvParser,
    count: u64,
    current: Option<Record>,
    end_of_stream: bool,
    disposed: bool,
    error: Option<CsvError>,
}

impl ReaderCore {
    pub(crate) fn new(options: ParserOptions) -> Result<Self> {
        let parser = CsvParser::from_options(&options)?;
        Ok(Self::build(options, parser))
    }

    fn build(options: ParserOptions, parser: CsvParser) -> Self {
        ReaderCore {
            parser,
            options,
            count: 0,
            current: None,
            end_of_stream: false,
            disposed: false,
            error: None,
        }
    }

    /// Core with default options, which are always valid
    pub(crate) fn with_defaults() -> Self {
        Self::build(ParserOptions::default(), CsvParser::default())
    }

    /// Outcome to return without reading, if the reader cannot advance
    pub(crate) fn check_ready(&self) -> Option<ReadOutcome> {
        if self.disposed {
            Some(ReadOutcome::Disposed)
        } else if self.end_of_stream {
            Some(ReadOutcome::EndOfStream)
        } else {
            None
        }
    }

    pub(crate) fn builder(&self, trim: bool) -> RecordBuilder {
        RecordBuilder::new(self.parser, trim)
    }

    /// Publish a finished record; skipped records are counted but not kept
    pub(crate) fn complete(&mut self, builder: RecordBuilder, retain: bool) -> ReadOutcome {
        let lines = builder.lines();
        let record = builder.finish();
        self.count += 1;

        tracing::trace!(
            record = self.count,
            lines,
            fields = record.len(),
            skipped = !retain,
            "record complete"
        );

        if retain {
            self.current = Some(record);
        }
        ReadOutcome::Record
    }

    pub(crate) fn finish_stream(&mut self) -> ReadOutcome {
        if !self.end_of_stream {
            tracing::debug!(records = self.count, "end of stream");
        }
        self.end_of_stream = true;
        ReadOutcome::EndOfStream
    }

    /// Turn a read failure into end of iteration, keeping the error around
    pub(crate) fn fail(&mut self, err: io::Error, line: u64) -> ReadOutcome {
        tracing::warn!(
            records = self.count,
            line,
            error = %err,
            "read failed; ending iteration"
        );
        self.error = Some(CsvError::ReadError(format!(
            "Failed to read line {}: {}",
            line + 1,
            err
        )));
        self.end_of_stream = true;
        ReadOutcome::EndOfStream
    }

    /// Flip the disposed flag; true only for the call that did it
    pub(crate) fn mark_disposed(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        self.disposed = true;
        tracing::debug!(
            records = self.count,
            leave_open = self.options.leave_open,
            "reader disposed"
        );
        true
    }

    pub(crate) fn options(&self) -> &ParserOptions {
        &self.options
    }

    pub(crate) fn count(&self) -> u64 {
        self.count
    }

    pub(crate) fn record(&self) -> Option<&[String]> {
        self.current.as_deref()
    }

    pub(crate) fn current(&self) -> Option<Record> {
        self.current.clone()
    }

    pub(crate) fn field(&self, index: usize) -> Option<&str> {
        self.current.as_ref()?.get(index).map(String::as_str)
    }

    pub(crate) fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub(crate) fn take_error(&mut self) -> Option<CsvError> {
        self.error.take()
    }
}

pub(crate) fn validate_skip(count: u64) -> Result<()> {
    if count < 1 {
        return Err(CsvError::InvalidArgument(
            "Skip count must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Streaming CSV record reader
///
/// Reads one logical record per advance. Quoted fields may contain
/// separators, doubled escape characters and line breaks; a record that
/// spans several physical lines is assembled before it is published.
/// Memory usage is constant: only the current record is kept.
///
/// # Examples
///
/// ```
/// use csvstream::CsvReader;
/// use std::io::Cursor;
///
/// let mut reader = CsvReader::from_reader(Cursor::new("a,\"b,c\",d\n1,2,3\n"));
///
/// assert!(reader.advance());
/// assert_eq!(reader.record(), Some(&["a".to_string(), "b,c".to_string(), "d".to_string()][..]));
/// assert_eq!(reader.field(1), Some("b,c"));
///
/// assert!(reader.advance());
/// assert!(!reader.advance());
/// assert_eq!(reader.count(), 2);
/// ```
///
/// # Skipping a header
///
/// ```
/// use csvstream::CsvReader;
/// use std::io::Cursor;
///
/// let mut reader = CsvReader::from_reader(Cursor::new("id,name\n1,Alice\n"));
/// reader.skip(1)?;
///
/// for record in reader.records() {
///     assert_eq!(record, vec!["1", "Alice"]);
/// }
/// # Ok::<(), csvstream::CsvError>(())
/// ```
pub struct CsvReader<R> {
    core: ReaderCore,
    source: Option<LineSource<R>>,
    released: Option<R>,
}

impl CsvReader<File> {
    /// Open a CSV file with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, ParserOptions::default())
    }

    /// Open a CSV file with custom options
    pub fn open_with<P: AsRef<Path>>(path: P, options: ParserOptions) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "opened CSV file");
        Self::new(file, options)
    }
}

impl<R: Read> CsvReader<R> {
    /// Create a reader over `reader`.
    ///
    /// Fails with [`CsvError::InvalidArgument`] when the options are
    /// inconsistent (separator equal to the escape character).
    pub fn new(reader: R, options: ParserOptions) -> Result<Self> {
        let core = ReaderCore::new(options)?;
        let source = LineSource::new(reader, core.options().encoding, core.options().detect_bom);
        Ok(CsvReader {
            core,
            source: Some(source),
            released: None,
        })
    }

    /// Create a reader with default options (`,` separator, `"` escape, UTF-8)
    pub fn from_reader(reader: R) -> Self {
        let core = ReaderCore::with_defaults();
        let source = LineSource::new(reader, core.options().encoding, core.options().detect_bom);
        CsvReader {
            core,
            source: Some(source),
            released: None,
        }
    }

    /// Read the next record, reporting exactly why nothing was read.
    ///
    /// `trim` overrides [`ParserOptions::trim_values`] for this record.
    pub fn read_record(&mut self, trim: bool) -> ReadOutcome {
        self.read_next(trim, true)
    }

    /// Advance to the next record using the configured trimming.
    ///
    /// Returns `false` at end of stream, after a read failure, or once
    /// disposed; none of these raise an error.
    pub fn advance(&mut self) -> bool {
        let trim = self.core.options().trim_values;
        self.read_record(trim).is_record()
    }

    /// Advance to the next record with explicit trimming
    pub fn advance_with(&mut self, trim: bool) -> bool {
        self.read_record(trim).is_record()
    }

    /// Read and discard up to `count` records.
    ///
    /// Skipped records are counted but the current record is left as it
    /// was. Returns how many records were skipped, which is less than
    /// `count` only when the stream ended first.
    pub fn skip(&mut self, count: u64) -> Result<u64> {
        validate_skip(count)?;

        let trim = self.core.options().trim_values;
        let mut skipped = 0;
        while skipped < count && self.read_next(trim, false).is_record() {
            skipped += 1;
        }
        Ok(skipped)
    }

    /// Get iterator over records
    ///
    /// The iterator is forward-only and cannot be restarted.
    pub fn records(&mut self) -> CsvRecordIterator<'_, R> {
        CsvRecordIterator { reader: self }
    }

    fn read_next(&mut self, trim: bool, retain: bool) -> ReadOutcome {
        if let Some(outcome) = self.core.check_ready() {
            return outcome;
        }
        let source = match self.source.as_mut() {
            Some(source) => source,
            None => return self.core.finish_stream(),
        };

        let mut builder = self.core.builder(trim);
        loop {
            match source.next_line() {
                Ok(Some(line)) => {
                    if builder.feed_line(&line) {
                        break;
                    }
                }
                Ok(None) if builder.lines() == 0 => return self.core.finish_stream(),
                Ok(None) => break,
                Err(e) => return self.core.fail(e, source.line_number()),
            }
        }

        self.core.complete(builder, retain)
    }
}

impl<R> CsvReader<R> {
    /// Number of records read (including skipped ones)
    pub fn count(&self) -> u64 {
        self.core.count()
    }

    /// The most recently read record, if any
    pub fn record(&self) -> Option<&[String]> {
        self.core.record()
    }

    /// Field of the current record by position.
    ///
    /// Returns `None` when the index is out of range or no record has been
    /// read yet.
    pub fn field(&self, index: usize) -> Option<&str> {
        self.core.field(index)
    }

    /// True once the end of the stream (or a read failure) was reached.
    ///
    /// The flag is set by the advance that finds no further line. The reader
    /// never looks ahead, so it is still `false` right after the last record
    /// has been read; only the following advance (which returns `false`)
    /// sets it.
    pub fn is_end_of_stream(&self) -> bool {
        self.core.is_end_of_stream()
    }

    /// True once [`dispose`](Self::dispose) has run
    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    /// Options the reader was constructed with
    pub fn options(&self) -> &ParserOptions {
        self.core.options()
    }

    /// Effective encoding of the stream; `None` after dispose
    pub fn encoding(&self) -> Option<&'static Encoding> {
        self.source.as_ref().map(LineSource::encoding)
    }

    /// Take the read failure that ended iteration, if there was one
    pub fn take_error(&mut self) -> Option<CsvError> {
        self.core.take_error()
    }

    /// Always fails: the stream is consumed irreversibly
    pub fn reset(&mut self) -> Result<()> {
        Err(CsvError::ResetNotSupported)
    }

    /// Release the underlying stream.
    ///
    /// Idempotent. The stream is dropped (closed) unless the options ask to
    /// leave it open, in which case [`into_inner`](Self::into_inner) hands it
    /// back. Every later advance returns `false`.
    pub fn dispose(&mut self) {
        if !self.core.mark_disposed() {
            return;
        }
        if let Some(source) = self.source.take() {
            if self.core.options().leave_open {
                self.released = Some(source.into_inner());
            }
        }
    }

    /// Dispose the reader and return the stream if it was left open
    pub fn into_inner(mut self) -> Option<R> {
        self.dispose();
        self.released.take()
    }
}

impl<R> Drop for CsvReader<R> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<R> fmt::Display for CsvReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CsvReader: {} records read.", self.core.count())
    }
}

impl<R> fmt::Debug for CsvReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsvReader")
            .field("core", &self.core)
            .field("open", &self.source.is_some())
            .finish_non_exhaustive()
    }
}

/// Iterator over CSV records
pub struct CsvRecordIterator<'a, R> {
    reader: &'a mut CsvReader<R>,
}

impl<'a, R: Read> Iterator for CsvRecordIterator<'a, R> {
    type Item = Record;

    fn next(&mut self) -> Option<Self::Item> {
        if self.reader.advance() {
            self.reader.core.current()
        } else {
            None
        }
    }
}

impl<'a, R: Read> FusedIterator for CsvRecordIterator<'a, R> {}
