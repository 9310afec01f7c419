//! Async CSV record reader (feature `async`)
//!
//! Mirrors [`CsvReader`](crate::CsvReader) over a tokio [`AsyncRead`]. The
//! field state machine and record assembly are the same code; only fetching
//! the next physical line suspends.
//!
//! **Cancellation:** dropping an advance future (for example through
//! `tokio::time::timeout` or `select!`) cancels it between line reads. The
//! partially assembled record is dropped with the future, so the next advance
//! starts a fresh record at the next unread line.

use crate::csv_reader::{validate_skip, ReaderCore};
use crate::error::{CsvError, Result};
use crate::line_source::AsyncLineSource;
use crate::types::{ParserOptions, ReadOutcome, Record};
use encoding_rs::Encoding;
use std::fmt;
use tokio::io::AsyncRead;

/// Streaming CSV record reader for async sources
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// use csvstream::AsyncCsvReader;
///
/// let file = tokio::fs::File::open("data.csv").await?;
/// let mut reader = AsyncCsvReader::from_reader(file);
/// reader.skip(1).await?; // header
///
/// while let Some(record) = reader.next_record().await {
///     println!("{:?}", record);
/// }
/// # Ok(())
/// # }
/// ```
pub struct AsyncCsvReader<R: AsyncRead + Unpin> {
    core: ReaderCore,
    source: Option<AsyncLineSource<R>>,
    released: Option<R>,
}

impl<R: AsyncRead + Unpin> AsyncCsvReader<R> {
    /// Create a reader over `reader`, rejecting inconsistent options
    pub fn new(reader: R, options: ParserOptions) -> Result<Self> {
        let core = ReaderCore::new(options)?;
        let source =
            AsyncLineSource::new(reader, core.options().encoding, core.options().detect_bom);
        Ok(AsyncCsvReader {
            core,
            source: Some(source),
            released: None,
        })
    }

    /// Create a reader with default options
    pub fn from_reader(reader: R) -> Self {
        let core = ReaderCore::with_defaults();
        let source =
            AsyncLineSource::new(reader, core.options().encoding, core.options().detect_bom);
        AsyncCsvReader {
            core,
            source: Some(source),
            released: None,
        }
    }

    /// Read the next record, reporting exactly why nothing was read
    pub async fn read_record(&mut self, trim: bool) -> ReadOutcome {
        self.read_next(trim, true).await
    }

    /// Advance to the next record using the configured trimming
    pub async fn advance(&mut self) -> bool {
        let trim = self.core.options().trim_values;
        self.read_record(trim).await.is_record()
    }

    /// Advance to the next record with explicit trimming
    pub async fn advance_with(&mut self, trim: bool) -> bool {
        self.read_record(trim).await.is_record()
    }

    /// Read and discard up to `count` records; see
    /// [`CsvReader::skip`](crate::CsvReader::skip)
    pub async fn skip(&mut self, count: u64) -> Result<u64> {
        validate_skip(count)?;

        let trim = self.core.options().trim_values;
        let mut skipped = 0;
        while skipped < count && self.read_next(trim, false).await.is_record() {
            skipped += 1;
        }
        Ok(skipped)
    }

    /// Advance and return a copy of the new record
    pub async fn next_record(&mut self) -> Option<Record> {
        if self.advance().await {
            self.core.current()
        } else {
            None
        }
    }

    async fn read_next(&mut self, trim: bool, retain: bool) -> ReadOutcome {
        if let Some(outcome) = self.core.check_ready() {
            return outcome;
        }
        let source = match self.source.as_mut() {
            Some(source) => source,
            None => return self.core.finish_stream(),
        };

        let mut builder = self.core.builder(trim);
        loop {
            match source.next_line().await {
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

impl<R: AsyncRead + Unpin> AsyncCsvReader<R> {
    /// Number of records read (including skipped ones)
    pub fn count(&self) -> u64 {
        self.core.count()
    }

    /// The most recently read record, if any
    pub fn record(&self) -> Option<&[String]> {
        self.core.record()
    }

    /// Field of the current record by position
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
        self.source.as_ref().map(AsyncLineSource::encoding)
    }

    /// Take the read failure that ended iteration, if there was one
    pub fn take_error(&mut self) -> Option<CsvError> {
        self.core.take_error()
    }

    /// Always fails: the stream is consumed irreversibly
    pub fn reset(&mut self) -> Result<()> {
        Err(CsvError::ResetNotSupported)
    }

    /// Release the underlying stream; idempotent
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

impl<R: AsyncRead + Unpin> Drop for AsyncCsvReader<R> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<R: AsyncRead + Unpin> fmt::Display for AsyncCsvReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AsyncCsvReader: {} records read.", self.core.count())
    }
}

impl<R: AsyncRead + Unpin> fmt::Debug for AsyncCsvReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCsvReader")
            .field("core", &self.core)
            .field("open", &self.source.is_some())
            .finish_non_exhaustive()
    }
}
