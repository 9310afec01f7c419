use super::{LineDecoder, BUFFER_SIZE};
use encoding_rs::Encoding;
use std::io::{self, BufRead, BufReader, Read};

/// Blocking line source over any [`Read`]
///
/// # Examples
///
/// ```
/// use csvstream::line_source::LineSource;
/// use std::io::Cursor;
///
/// let mut source = LineSource::new(Cursor::new("a\r\nb"), encoding_rs::UTF_8, true);
/// assert_eq!(source.next_line().unwrap().as_deref(), Some("a"));
/// assert_eq!(source.next_line().unwrap().as_deref(), Some("b"));
/// assert_eq!(source.next_line().unwrap(), None);
/// ```
pub struct LineSource<R> {
    reader: BufReader<R>,
    decoder: LineDecoder,
}

impl<R: Read> LineSource<R> {
    /// Wrap `reader`, decoding with `encoding` (see [`LineDecoder::new`])
    pub fn new(reader: R, encoding: &'static Encoding, detect_bom: bool) -> Self {
        LineSource {
            reader: BufReader::with_capacity(BUFFER_SIZE, reader),
            decoder: LineDecoder::new(encoding, detect_bom),
        }
    }

    /// Read the next physical line, blocking until it is complete.
    ///
    /// Returns `Ok(None)` at end of stream.
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(line) = self.decoder.next_line() {
                return Ok(Some(line));
            }
            if self.decoder.is_finished() {
                return Ok(None);
            }

            let buf = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if buf.is_empty() {
                self.decoder.finish();
                continue;
            }

            let n = buf.len();
            self.decoder.feed(buf);
            self.reader.consume(n);
        }
    }
}

impl<R> LineSource<R> {
    /// Effective encoding (after byte-order-mark detection)
    pub fn encoding(&self) -> &'static Encoding {
        self.decoder.encoding()
    }

    /// Number of physical lines read so far
    pub fn line_number(&self) -> u64 {
        self.decoder.line_number()
    }

    /// Borrow the underlying reader
    pub fn get_ref(&self) -> &R {
        self.reader.get_ref()
    }

    /// Unwrap the underlying reader. Buffered, unread data is lost.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}
