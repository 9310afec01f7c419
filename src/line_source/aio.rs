use super::{LineDecoder, BUFFER_SIZE};
use encoding_rs::Encoding;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Suspend-on-I/O line source over a tokio [`AsyncRead`]
///
/// The only await point is refilling the read buffer. That step is
/// cancel-safe: if the future returned by [`next_line`](Self::next_line) is
/// dropped, no decoded text is lost.
pub struct AsyncLineSource<R: AsyncRead + Unpin> {
    reader: BufReader<R>,
    decoder: LineDecoder,
}

impl<R: AsyncRead + Unpin> AsyncLineSource<R> {
    /// Wrap `reader`, decoding with `encoding` (see [`LineDecoder::new`])
    pub fn new(reader: R, encoding: &'static Encoding, detect_bom: bool) -> Self {
        AsyncLineSource {
            reader: BufReader::with_capacity(BUFFER_SIZE, reader),
            decoder: LineDecoder::new(encoding, detect_bom),
        }
    }

    /// Read the next physical line, suspending while waiting for bytes.
    ///
    /// Returns `Ok(None)` at end of stream.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(line) = self.decoder.next_line() {
                return Ok(Some(line));
            }
            if self.decoder.is_finished() {
                return Ok(None);
            }

            let buf = match self.reader.fill_buf().await {
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

impl<R: AsyncRead + Unpin> AsyncLineSource<R> {
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
