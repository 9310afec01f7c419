//! Physical line extraction from an encoded byte stream
//!
//! [`LineDecoder`] does the work without touching I/O: it is fed raw byte
//! chunks and hands back complete lines. [`LineSource`] drives it from a
//! blocking [`std::io::Read`], and `AsyncLineSource` (feature `async`) from a
//! tokio `AsyncRead`. The only difference between the two drivers is how
//! the next chunk of bytes is fetched.
//!
//! **Line terminators:** `\n`, `\r\n` and a lone `\r` all end a line and are
//! stripped. A final line without a terminator is still yielded; a trailing
//! terminator does not produce an extra empty line.

#[cfg(feature = "async")]
mod aio;
mod sync;

#[cfg(feature = "async")]
pub use aio::AsyncLineSource;
pub use sync::LineSource;

use encoding_rs::{CoderResult, Decoder, Encoding};

/// Read buffer size used by both drivers
pub const BUFFER_SIZE: usize = 4096;

/// Consumed text is compacted away once it grows past this many bytes
const COMPACT_THRESHOLD: usize = 8 * 1024;

/// Sans-IO decoder that turns byte chunks into text lines
pub struct LineDecoder {
    decoder: Decoder,
    configured: &'static Encoding,
    text: String,
    pos: usize,
    /// Offset below which `text` is known to hold no terminator
    scan_from: usize,
    skip_lf: bool,
    finished: bool,
    reported_bom: bool,
    line_number: u64,
}

impl LineDecoder {
    /// Create a decoder for `encoding`.
    ///
    /// With `detect_bom`, a UTF-8 or UTF-16 byte-order mark at the start of
    /// the stream overrides `encoding` and is removed from the text.
    pub fn new(encoding: &'static Encoding, detect_bom: bool) -> Self {
        let decoder = if detect_bom {
            encoding.new_decoder()
        } else {
            encoding.new_decoder_without_bom_handling()
        };

        LineDecoder {
            decoder,
            configured: encoding,
            text: String::with_capacity(BUFFER_SIZE),
            pos: 0,
            scan_from: 0,
            skip_lf: false,
            finished: false,
            reported_bom: !detect_bom,
            line_number: 0,
        }
    }

    /// Effective encoding; may change once a byte-order mark has been seen
    pub fn encoding(&self) -> &'static Encoding {
        self.decoder.encoding()
    }

    /// Number of physical lines handed out so far
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// True once [`finish`](Self::finish) has been called
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Decode another chunk of bytes
    pub fn feed(&mut self, bytes: &[u8]) {
        if self.finished {
            return;
        }
        self.compact();
        self.decode(bytes, false);

        if !self.reported_bom && self.decoder.encoding() != self.configured {
            tracing::debug!(
                configured = self.configured.name(),
                detected = self.decoder.encoding().name(),
                "byte-order mark overrides configured encoding"
            );
            self.reported_bom = true;
        }
    }

    /// Signal that the byte stream has ended
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.decode(&[], true);
        self.finished = true;
    }

    /// Next complete line, without its terminator.
    ///
    /// `None` means more input is needed, or, after [`finish`](Self::finish),
    /// that every line has been returned.
    pub fn next_line(&mut self) -> Option<String> {
        if self.skip_lf {
            if self.pos < self.text.len() {
                if self.text.as_bytes()[self.pos] == b'\n' {
                    self.pos += 1;
                }
                self.skip_lf = false;
            } else if self.finished {
                self.skip_lf = false;
            } else {
                return None;
            }
        }

        // Bytes before `scan_from` were searched by an earlier call, so a
        // long line arriving in many chunks is scanned only once.
        let start = self.scan_from.max(self.pos);
        let bytes = self.text.as_bytes();
        match memchr::memchr2(b'\n', b'\r', &bytes[start..]) {
            Some(i) => {
                let end = start + i;
                let line = self.text[self.pos..end].to_string();
                if bytes[end] == b'\r' {
                    match bytes.get(end + 1).copied() {
                        Some(b'\n') => self.pos = end + 2,
                        Some(_) => self.pos = end + 1,
                        None => {
                            // `\r\n` may be split across chunks
                            self.pos = end + 1;
                            self.skip_lf = true;
                        }
                    }
                } else {
                    self.pos = end + 1;
                }
                self.scan_from = self.pos;
                self.line_number += 1;
                Some(line)
            }
            None if self.finished && self.pos < self.text.len() => {
                let line = self.text[self.pos..].to_string();
                self.pos = self.text.len();
                self.scan_from = self.pos;
                self.line_number += 1;
                Some(line)
            }
            None => {
                self.scan_from = self.text.len();
                None
            }
        }
    }

    fn decode(&mut self, mut src: &[u8], last: bool) {
        loop {
            let needed = self
                .decoder
                .max_utf8_buffer_length(src.len())
                .unwrap_or(src.len() * 3 + 16);
            self.text.reserve(needed);

            let (result, read, _replaced) = self.decoder.decode_to_string(src, &mut self.text, last);
            src = &src[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }
    }

    fn compact(&mut self) {
        if self.pos == self.text.len() {
            self.text.clear();
            self.pos = 0;
            self.scan_from = 0;
        } else if self.pos >= COMPACT_THRESHOLD {
            self.text.drain(..self.pos);
            self.scan_from -= self.pos.min(self.scan_from);
            self.pos = 0;
        }
    }
}

impl std::fmt::Debug for LineDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineDecoder")
            .field("encoding", &self.encoding().name())
            .field("buffered", &(self.text.len() - self.pos))
            .field("finished", &self.finished)
            .field("line_number", &self.line_number)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(decoder: &mut LineDecoder) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = decoder.next_line() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_mixed_terminators() {
        let mut decoder = LineDecoder::new(encoding_rs::UTF_8, true);
        decoder.feed(b"a\nb\r\nc\rd");
        decoder.finish();
        assert_eq!(drain(&mut decoder), vec!["a", "b", "c", "d"]);
        assert_eq!(decoder.line_number(), 4);
    }

    #[test]
    fn test_trailing_terminator_adds_no_line() {
        let mut decoder = LineDecoder::new(encoding_rs::UTF_8, true);
        decoder.feed(b"a\n\nb\n");
        decoder.finish();
        assert_eq!(drain(&mut decoder), vec!["a", "", "b"]);
    }

    #[test]
    fn test_incomplete_line_waits_for_more() {
        let mut decoder = LineDecoder::new(encoding_rs::UTF_8, true);
        decoder.feed(b"abc");
        assert_eq!(decoder.next_line(), None);
        decoder.feed(b"def\nx");
        assert_eq!(decoder.next_line().as_deref(), Some("abcdef"));
        assert_eq!(decoder.next_line(), None);
        decoder.finish();
        assert_eq!(decoder.next_line().as_deref(), Some("x"));
        assert_eq!(decoder.next_line(), None);
    }

    #[test]
    fn test_long_line_scanned_once() {
        let mut decoder = LineDecoder::new(encoding_rs::UTF_8, true);
        let chunk = [b'x'; 100];
        for round in 1..=50 {
            decoder.feed(&chunk);
            assert_eq!(decoder.next_line(), None);
            // The search resumes at the end of what is already buffered
            assert_eq!(decoder.scan_from, round * chunk.len());
        }

        decoder.feed(b"\r\nnext\n");
        assert_eq!(decoder.next_line().map(|line| line.len()), Some(5000));
        assert_eq!(decoder.next_line().as_deref(), Some("next"));
        assert_eq!(decoder.next_line(), None);
    }

    #[test]
    fn test_scan_offset_survives_compaction() {
        let mut decoder = LineDecoder::new(encoding_rs::UTF_8, true);
        let mut head = vec![b'a'; COMPACT_THRESHOLD];
        head.extend_from_slice(b"\npartial");
        decoder.feed(&head);
        assert_eq!(decoder.next_line().map(|line| line.len()), Some(COMPACT_THRESHOLD));
        assert_eq!(decoder.next_line(), None);

        // Compaction drops the consumed line and shifts the scan offset
        decoder.feed(b"-tail\n");
        assert_eq!(decoder.next_line().as_deref(), Some("partial-tail"));
        decoder.finish();
        assert_eq!(decoder.next_line(), None);
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        let mut decoder = LineDecoder::new(encoding_rs::UTF_8, true);
        decoder.feed(b"a\r");
        assert_eq!(decoder.next_line().as_deref(), Some("a"));
        assert_eq!(decoder.next_line(), None);
        decoder.feed(b"\nb\n");
        assert_eq!(decoder.next_line().as_deref(), Some("b"));
        decoder.finish();
        assert_eq!(decoder.next_line(), None);
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let bytes = "héllo\n".as_bytes();
        let mut decoder = LineDecoder::new(encoding_rs::UTF_8, true);
        decoder.feed(&bytes[..2]);
        decoder.feed(&bytes[2..]);
        decoder.finish();
        assert_eq!(drain(&mut decoder), vec!["héllo"]);
    }

    #[test]
    fn test_utf8_bom_removed() {
        let mut decoder = LineDecoder::new(encoding_rs::UTF_8, true);
        decoder.feed(b"\xEF\xBB\xBFa,b\n");
        decoder.finish();
        assert_eq!(drain(&mut decoder), vec!["a,b"]);
    }

    #[test]
    fn test_utf16le_bom_detected() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "x,y\n".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let mut decoder = LineDecoder::new(encoding_rs::UTF_8, true);
        decoder.feed(&bytes);
        decoder.finish();
        assert_eq!(decoder.encoding(), encoding_rs::UTF_16LE);
        assert_eq!(drain(&mut decoder), vec!["x,y"]);
    }

    #[test]
    fn test_bom_kept_without_detection() {
        let mut decoder = LineDecoder::new(encoding_rs::UTF_8, false);
        decoder.feed(b"\xEF\xBB\xBFa\n");
        decoder.finish();
        assert_eq!(drain(&mut decoder), vec!["\u{FEFF}a"]);
    }

    #[test]
    fn test_legacy_encoding() {
        let mut decoder = LineDecoder::new(encoding_rs::WINDOWS_1252, true);
        decoder.feed(b"caf\xE9\n");
        decoder.finish();
        assert_eq!(drain(&mut decoder), vec!["café"]);
    }

    #[test]
    fn test_malformed_bytes_replaced() {
        let mut decoder = LineDecoder::new(encoding_rs::UTF_8, true);
        decoder.feed(b"a\xFFb\n");
        decoder.finish();
        assert_eq!(drain(&mut decoder), vec!["a\u{FFFD}b"]);
    }
}
