//! CSV field state machine with RFC 4180-like, lenient behavior
//!
//! The parser works one physical line at a time. A logical record spans
//! several lines only when a quoted field contains a line terminator; the
//! [`RecordBuilder`] carries the state between those lines.

use crate::error::{CsvError, Result};
use crate::types::{ParserOptions, Record, DEFAULT_ESCAPE, DEFAULT_SEPARATOR};

/// Line break inserted into a quoted field that continues on the next line
pub const FIELD_LINE_BREAK: char = '\n';

/// State of the field state machine between characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseState {
    /// At the start of a field; nothing buffered yet
    AwaitingField,
    /// Accumulating a field that did not start with the escape character
    InUnquotedField,
    /// Inside quotes; separators and line ends are literal
    InQuotedField,
    /// The last field of the record has been committed
    RecordComplete,
}

/// CSV parser for reading CSV data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvParser {
    separator: char,
    escape: char,
}

impl CsvParser {
    /// Create a new CSV parser with custom separator and escape character.
    ///
    /// The two characters must differ; otherwise a quote could not be told
    /// apart from a field boundary and `InvalidArgument` is returned.
    pub fn new(separator: char, escape: char) -> Result<Self> {
        if separator == escape {
            return Err(CsvError::InvalidArgument(format!(
                "Separator and escape characters must differ (both are {:?})",
                separator
            )));
        }
        Ok(Self { separator, escape })
    }

    /// Create a parser from reader options
    pub fn from_options(options: &ParserOptions) -> Result<Self> {
        Self::new(options.separator, options.escape)
    }

    /// Field separator character
    pub fn separator(&self) -> char {
        self.separator
    }

    /// Escape (quote) character
    pub fn escape(&self) -> char {
        self.escape
    }

    /// Run one physical line through the state machine.
    ///
    /// Completed fields are pushed onto `fields`; the partially built field
    /// stays in `buffer`. Returns [`ParseState::InQuotedField`] when the line
    /// ended inside quotes and the record needs another line, and
    /// [`ParseState::RecordComplete`] otherwise. Passing
    /// `RecordComplete` back in starts a new field as `AwaitingField` would.
    pub fn next_state(
        &self,
        state: ParseState,
        line: &str,
        fields: &mut Vec<String>,
        buffer: &mut String,
        trim: bool,
    ) -> ParseState {
        let mut state = match state {
            ParseState::RecordComplete => ParseState::AwaitingField,
            other => other,
        };
        let mut chars = line.chars().peekable();

        while let Some(ch) = chars.next() {
            match state {
                ParseState::AwaitingField | ParseState::RecordComplete => {
                    buffer.clear();

                    if ch == self.escape {
                        // Opening quote is not stored
                        state = ParseState::InQuotedField;
                    } else if ch == self.separator {
                        commit_field(fields, buffer, trim);
                    } else {
                        buffer.push(ch);
                        state = ParseState::InUnquotedField;
                    }
                }
                ParseState::InUnquotedField => {
                    if ch == self.separator {
                        commit_field(fields, buffer, trim);
                        state = ParseState::AwaitingField;
                    } else if ch == self.escape && chars.peek() == Some(&self.escape) {
                        buffer.push(ch);
                        chars.next();
                    } else {
                        buffer.push(ch);
                    }
                }
                ParseState::InQuotedField => {
                    if ch == self.escape {
                        if chars.peek() == Some(&self.escape) {
                            // Escaped quote ("")
                            buffer.push(ch);
                            chars.next();
                        } else {
                            // Closing quote; anything after it uses unquoted rules
                            state = ParseState::InUnquotedField;
                        }
                    } else {
                        buffer.push(ch);
                    }
                }
            }
        }

        if state == ParseState::InQuotedField {
            return state;
        }

        commit_field(fields, buffer, trim);
        ParseState::RecordComplete
    }

    /// Parse a single line into fields.
    ///
    /// An unterminated quote swallows the rest of the line into the last
    /// field, the same way a stream ending inside quotes does.
    pub fn parse_line(&self, line: &str) -> Record {
        let mut builder = RecordBuilder::new(*self, false);
        builder.feed_line(line);
        builder.finish()
    }
}

impl Default for CsvParser {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
            escape: DEFAULT_ESCAPE,
        }
    }
}

fn commit_field(fields: &mut Vec<String>, buffer: &mut String, trim: bool) {
    if trim {
        fields.push(buffer.trim().to_string());
        buffer.clear();
    } else {
        fields.push(std::mem::take(buffer));
    }
}

/// Accumulates exactly one logical record across physical lines
///
/// # Examples
///
/// ```
/// use csvstream::csv::{CsvParser, RecordBuilder};
///
/// # fn main() -> csvstream::Result<()> {
/// let mut builder = RecordBuilder::new(CsvParser::new(',', '"')?, false);
/// assert!(!builder.feed_line("\"line1"));
/// assert!(builder.feed_line("line2\",x"));
/// assert_eq!(builder.finish(), vec!["line1\nline2", "x"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    parser: CsvParser,
    trim: bool,
    state: ParseState,
    fields: Vec<String>,
    buffer: String,
    lines: usize,
}

impl RecordBuilder {
    /// Start a fresh record
    pub fn new(parser: CsvParser, trim: bool) -> Self {
        RecordBuilder {
            parser,
            trim,
            state: ParseState::AwaitingField,
            fields: Vec::with_capacity(64),
            buffer: String::with_capacity(256),
            lines: 0,
        }
    }

    /// Feed the next physical line (terminator already stripped).
    ///
    /// Returns `true` once the record is complete. Feeding a complete
    /// record is a no-op.
    pub fn feed_line(&mut self, line: &str) -> bool {
        if self.is_complete() {
            return true;
        }

        // The line break belongs to the quoted field only once the field
        // actually continues.
        if self.state == ParseState::InQuotedField {
            self.buffer.push(FIELD_LINE_BREAK);
        }

        self.lines += 1;
        self.state = self.parser.next_state(
            self.state,
            line,
            &mut self.fields,
            &mut self.buffer,
            self.trim,
        );
        self.is_complete()
    }

    /// True once the record's last field has been committed
    pub fn is_complete(&self) -> bool {
        self.state == ParseState::RecordComplete
    }

    /// Current state of the field state machine
    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Physical lines consumed so far
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Finish the record.
    ///
    /// A field still inside quotes is committed as-is rather than rejected.
    pub fn finish(mut self) -> Record {
        if self.state == ParseState::InQuotedField {
            tracing::warn!(
                lines = self.lines,
                "stream ended inside a quoted field; keeping buffered text as the last field"
            );
            commit_field(&mut self.fields, &mut self.buffer, self.trim);
        }
        self.fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separator_equal_to_escape_rejected() {
        assert!(matches!(
            CsvParser::new(',', ','),
            Err(CsvError::InvalidArgument(_))
        ));

        let options = ParserOptions::default().with_escape(',');
        assert!(matches!(
            CsvParser::from_options(&options),
            Err(CsvError::InvalidArgument(_))
        ));
        assert!(CsvParser::from_options(&ParserOptions::default()).is_ok());
    }

    #[test]
    fn test_simple() {
        let parser = CsvParser::new(',', '"').unwrap();
        assert_eq!(parser.parse_line("a,b,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_quoted() {
        let parser = CsvParser::new(',', '"').unwrap();
        assert_eq!(parser.parse_line(r#""a,b",c"#), vec!["a,b", "c"]);
    }

    #[test]
    fn test_mixed_quoted_unquoted() {
        let parser = CsvParser::new(',', '"').unwrap();
        assert_eq!(parser.parse_line(r#"a,"b,c",d"#), vec!["a", "b,c", "d"]);
    }

    #[test]
    fn test_escaped_quotes() {
        let parser = CsvParser::new(',', '"').unwrap();
        assert_eq!(
            parser.parse_line(r#""Say ""Hello""",world"#),
            vec![r#"Say "Hello""#, "world"]
        );
    }

    #[test]
    fn test_single_escaped_quote_field() {
        let parser = CsvParser::new(',', '"').unwrap();
        assert_eq!(parser.parse_line(r#"a,"""""#), vec!["a", "\""]);
    }

    #[test]
    fn test_doubled_escape_in_unquoted_field() {
        let parser = CsvParser::new(',', '"').unwrap();
        assert_eq!(parser.parse_line(r#"a""b,c"#), vec![r#"a"b"#, "c"]);
    }

    #[test]
    fn test_lone_escape_in_unquoted_field_is_literal() {
        let parser = CsvParser::new(',', '"').unwrap();
        assert_eq!(parser.parse_line(r#"5",x"#), vec![r#"5""#, "x"]);
    }

    #[test]
    fn test_text_after_closing_quote() {
        let parser = CsvParser::new(',', '"').unwrap();
        assert_eq!(parser.parse_line(r#""ab"cd,e"#), vec!["abcd", "e"]);
    }

    #[test]
    fn test_empty_fields() {
        let parser = CsvParser::new(',', '"').unwrap();
        assert_eq!(parser.parse_line("a,,c"), vec!["a", "", "c"]);
    }

    #[test]
    fn test_all_empty() {
        let parser = CsvParser::new(',', '"').unwrap();
        assert_eq!(parser.parse_line(",,"), vec!["", "", ""]);
    }

    #[test]
    fn test_quoted_with_newline() {
        let parser = CsvParser::new(',', '"').unwrap();
        assert_eq!(
            parser.parse_line("\"Line 1\nLine 2\",normal"),
            vec!["Line 1\nLine 2", "normal"]
        );
    }

    #[test]
    fn test_custom_delimiter() {
        let parser = CsvParser::new(';', '"').unwrap();
        assert_eq!(parser.parse_line(r#"a;"b;c";d"#), vec!["a", "b;c", "d"]);
    }

    #[test]
    fn test_custom_escape() {
        let parser = CsvParser::new('\t', '\'').unwrap();
        assert_eq!(
            parser.parse_line("'it''s'\tplain"),
            vec!["it's", "plain"]
        );
    }

    #[test]
    fn test_empty_line() {
        let parser = CsvParser::new(',', '"').unwrap();
        assert_eq!(parser.parse_line(""), vec![""]);
    }

    #[test]
    fn test_single_field() {
        let parser = CsvParser::new(',', '"').unwrap();
        assert_eq!(parser.parse_line("hello"), vec!["hello"]);
    }

    #[test]
    fn test_quoted_empty() {
        let parser = CsvParser::new(',', '"').unwrap();
        assert_eq!(parser.parse_line(r#""","""#), vec!["", ""]);
    }

    #[test]
    fn test_next_state_requests_more_inside_quotes() {
        let parser = CsvParser::new(',', '"').unwrap();
        let mut fields = Vec::new();
        let mut buffer = String::new();

        let state = parser.next_state(
            ParseState::AwaitingField,
            r#"a,"b"#,
            &mut fields,
            &mut buffer,
            false,
        );
        assert_eq!(state, ParseState::InQuotedField);
        assert_eq!(fields, vec!["a"]);
        assert_eq!(buffer, "b");

        let state = parser.next_state(state, r#"c",d"#, &mut fields, &mut buffer, false);
        assert_eq!(state, ParseState::RecordComplete);
        assert_eq!(fields, vec!["a", "bc", "d"]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_doubled_escape_stays_quoted() {
        let parser = CsvParser::new(',', '"').unwrap();
        let mut fields = Vec::new();
        let mut buffer = String::new();

        let state = parser.next_state(
            ParseState::AwaitingField,
            r#""x"""#,
            &mut fields,
            &mut buffer,
            false,
        );
        assert_eq!(state, ParseState::InQuotedField);
        assert_eq!(buffer, "x\"");
        assert!(fields.is_empty());
    }

    #[test]
    fn test_trim() {
        let parser = CsvParser::new(',', '"').unwrap();
        let mut fields = Vec::new();
        let mut buffer = String::new();
        parser.next_state(
            ParseState::AwaitingField,
            " a , b ",
            &mut fields,
            &mut buffer,
            true,
        );
        assert_eq!(fields, vec!["a", "b"]);

        assert_eq!(parser.parse_line(" a , b "), vec![" a ", " b "]);
    }

    #[test]
    fn test_builder_multiline() {
        let mut builder = RecordBuilder::new(CsvParser::default(), false);
        assert!(!builder.feed_line("\"line1"));
        assert_eq!(builder.state(), ParseState::InQuotedField);
        assert!(builder.feed_line("line2\",x"));
        assert_eq!(builder.lines(), 2);
        assert_eq!(builder.finish(), vec!["line1\nline2", "x"]);
    }

    #[test]
    fn test_builder_blank_line_inside_quotes() {
        let mut builder = RecordBuilder::new(CsvParser::default(), false);
        assert!(!builder.feed_line("\"a"));
        assert!(!builder.feed_line(""));
        assert!(builder.feed_line("b\""));
        assert_eq!(builder.lines(), 3);
        assert_eq!(builder.finish(), vec!["a\n\nb"]);
    }

    #[test]
    fn test_builder_unterminated() {
        let mut builder = RecordBuilder::new(CsvParser::default(), false);
        assert!(!builder.feed_line("\"unterminated"));
        assert_eq!(builder.finish(), vec!["unterminated"]);

        let mut builder = RecordBuilder::new(CsvParser::default(), false);
        builder.feed_line("x,\"first");
        builder.feed_line("second");
        assert_eq!(builder.finish(), vec!["x", "first\nsecond"]);
    }

    #[test]
    fn test_builder_unterminated_empty_quote() {
        let mut builder = RecordBuilder::new(CsvParser::default(), false);
        builder.feed_line("a,\"");
        assert_eq!(builder.finish(), vec!["a", ""]);
    }

    #[test]
    fn test_builder_ignores_lines_after_completion() {
        let mut builder = RecordBuilder::new(CsvParser::default(), false);
        assert!(builder.feed_line("a,b"));
        assert!(builder.feed_line("c,d"));
        assert_eq!(builder.lines(), 1);
        assert_eq!(builder.finish(), vec!["a", "b"]);
    }
}
