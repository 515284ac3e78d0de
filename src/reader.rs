//! Comment-stripping character reader for Jack source.
//!
//! Presents the source as a stream of characters with `//` line comments and
//! `/* */` block comments removed. A lone `/` is the division operator and
//! passes through. Contents of string literals are passed through verbatim:
//! the reader tracks double-quote parity so a comment introducer inside a
//! string is never stripped. Jack strings cannot span lines, so the flag is
//! reset at every newline.

use crate::error::CompileError;
use crate::token::Span;

/// Character cursor over Jack source with transparent comment removal.
pub struct CharReader<'a> {
    #[allow(dead_code)]
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
    byte_offset: usize,
    line: usize,
    column: usize,
    in_string: bool,
}

impl<'a> CharReader<'a> {
    /// Create a new reader for the given source.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
            byte_offset: 0,
            line: 1,
            column: 1,
            in_string: false,
        }
    }

    /// Byte offset of the next character to be returned.
    ///
    /// Call `peek` first so that pending comments are skipped and the
    /// position refers to visible input.
    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    /// Line (1-based) of the next character to be returned.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Column (1-based) of the next character to be returned.
    pub fn column(&self) -> usize {
        self.column
    }

    /// Look at the next visible character without consuming it.
    pub fn peek(&mut self) -> Result<Option<char>, CompileError> {
        if !self.in_string {
            self.skip_comments()?;
        }
        Ok(self.raw_peek())
    }

    /// Consume and return the next visible character.
    pub fn bump(&mut self) -> Result<Option<char>, CompileError> {
        if !self.in_string {
            self.skip_comments()?;
        }
        let c = self.raw_advance();
        match c {
            Some('"') => self.in_string = !self.in_string,
            Some('\n') => self.in_string = false,
            _ => {}
        }
        Ok(c)
    }

    fn raw_peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn raw_peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    /// Advance to the next character, updating byte offset incrementally.
    fn raw_advance(&mut self) -> Option<char> {
        let c = self.raw_peek()?;
        self.pos += 1;
        self.byte_offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Skip any comments starting at the current position.
    ///
    /// On `/` the next character decides: `/` discards to end of line (the
    /// newline included), `*` discards to the matching `*/`, anything else
    /// leaves the `/` in place. Block comments do not nest.
    fn skip_comments(&mut self) -> Result<(), CompileError> {
        while self.raw_peek() == Some('/') {
            match self.raw_peek_next() {
                Some('/') => {
                    self.raw_advance();
                    self.raw_advance();
                    while let Some(c) = self.raw_peek() {
                        self.raw_advance();
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some('*') => {
                    let span = Span::new(
                        self.byte_offset,
                        self.byte_offset + 2,
                        self.line,
                        self.column,
                    );
                    self.raw_advance();
                    self.raw_advance();
                    loop {
                        match self.raw_peek() {
                            None => {
                                return Err(CompileError::lexical(
                                    span,
                                    "unterminated block comment",
                                ));
                            }
                            Some('*') if self.raw_peek_next() == Some('/') => {
                                self.raw_advance();
                                self.raw_advance();
                                break;
                            }
                            Some(_) => {
                                self.raw_advance();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drain the reader into a string of visible characters.
    fn filter(input: &str) -> String {
        let mut reader = CharReader::new(input);
        let mut out = String::new();
        while let Some(c) = reader.bump().unwrap() {
            out.push(c);
        }
        out
    }

    #[test]
    fn test_passes_plain_source_through() {
        assert_eq!(filter("class Main {}"), "class Main {}");
    }

    #[test]
    fn test_strips_line_comment_and_newline() {
        assert_eq!(filter("a // comment\nb"), "a b");
    }

    #[test]
    fn test_line_comment_at_eof_without_newline() {
        assert_eq!(filter("a // comment"), "a ");
    }

    #[test]
    fn test_strips_block_comment() {
        assert_eq!(filter("a /* comment */ b"), "a  b");
    }

    #[test]
    fn test_strips_doc_comment_form() {
        assert_eq!(filter("/** api doc */class"), "class");
    }

    #[test]
    fn test_block_comment_spanning_lines() {
        assert_eq!(filter("a /* one\ntwo\nthree */ b"), "a  b");
    }

    #[test]
    fn test_block_comments_do_not_nest() {
        // The first */ terminates the comment.
        assert_eq!(filter("/* outer /* inner */ rest"), " rest");
    }

    #[test]
    fn test_adjacent_comments() {
        assert_eq!(filter("/* a *//* b */x"), "x");
    }

    #[test]
    fn test_lone_slash_is_preserved() {
        assert_eq!(filter("a / b"), "a / b");
    }

    #[test]
    fn test_slash_inside_string_is_preserved() {
        assert_eq!(filter("\"a // b\""), "\"a // b\"");
        assert_eq!(filter("\"a /* b */\""), "\"a /* b */\"");
    }

    #[test]
    fn test_comment_after_string_is_stripped() {
        assert_eq!(filter("\"url://x\" // trailing\n;"), "\"url://x\" ;");
    }

    #[test]
    fn test_string_flag_resets_at_newline() {
        // Unterminated string on the first line must not suppress comment
        // stripping on the next one; the tokenizer reports the string error.
        assert_eq!(filter("\"open\n// gone\nx"), "\"open\nx");
    }

    #[test]
    fn test_unterminated_block_comment_fails() {
        let mut reader = CharReader::new("a /* never closed");
        assert_eq!(reader.bump().unwrap(), Some('a'));
        assert_eq!(reader.bump().unwrap(), Some(' '));
        let err = reader.bump().unwrap_err();
        assert!(err.to_string().contains("unterminated block comment"));
    }

    #[test]
    fn test_position_tracking_across_comments() {
        let mut reader = CharReader::new("// first line\nx");
        assert_eq!(reader.peek().unwrap(), Some('x'));
        assert_eq!(reader.line(), 2);
        assert_eq!(reader.column(), 1);
        assert_eq!(reader.byte_offset(), 14);
    }
}
