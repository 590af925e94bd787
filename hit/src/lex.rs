//! Tokenizer for the HIT configuration language.
//!
//! The lexer is expressed as a tagged-sum state machine (`LexState`) driven
//! by a dispatch loop in [`Lexer::run`], rather than as function-pointer
//! trampolines. Positions are tracked as a byte offset with line/column
//! recomputed lazily at `emit` time, since input is treated as 8-bit
//! ASCII-compatible bytes, never Unicode-aware text.

use crate::error::{Error, ErrorKind};

const DIGITS: &[u8] = b"0123456789";
const SPACE: &[u8] = b" \t";
const ALLSPACE: &[u8] = b" \t\n\r";
const ALPHANUMERIC: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn is_identchar(c: u8) -> bool {
    ALPHANUMERIC.contains(&c) || b"_./:<>-+*".contains(&c)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokKind {
    Error,
    Eof,
    Equals,
    LeftBracket,
    RightBracket,
    Ident,
    Path,
    Number,
    String,
    Comment,
    InlineComment,
    BlankLine,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokKind,
    pub text: String,
    pub file: String,
    pub byte_offset: usize,
    pub line: u32,
    pub column: u32,
}

impl Token {
    /// Render this token as an `Error`, for when it is a sentinel
    /// `TokKind::Error` token carrying a diagnostic message instead of a
    /// source slice.
    pub fn into_error(self, kind: ErrorKind) -> Error {
        Error::new(kind, self.file, self.line, self.column, self.text)
    }
}

enum LexState {
    Start,
    Path,
    Eq,
    Number,
    StringLit,
    Done,
}

/// Computes the 1-based `(line, column)` of a byte offset by scanning for
/// preceding newlines, mirroring the recompute-at-emit-time approach
/// described for the lexer's `emit` primitive.
fn line_col(input: &str, offset: usize) -> (u32, u32) {
    let bytes = input.as_bytes();
    let mut line: u32 = 1;
    let mut last_newline: isize = -1;
    for (i, &b) in bytes.iter().enumerate().take(offset) {
        if b == b'\n' {
            line += 1;
            last_newline = i as isize;
        }
    }
    let column = (offset as isize - last_newline) as u32;
    (line, column)
}

struct Lexer<'a> {
    file: String,
    input: &'a str,
    start: usize,
    pos: usize,
    width: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(file: impl Into<String>, input: &'a str) -> Self {
        Lexer {
            file: file.into(),
            input,
            start: 0,
            pos: 0,
            width: 0,
            tokens: Vec::new(),
        }
    }

    fn byte(&self, idx: usize) -> u8 {
        self.input.as_bytes().get(idx).copied().unwrap_or(0)
    }

    fn next(&mut self) -> u8 {
        if self.pos >= self.input.len() {
            self.width = 0;
            return 0;
        }
        let c = self.byte(self.pos);
        self.width = 1;
        self.pos += self.width;
        c
    }

    fn backup(&mut self) {
        self.pos = self.start.max(self.pos.saturating_sub(self.width));
    }

    fn peek(&mut self) -> u8 {
        let c = self.next();
        self.backup();
        c
    }

    fn peek2(&mut self) -> (u8, u8) {
        let n = self.next();
        let nn = self.peek();
        self.backup();
        (n, nn)
    }

    fn accept_any(&mut self, valid: &[u8]) -> bool {
        if valid.contains(&self.next()) {
            true
        } else {
            self.backup();
            false
        }
    }

    fn accept(&mut self, c: u8) -> bool {
        self.accept_any(&[c])
    }

    fn accept_run(&mut self, valid: &[u8]) -> usize {
        let mut n = 0;
        while valid.contains(&self.next()) {
            n += 1;
        }
        self.backup();
        n
    }

    fn ignore(&mut self) {
        self.start = self.pos;
    }

    fn emit(&mut self, kind: TokKind) {
        let text = self.input[self.start..self.pos].to_string();
        let (line, column) = line_col(self.input, self.start);
        self.tokens.push(Token {
            kind,
            text,
            file: self.file.clone(),
            byte_offset: self.start,
            line,
            column,
        });
        self.start = self.pos;
    }

    fn last_token_end(&self) -> usize {
        self.tokens
            .last()
            .map(|t| t.byte_offset + t.text.len())
            .unwrap_or(0)
    }

    /// Restores `pos`/`start` to the end of the last emitted token, so that
    /// trailing whitespace between a string value and whatever follows it
    /// is not absorbed by the value token. This must be kept exactly as-is:
    /// it is load-bearing for stable inline-comment placement.
    fn rewind(&mut self) {
        if self.peek() == 0 {
            return;
        }
        let last = self.last_token_end();
        if last >= self.start {
            return;
        }
        self.pos = last;
        if self.pos < self.start {
            self.start = self.pos;
        }
    }

    fn error(&mut self, msg: impl Into<String>) -> LexState {
        let (line, column) = line_col(self.input, self.start);
        self.tokens.push(Token {
            kind: TokKind::Error,
            text: msg.into(),
            file: self.file.clone(),
            byte_offset: self.start,
            line,
            column,
        });
        LexState::Done
    }

    fn consume_to_newline(&mut self) {
        loop {
            let c = self.next();
            if c == 0 || c == b'\n' || c == b'\r' {
                break;
            }
        }
        self.backup();
    }

    fn consume_whitespace(&mut self) -> usize {
        let outer_start = self.pos;
        loop {
            let iter_start = self.pos;
            self.accept_run(SPACE);
            self.ignore();
            if self.accept(b'\n') {
                self.ignore();
                let mut n = 0;
                while self.accept(b'\n') {
                    if n == 0 {
                        self.emit(TokKind::BlankLine);
                    }
                    n += 1;
                }
            }
            if self.pos == iter_start {
                break;
            }
        }
        self.accept_run(ALLSPACE);
        self.ignore();
        self.pos - outer_start
    }

    fn consume_unquoted_string(&mut self) -> usize {
        loop {
            let c = self.next();
            if c == 0 || ALLSPACE.contains(&c) || c == b'[' || c == b'#' {
                break;
            }
        }
        self.backup();
        self.pos - self.start
    }

    fn lex_comments(&mut self) {
        let last_was_blank = matches!(self.tokens.last(), Some(t) if t.kind == TokKind::BlankLine);
        if self.start > 0 && !last_was_blank {
            self.accept_run(SPACE);
            self.ignore();
            if self.accept(b'#') {
                self.consume_to_newline();
                self.emit(TokKind::InlineComment);
            }
        }
        loop {
            self.consume_whitespace();
            if !self.accept(b'#') {
                break;
            }
            self.consume_to_newline();
            self.emit(TokKind::Comment);
        }
    }

    fn consume_brace_expression(&mut self) -> Result<(), String> {
        let end = crate::brace::brace_expr_end(self.input, self.start)?;
        self.pos = end;
        self.width = 1;
        Ok(())
    }

    fn lex_hit(&mut self) -> LexState {
        self.lex_comments();
        self.consume_whitespace();
        let c = self.next();
        if c == b'[' {
            self.emit(TokKind::LeftBracket);
            LexState::Path
        } else if is_identchar(c) {
            self.accept_run(b"_./:<>-+*0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ");
            self.emit(TokKind::Ident);
            LexState::Eq
        } else if c == 0 {
            self.emit(TokKind::Eof);
            LexState::Done
        } else {
            self.error(format!(
                "invalid character '{}' - did you leave a field value blank after a previous '='?",
                c as char
            ))
        }
    }

    fn lex_path(&mut self) -> LexState {
        self.accept_run(SPACE);
        self.ignore();
        self.accept_run(b"_./:<>-+*0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ");
        self.emit(TokKind::Path);
        let n = self.accept_run(SPACE);
        self.ignore();
        let got_close = self.accept(b']');
        if n == 0 && !got_close {
            let c = self.peek();
            return self.error(format!("invalid section path character '{}'", c as char));
        } else if n > 0 && !got_close {
            return self.error("spaces are not allowed in section paths");
        }
        self.emit(TokKind::RightBracket);
        LexState::Start
    }

    fn lex_eq(&mut self) -> LexState {
        self.accept_run(SPACE);
        self.ignore();
        if !self.accept(b'=') {
            let got = self.next();
            let name = self.tokens.last().map(|t| t.text.clone()).unwrap_or_default();
            return self.error(format!(
                "expected '=' after parameter name '{name}', got '{}'",
                got as char
            ));
        }
        self.emit(TokKind::Equals);
        self.accept_run(ALLSPACE);
        self.ignore();
        let c = self.peek();
        if DIGITS.contains(&c) || c == b'-' || c == b'+' || c == b'.' || c == b'e' || c == b'E' {
            LexState::Number
        } else {
            LexState::StringLit
        }
    }

    fn lex_number(&mut self) -> LexState {
        self.accept_any(b"+-");
        let mut n = self.accept_run(DIGITS);
        if self.accept(b'.') {
            n += self.accept_run(DIGITS);
        }
        if self.accept_any(b"eE") {
            n += self.accept_any(b"-+") as usize;
            n += self.accept_run(DIGITS);
        }
        if n == 0 {
            if self.consume_unquoted_string() > 0 {
                self.emit(TokKind::String);
            }
            return LexState::Start;
        }
        let c = self.peek();
        if !(ALLSPACE.contains(&c) || c == b'[') && c != 0 {
            if self.consume_unquoted_string() > 0 {
                self.emit(TokKind::String);
            }
            return LexState::Start;
        }
        self.emit(TokKind::Number);
        LexState::Start
    }

    fn lex_string(&mut self) -> LexState {
        self.accept_run(ALLSPACE);
        self.ignore();

        let (n, nn) = self.peek2();
        if n == b'$' && nn == b'{' {
            match self.consume_brace_expression() {
                Ok(()) => {
                    self.emit(TokKind::String);
                    return LexState::Start;
                }
                Err(msg) => return self.error(msg),
            }
        }

        let c = self.peek();
        if c != b'\'' && c != b'"' {
            if self.consume_unquoted_string() > 0 {
                self.emit(TokKind::String);
            }
            return LexState::Start;
        }

        let quote = c;
        while self.accept(quote) {
            let mut c = self.byte(self.start);
            loop {
                let prev = c;
                c = self.next();
                if c == quote && prev != b'\\' {
                    break;
                }
                if c == 0 {
                    return self.error("unterminated string");
                }
            }
            self.emit(TokKind::String);
            self.consume_whitespace();
        }
        self.rewind();
        LexState::Start
    }

    fn run(mut self) -> Vec<Token> {
        let mut state = LexState::Start;
        loop {
            state = match state {
                LexState::Start => self.lex_hit(),
                LexState::Path => self.lex_path(),
                LexState::Eq => self.lex_eq(),
                LexState::Number => self.lex_number(),
                LexState::StringLit => self.lex_string(),
                LexState::Done => break,
            };
        }
        self.tokens
    }
}

pub fn tokenize(file: impl Into<String>, input: &str) -> Vec<Token> {
    Lexer::new(file, input).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(toks: &[Token]) -> Vec<TokKind> {
        toks.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn basic_field() {
        let toks = tokenize("t", "[hello] foo=42 []");
        assert_eq!(
            kinds(&toks),
            vec![
                TokKind::LeftBracket,
                TokKind::Path,
                TokKind::RightBracket,
                TokKind::Ident,
                TokKind::Equals,
                TokKind::Number,
                TokKind::LeftBracket,
                TokKind::RightBracket,
                TokKind::Eof,
            ]
        );
        assert_eq!(toks[5].text, "42");
    }

    #[test]
    fn consecutive_string_literals() {
        let toks = tokenize("t", "foo='bar''baz'");
        let strings: Vec<_> = toks.iter().filter(|t| t.kind == TokKind::String).collect();
        assert_eq!(strings.len(), 2);
        assert_eq!(strings[0].text, "'bar'");
        assert_eq!(strings[1].text, "'baz'");
    }

    #[test]
    fn number_fallbacks_to_string() {
        for bad in ["4.2abc", "1e2e3", "1.2.3"] {
            let input = format!("x = {bad}");
            let toks = tokenize("t", &input);
            let value = toks.iter().find(|t| t.kind == TokKind::Number || t.kind == TokKind::String).unwrap();
            assert_eq!(value.kind, TokKind::String, "{bad} should lex as String");
        }
    }

    #[test]
    fn blank_line_requires_two_newlines() {
        let toks = tokenize("t", "a = 1\n\n\nb = 2");
        assert_eq!(kinds(&toks).iter().filter(|k| **k == TokKind::BlankLine).count(), 1);

        let toks = tokenize("t", "a = 1\nb = 2");
        assert_eq!(kinds(&toks).iter().filter(|k| **k == TokKind::BlankLine).count(), 0);
    }

    #[test]
    fn inline_comment_after_value() {
        let toks = tokenize("t", "a = 1 # trailing\n");
        let inline = toks.iter().find(|t| t.kind == TokKind::InlineComment).unwrap();
        assert_eq!(inline.text, "# trailing");
    }

    #[test]
    fn location_monotonic() {
        let toks = tokenize("t", "[a]\n  b = 1\n  c = 2\n[]");
        for w in toks.windows(2) {
            assert!((w[0].line, w[0].column) <= (w[1].line, w[1].column));
        }
    }
}
