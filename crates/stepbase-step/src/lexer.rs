//! Part 21 (STEP physical file format) lexer.
//!
//! Tokenizes STEP files according to ISO 10303-21. Handles:
//! - Keywords (e.g., `CARTESIAN_POINT`, `DATA`, `ENDSEC`)
//! - Entity references (e.g., `#123`)
//! - Strings (e.g., `'hello'`)
//! - Real numbers (e.g., `1.5E-10`, `-3.14`, `1.E-07`)
//! - Integers
//! - Enumerations (e.g., `.TRUE.`, `.MILLI.`)
//! - Punctuation (parentheses, comma, semicolon, equals, asterisk, dollar)

use crate::error::StepError;

/// A token in a STEP file.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Keyword or identifier (e.g., `CARTESIAN_POINT`, `DATA`).
    Keyword(String),
    /// Entity reference (e.g., `#123` becomes `EntityRef(123)`).
    EntityRef(u64),
    /// String literal (contents without quotes).
    String(String),
    /// Real number.
    Real(f64),
    /// Integer number.
    Integer(i64),
    /// Enumeration (e.g., `.TRUE.` becomes `Enum("TRUE")`).
    Enum(String),
    /// Left parenthesis `(`.
    LParen,
    /// Right parenthesis `)`.
    RParen,
    /// Comma `,`.
    Comma,
    /// Semicolon `;`.
    Semicolon,
    /// Equals `=`.
    Equals,
    /// Asterisk `*` (derived value marker).
    Asterisk,
    /// Dollar `$` (null/unset value marker).
    Dollar,
}

/// Position in the source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub col: usize,
}

/// A token with its position in the source.
#[derive(Debug, Clone)]
pub struct SpannedToken {
    /// The token.
    pub token: Token,
    /// Position where the token starts.
    pub pos: Position,
}

/// Lexer for Part 21 STEP files.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Tokenize the entire input.
    pub fn tokenize(&mut self) -> Result<Vec<SpannedToken>, StepError> {
        let mut tokens = Vec::new();
        while let Some(tok) = self.next_token()? {
            tokens.push(tok);
        }
        Ok(tokens)
    }

    /// Get the next token, or `None` if at end of input.
    pub fn next_token(&mut self) -> Result<Option<SpannedToken>, StepError> {
        self.skip_whitespace_and_comments();

        let Some(ch) = self.peek_char() else {
            return Ok(None);
        };

        let start_pos = Position {
            line: self.line,
            col: self.col,
        };

        let token = match ch {
            b'(' => self.single(Token::LParen),
            b')' => self.single(Token::RParen),
            b',' => self.single(Token::Comma),
            b';' => self.single(Token::Semicolon),
            b'=' => self.single(Token::Equals),
            b'*' => self.single(Token::Asterisk),
            b'$' => self.single(Token::Dollar),
            b'#' => self.read_entity_ref()?,
            b'\'' => self.read_string()?,
            b'.' => self.read_enum()?,
            b'-' | b'+' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit() || c == b'.') => {
                self.read_number()?
            }
            b'0'..=b'9' => self.read_number()?,
            b'A'..=b'Z' | b'a'..=b'z' | b'_' | b'!' => self.read_keyword(),
            _ => {
                return Err(StepError::lexer(
                    self.line,
                    self.col,
                    format!("unexpected character: '{}'", ch as char),
                ));
            }
        };

        Ok(Some(SpannedToken {
            token,
            pos: start_pos,
        }))
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    fn peek_char(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.input.get(self.pos).copied()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    /// Consume ASCII digits into `out`.
    fn take_digits(&mut self, out: &mut String) -> usize {
        let mut n = 0;
        while let Some(ch) = self.peek_char().filter(u8::is_ascii_digit) {
            out.push(ch as char);
            self.advance();
            n += 1;
        }
        n
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.peek_char().is_some_and(|ch| ch.is_ascii_whitespace()) {
                self.advance();
            }

            if self.peek_char() == Some(b'/') && self.peek_at(1) == Some(b'*') {
                self.advance();
                self.advance();
                while self.pos < self.input.len() {
                    if self.peek_char() == Some(b'*') && self.peek_at(1) == Some(b'/') {
                        self.advance();
                        self.advance();
                        break;
                    }
                    self.advance();
                }
                continue;
            }

            break;
        }
    }

    fn read_entity_ref(&mut self) -> Result<Token, StepError> {
        let (line, col) = (self.line, self.col);
        self.advance(); // '#'

        let mut digits = String::new();
        if self.take_digits(&mut digits) == 0 {
            return Err(StepError::lexer(line, col, "expected digits after '#'"));
        }

        let id: u64 = digits
            .parse()
            .map_err(|_| StepError::lexer(line, col, format!("invalid entity ID: {digits}")))?;

        Ok(Token::EntityRef(id))
    }

    fn read_string(&mut self) -> Result<Token, StepError> {
        let (line, col) = (self.line, self.col);
        self.advance(); // opening quote

        let mut content = Vec::new();
        loop {
            match self.peek_char() {
                None => return Err(StepError::lexer(line, col, "unterminated string")),
                Some(b'\'') => {
                    self.advance();
                    // '' is an escaped quote
                    if self.peek_char() == Some(b'\'') {
                        content.push(b'\'');
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(ch) => {
                    content.push(ch);
                    self.advance();
                }
            }
        }

        Ok(Token::String(String::from_utf8_lossy(&content).into_owned()))
    }

    fn read_enum(&mut self) -> Result<Token, StepError> {
        let (line, col) = (self.line, self.col);
        self.advance(); // opening '.'

        let mut name = String::new();
        loop {
            match self.peek_char() {
                Some(b'.') => {
                    self.advance();
                    break;
                }
                Some(ch) if ch.is_ascii_alphanumeric() || ch == b'_' => {
                    name.push(ch as char);
                    self.advance();
                }
                Some(ch) => {
                    return Err(StepError::lexer(
                        line,
                        col,
                        format!("invalid character in enumeration: '{}'", ch as char),
                    ));
                }
                None => return Err(StepError::lexer(line, col, "unterminated enumeration")),
            }
        }

        if name.is_empty() {
            return Err(StepError::lexer(line, col, "empty enumeration"));
        }

        Ok(Token::Enum(name))
    }

    fn read_number(&mut self) -> Result<Token, StepError> {
        let (line, col) = (self.line, self.col);

        let mut text = String::new();
        let mut is_real = false;

        if let Some(ch @ (b'-' | b'+')) = self.peek_char() {
            text.push(ch as char);
            self.advance();
        }

        self.take_digits(&mut text);

        // A '.' here belongs to the number (`1.`, `1.5`) unless it opens an
        // enumeration, which never directly follows digits in valid input.
        let opens_enum = self
            .peek_at(1)
            .is_some_and(|c| c.is_ascii_alphabetic() && c != b'E' && c != b'e');
        if self.peek_char() == Some(b'.') && !opens_enum {
            is_real = true;
            text.push('.');
            self.advance();
            self.take_digits(&mut text);
        }

        if let Some(ch @ (b'E' | b'e')) = self.peek_char() {
            is_real = true;
            text.push(ch as char);
            self.advance();
            if let Some(sign @ (b'-' | b'+')) = self.peek_char() {
                text.push(sign as char);
                self.advance();
            }
            self.take_digits(&mut text);
        }

        if is_real {
            // Part 21 allows "1.E-07"; give the fraction an explicit digit.
            let normalised = text.replace(".E", ".0E").replace(".e", ".0e");
            let val: f64 = normalised
                .parse()
                .map_err(|_| StepError::lexer(line, col, format!("invalid real number: {text}")))?;
            Ok(Token::Real(val))
        } else {
            let val: i64 = text
                .parse()
                .map_err(|_| StepError::lexer(line, col, format!("invalid integer: {text}")))?;
            Ok(Token::Integer(val))
        }
    }

    fn read_keyword(&mut self) -> Token {
        let mut name = String::new();
        // Keywords include hyphens for ISO-10303-21 / END-ISO-10303-21 and a
        // leading '!' for user-defined entities.
        while let Some(ch) = self
            .peek_char()
            .filter(|&c| c.is_ascii_alphanumeric() || c == b'_' || c == b'-' || c == b'!')
        {
            name.push(ch.to_ascii_uppercase() as char);
            self.advance();
        }
        Token::Keyword(name)
    }
}
