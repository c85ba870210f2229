//! Part 21 parser: builds a raw entity graph from tokens.
//!
//! The parser constructs a graph of STEP entities without interpreting their
//! semantics. Each entity has an ID, a type name, and a list of arguments.
//! Complex instances (`#7 = ( A() B(1) );`) keep every partial record.

use crate::error::StepError;
use crate::lexer::{Lexer, SpannedToken, Token};
use std::collections::HashMap;

/// A single argument value in a STEP entity.
#[derive(Debug, Clone, PartialEq)]
pub enum StepValue {
    /// Entity reference (e.g., `#123`).
    EntityRef(u64),
    /// String literal.
    String(String),
    /// Real number.
    Real(f64),
    /// Integer number.
    Integer(i64),
    /// Enumeration (e.g., `.TRUE.`).
    Enum(String),
    /// List of values (nested in parentheses).
    List(Vec<StepValue>),
    /// Derived/computed value (`*`).
    Derived,
    /// Null/unset value (`$`).
    Null,
    /// Typed value: `TYPE_NAME(args)`, e.g. `LENGTH_MEASURE(1.E-07)`.
    Typed {
        /// The type name.
        type_name: String,
        /// Arguments.
        args: Vec<StepValue>,
    },
}

impl StepValue {
    /// Try to get as an entity reference.
    pub fn as_entity_ref(&self) -> Option<u64> {
        match self {
            StepValue::EntityRef(id) => Some(*id),
            _ => None,
        }
    }

    /// Try to get as a real number (also accepts integers and typed measures).
    pub fn as_real(&self) -> Option<f64> {
        match self {
            StepValue::Real(v) => Some(*v),
            StepValue::Integer(v) => Some(*v as f64),
            StepValue::Typed { args, .. } if args.len() == 1 => args[0].as_real(),
            _ => None,
        }
    }

    /// Try to get as a string.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            StepValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as an enum.
    pub fn as_enum(&self) -> Option<&str> {
        match self {
            StepValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as a boolean enumeration (`.T.` / `.F.`).
    pub fn as_bool(&self) -> Option<bool> {
        match self.as_enum()? {
            "T" | "TRUE" => Some(true),
            "F" | "FALSE" => Some(false),
            _ => None,
        }
    }

    /// Try to get as a list.
    pub fn as_list(&self) -> Option<&[StepValue]> {
        match self {
            StepValue::List(v) => Some(v),
            _ => None,
        }
    }

    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, StepValue::Null)
    }
}

/// One partial record of a complex entity instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    /// Partial type name.
    pub type_name: String,
    /// Arguments of this partial record.
    pub args: Vec<StepValue>,
}

/// A parsed STEP entity.
///
/// For complex instances `type_name` and `args` mirror the first record and
/// `complex` holds all of them.
#[derive(Debug, Clone)]
pub struct StepEntity {
    /// Entity ID (from `#123`).
    pub id: u64,
    /// Entity type name (e.g., `CARTESIAN_POINT`).
    pub type_name: String,
    /// Arguments to the entity constructor.
    pub args: Vec<StepValue>,
    /// Partial records of a complex instance; empty for simple ones.
    pub complex: Vec<EntityRecord>,
}

/// Borrowed view of one record of an entity, simple or partial.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    /// Owning entity ID.
    pub id: u64,
    /// Record type name.
    pub type_name: &'a str,
    /// Record arguments.
    pub args: &'a [StepValue],
}

impl StepEntity {
    /// True if this entity is, or for complex instances contains, `type_name`.
    pub fn is_a(&self, type_name: &str) -> bool {
        self.type_name == type_name || self.complex.iter().any(|r| r.type_name == type_name)
    }

    /// The record named `type_name`, if this entity has one.
    pub fn record(&self, type_name: &str) -> Option<RecordView<'_>> {
        if self.complex.is_empty() {
            return (self.type_name == type_name).then(|| RecordView {
                id: self.id,
                type_name: &self.type_name,
                args: &self.args,
            });
        }
        self.complex
            .iter()
            .find(|r| r.type_name == type_name)
            .map(|r| RecordView {
                id: self.id,
                type_name: &r.type_name,
                args: &r.args,
            })
    }
}

/// The complete parsed content of a STEP file.
#[derive(Debug, Clone)]
pub struct StepFile {
    /// Header section contents (FILE_DESCRIPTION, FILE_NAME, FILE_SCHEMA).
    pub header: Vec<StepEntity>,
    /// Data section entities, indexed by ID.
    pub entities: HashMap<u64, StepEntity>,
}

impl StepFile {
    /// Get an entity by ID.
    pub fn get(&self, id: u64) -> Option<&StepEntity> {
        self.entities.get(&id)
    }

    /// Get an entity by ID, returning an error if not found.
    pub fn require(&self, id: u64) -> Result<&StepEntity, StepError> {
        self.entities.get(&id).ok_or(StepError::MissingEntity(id))
    }

    /// Get all entities of a given type, ordered by ID.
    pub fn entities_of_type(&self, type_name: &str) -> Vec<&StepEntity> {
        let mut found: Vec<&StepEntity> = self
            .entities
            .values()
            .filter(|e| e.is_a(type_name))
            .collect();
        found.sort_by_key(|e| e.id);
        found
    }

    /// First header entity with the given type.
    pub fn header_entity(&self, type_name: &str) -> Option<&StepEntity> {
        self.header.iter().find(|e| e.type_name == type_name)
    }
}

/// Parser for Part 21 STEP files.
pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    /// Parse a STEP file from bytes.
    pub fn parse(input: &[u8]) -> Result<StepFile, StepError> {
        let mut lexer = Lexer::new(input);
        let tokens = lexer.tokenize()?;
        let mut parser = Parser { tokens, pos: 0 };
        parser.parse_file()
    }

    fn parse_file(&mut self) -> Result<StepFile, StepError> {
        let mut header = Vec::new();
        let mut entities = HashMap::new();

        self.expect_keyword("ISO-10303-21")?;
        self.expect_token(&Token::Semicolon)?;

        while !self.is_at_end() {
            if self.check_keyword("HEADER") {
                self.advance();
                self.expect_token(&Token::Semicolon)?;
                header = self.parse_section_entities()?;
                self.expect_keyword("ENDSEC")?;
                self.expect_token(&Token::Semicolon)?;
            } else if self.check_keyword("DATA") {
                self.advance();
                // DATA may carry a parameter list in newer editions
                if self.check_token(&Token::LParen) {
                    self.parse_args()?;
                }
                self.expect_token(&Token::Semicolon)?;
                for entity in self.parse_data_section()? {
                    if entities.insert(entity.id, entity).is_some() {
                        return Err(self.error(None, "duplicate entity id"));
                    }
                }
                self.expect_keyword("ENDSEC")?;
                self.expect_token(&Token::Semicolon)?;
            } else if self.check_keyword("END-ISO-10303-21") {
                self.advance();
                self.expect_token(&Token::Semicolon)?;
                break;
            } else {
                let tok = self.peek().map(|t| t.token.clone());
                return Err(self.error(None, format!("unexpected token: {tok:?}")));
            }
        }

        Ok(StepFile { header, entities })
    }

    fn parse_section_entities(&mut self) -> Result<Vec<StepEntity>, StepError> {
        let mut entities = Vec::new();
        while !self.check_keyword("ENDSEC") && !self.is_at_end() {
            // Header entities have no IDs, just type and args
            let Some(Token::Keyword(type_name)) = self.peek().map(|t| t.token.clone()) else {
                break;
            };
            self.advance();
            let args = self.parse_args()?;
            self.expect_token(&Token::Semicolon)?;
            entities.push(StepEntity {
                id: 0,
                type_name,
                args,
                complex: Vec::new(),
            });
        }
        Ok(entities)
    }

    fn parse_data_section(&mut self) -> Result<Vec<StepEntity>, StepError> {
        let mut entities = Vec::new();
        while !self.check_keyword("ENDSEC") && !self.is_at_end() {
            let Some(Token::EntityRef(id)) = self.peek().map(|t| t.token.clone()) else {
                break;
            };
            self.advance();
            self.expect_token(&Token::Equals)?;

            let entity = match self.peek().map(|t| t.token.clone()) {
                Some(Token::Keyword(type_name)) => {
                    self.advance();
                    let args = self.parse_args()?;
                    StepEntity {
                        id,
                        type_name,
                        args,
                        complex: Vec::new(),
                    }
                }
                Some(Token::LParen) => self.parse_complex(id)?,
                other => {
                    return Err(self.error(Some(id), format!("expected type name, got {other:?}")));
                }
            };
            self.expect_token(&Token::Semicolon)?;
            entities.push(entity);
        }
        Ok(entities)
    }

    fn parse_complex(&mut self, id: u64) -> Result<StepEntity, StepError> {
        self.expect_token(&Token::LParen)?;
        let mut records = Vec::new();
        while let Some(Token::Keyword(type_name)) = self.peek().map(|t| t.token.clone()) {
            self.advance();
            let args = self.parse_args()?;
            records.push(EntityRecord { type_name, args });
        }
        self.expect_token(&Token::RParen)?;

        let Some(first) = records.first() else {
            return Err(self.error(Some(id), "empty complex entity"));
        };
        Ok(StepEntity {
            id,
            type_name: first.type_name.clone(),
            args: first.args.clone(),
            complex: records,
        })
    }

    fn parse_args(&mut self) -> Result<Vec<StepValue>, StepError> {
        self.expect_token(&Token::LParen)?;
        let mut args = Vec::new();
        if !self.check_token(&Token::RParen) {
            args.push(self.parse_value()?);
            while self.check_token(&Token::Comma) {
                self.advance();
                args.push(self.parse_value()?);
            }
        }
        self.expect_token(&Token::RParen)?;
        Ok(args)
    }

    fn parse_value(&mut self) -> Result<StepValue, StepError> {
        let Some(token) = self.peek().map(|t| t.token.clone()) else {
            return Err(self.error(None, "unexpected end of input"));
        };
        let value = match token {
            Token::EntityRef(id) => StepValue::EntityRef(id),
            Token::String(s) => StepValue::String(s),
            Token::Real(v) => StepValue::Real(v),
            Token::Integer(v) => StepValue::Integer(v),
            Token::Enum(s) => StepValue::Enum(s),
            Token::Asterisk => StepValue::Derived,
            Token::Dollar => StepValue::Null,
            Token::LParen => return Ok(StepValue::List(self.parse_args()?)),
            Token::Keyword(type_name) => {
                self.advance();
                let args = self.parse_args()?;
                return Ok(StepValue::Typed { type_name, args });
            }
            other => return Err(self.error(None, format!("unexpected value: {other:?}"))),
        };
        self.advance();
        Ok(value)
    }

    fn error(&self, entity_id: Option<u64>, message: impl Into<String>) -> StepError {
        let message = message.into();
        match self.peek().or_else(|| self.tokens.last()) {
            Some(tok) => StepError::parser(
                entity_id,
                format!("{message} (line {}, column {})", tok.pos.line, tok.pos.col),
            ),
            None => StepError::parser(entity_id, message),
        }
    }

    fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check_token(&self, expected: &Token) -> bool {
        self.peek().is_some_and(|t| &t.token == expected)
    }

    fn check_keyword(&self, name: &str) -> bool {
        matches!(self.peek(), Some(SpannedToken { token: Token::Keyword(k), .. }) if k == name)
    }

    fn expect_token(&mut self, expected: &Token) -> Result<(), StepError> {
        if self.check_token(expected) {
            self.advance();
            Ok(())
        } else {
            let actual = self.peek().map(|t| t.token.clone());
            Err(self.error(None, format!("expected {expected:?}, got {actual:?}")))
        }
    }

    fn expect_keyword(&mut self, name: &str) -> Result<(), StepError> {
        if self.check_keyword(name) {
            self.advance();
            Ok(())
        } else {
            let actual = self.peek().map(|t| t.token.clone());
            Err(self.error(None, format!("expected keyword '{name}', got {actual:?}")))
        }
    }
}
