//! Parser for the query language
//!
//! Recursive descent with one token of lookahead over the stream produced by
//! [`Lexer`]. Grammar:
//!
//! ```text
//! query      := statement (";" statement)* ";"?
//! statement  := OPNAME "(" arglist? ")" projection?
//! arglist    := arg ("," arg)*
//! arg        := IDENT "=" value | value
//! value      := IDENT | STRING
//! projection := "{" IDENT+ "}"
//! ```

use super::lexer::{Lexer, Token, TokenKind};
use super::QuerySchema;
use crate::errors::QueryError;
use tracing::debug;

/// A parsed batch of one or more statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub statements: Vec<Statement>,
}

/// One operation invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub operation: String,
    pub args: Vec<Arg>,
    /// Expanded, deduplicated projection. `None` when no `{ ... }` block was
    /// given, meaning the default preset applies.
    pub fields: Option<Vec<String>>,
}

impl Statement {
    pub fn positional(&self) -> impl Iterator<Item = &str> {
        self.args
            .iter()
            .filter(|a| a.key.is_none())
            .map(|a| a.value.as_str())
    }

    /// First positional argument.
    pub fn first_positional(&self) -> Option<&str> {
        self.positional().next()
    }

    /// Last value given for a named argument.
    pub fn named(&self, key: &str) -> Option<&str> {
        self.args
            .iter()
            .rev()
            .find(|a| a.key.as_deref() == Some(key))
            .map(|a| a.value.as_str())
    }

    pub fn named_args(&self) -> impl Iterator<Item = (&str, &str)> {
        self.args
            .iter()
            .filter_map(|a| a.key.as_deref().map(|k| (k, a.value.as_str())))
    }
}

/// `key=value` when `key` is set, otherwise a positional value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    pub key: Option<String>,
    pub value: String,
}

impl Arg {
    pub fn positional(value: impl Into<String>) -> Self {
        Arg {
            key: None,
            value: value.into(),
        }
    }

    pub fn named(key: impl Into<String>, value: impl Into<String>) -> Self {
        Arg {
            key: Some(key.into()),
            value: value.into(),
        }
    }
}

/// Parser for building a [`Query`] from tokens
pub struct Parser<'s> {
    tokens: Vec<Token>,
    position: usize,
    schema: &'s QuerySchema,
}

impl<'s> Parser<'s> {
    pub fn new(tokens: Vec<Token>, schema: &'s QuerySchema) -> Self {
        Parser {
            tokens,
            position: 0,
            schema,
        }
    }

    /// Tokenize and parse a query string.
    pub fn parse(input: &str, schema: &'s QuerySchema) -> Result<Query, QueryError> {
        let tokens = Lexer::tokenize(input)?;
        let mut parser = Parser::new(tokens, schema);
        let query = parser.parse_query()?;
        debug!(statements = query.statements.len(), "parsed query");
        Ok(query)
    }

    fn parse_query(&mut self) -> Result<Query, QueryError> {
        let mut statements = Vec::new();

        loop {
            while self.match_token(TokenKind::Semicolon) {
                self.advance();
            }
            if self.is_at_end() {
                break;
            }

            statements.push(self.parse_statement()?);

            if !self.match_token(TokenKind::Semicolon) && !self.is_at_end() {
                return Err(self.error_here("expected ';' or end of input"));
            }
        }

        if statements.is_empty() {
            return Err(self.error_here("empty query"));
        }
        Ok(Query { statements })
    }

    fn parse_statement(&mut self) -> Result<Statement, QueryError> {
        let name = self.expect(TokenKind::Ident, "expected operation name")?;
        if !self.schema.has_operation(&name.value) {
            return Err(QueryError::syntax(
                format!("unknown operation '{}'", name.value),
                name.position,
                name.value,
            ));
        }

        self.expect(TokenKind::LParen, "expected '('")?;
        let args = self.parse_args()?;
        self.expect(TokenKind::RParen, "expected ')'")?;

        let fields = if self.match_token(TokenKind::LBrace) {
            Some(self.parse_projection()?)
        } else {
            None
        };

        Ok(Statement {
            operation: name.value,
            args,
            fields,
        })
    }

    fn parse_args(&mut self) -> Result<Vec<Arg>, QueryError> {
        let mut args = Vec::new();
        if self.match_token(TokenKind::RParen) {
            return Ok(args);
        }

        loop {
            args.push(self.parse_arg()?);
            if !self.match_token(TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok(args)
    }

    fn parse_arg(&mut self) -> Result<Arg, QueryError> {
        let token = self.current_token().clone();
        match token.kind {
            TokenKind::Str => {
                self.advance();
                Ok(Arg::positional(token.value))
            }
            TokenKind::Ident => {
                self.advance();
                if self.match_token(TokenKind::Equals) {
                    self.advance();
                    let value = self.parse_value()?;
                    Ok(Arg::named(token.value, value))
                } else {
                    Ok(Arg::positional(token.value))
                }
            }
            _ => Err(self.error_here("expected argument")),
        }
    }

    fn parse_value(&mut self) -> Result<String, QueryError> {
        if self.match_token(TokenKind::Ident) || self.match_token(TokenKind::Str) {
            let value = self.current_token().value.clone();
            self.advance();
            Ok(value)
        } else {
            Err(self.error_here("expected value after '='"))
        }
    }

    /// Parse `{ ... }`, expanding presets and validating field names.
    fn parse_projection(&mut self) -> Result<Vec<String>, QueryError> {
        let open = self.expect(TokenKind::LBrace, "expected '{'")?;
        let registry = self.schema.registry();
        let mut fields: Vec<String> = Vec::new();

        while self.match_token(TokenKind::Ident) {
            let token = self.current_token().clone();
            let names: Vec<&str> = if let Some(preset) = registry.preset(&token.value) {
                preset.fields.iter().map(|f| f.name()).collect()
            } else if let Some(field) = registry.field(&token.value) {
                vec![field.name()]
            } else {
                return Err(QueryError::syntax(
                    format!("unknown field '{}'", token.value),
                    token.position,
                    token.value,
                ));
            };
            for name in names {
                if !fields.iter().any(|f| f == name) {
                    fields.push(name.to_string());
                }
            }
            self.advance();
        }

        self.expect(TokenKind::RBrace, "expected '}' to close projection")?;
        if fields.is_empty() {
            return Err(QueryError::syntax("empty projection", open.position, "{"));
        }
        Ok(fields)
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<Token, QueryError> {
        if self.match_token(kind) {
            let token = self.current_token().clone();
            self.advance();
            Ok(token)
        } else {
            Err(self.error_here(message))
        }
    }

    fn error_here(&self, message: &str) -> QueryError {
        let token = self.current_token();
        QueryError::syntax(
            format!("{}, found {}", message, token.kind.describe()),
            token.position,
            token.value.clone(),
        )
    }

    fn match_token(&self, expected: TokenKind) -> bool {
        self.current_token().kind == expected
    }

    fn current_token(&self) -> &Token {
        // The lexer always terminates the stream with Eof.
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.position.min(last)]
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.position += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        self.current_token().kind == TokenKind::Eof
    }
}
