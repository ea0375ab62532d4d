//! Lexical analysis for the query language
//!
//! Converts a raw query string into a flat token stream ending in [`TokenKind::Eof`].

use crate::errors::QueryError;

/// Token kinds in the query language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Run of ASCII letters, digits, `_`, `-` or `.` (e.g. `PROJ-123`, `sort_key`)
    Ident,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Equals,
    Comma,
    Semicolon,
    /// Double-quoted literal; `value` holds the unescaped content
    Str,
    /// End of input
    Eof,
}

impl TokenKind {
    /// Human-readable name for diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Ident => "identifier",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LBrace => "'{'",
            TokenKind::RBrace => "'}'",
            TokenKind::Equals => "'='",
            TokenKind::Comma => "','",
            TokenKind::Semicolon => "';'",
            TokenKind::Str => "string",
            TokenKind::Eof => "end of input",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    /// Byte offset of the token's first character.
    pub position: usize,
}

impl Token {
    fn new(kind: TokenKind, value: impl Into<String>, position: usize) -> Self {
        Token {
            kind,
            value: value.into(),
            position,
        }
    }
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.')
}

/// Lexer for tokenizing query strings
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// Tokenize the entire input string. The last token is always `Eof`.
    pub fn tokenize(input: &str) -> Result<Vec<Token>, QueryError> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();

        while let Some(token) = lexer.next_token()? {
            tokens.push(token);
        }
        tokens.push(Token::new(TokenKind::Eof, "", input.len()));

        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>, QueryError> {
        self.skip_whitespace();

        let Some(ch) = self.current_char() else {
            return Ok(None);
        };
        let start = self.position;

        let punct = match ch {
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            '{' => Some(TokenKind::LBrace),
            '}' => Some(TokenKind::RBrace),
            '=' => Some(TokenKind::Equals),
            ',' => Some(TokenKind::Comma),
            ';' => Some(TokenKind::Semicolon),
            _ => None,
        };
        if let Some(kind) = punct {
            self.advance(ch);
            return Ok(Some(Token::new(kind, ch.to_string(), start)));
        }

        if ch == '"' {
            return self.read_string().map(Some);
        }

        if is_ident_char(ch) {
            return Ok(Some(self.read_ident()));
        }

        Err(QueryError::syntax(
            format!("unexpected character '{}'", ch),
            start,
            ch.to_string(),
        ))
    }

    fn read_ident(&mut self) -> Token {
        let start = self.position;
        while let Some(ch) = self.current_char() {
            if !is_ident_char(ch) {
                break;
            }
            self.advance(ch);
        }
        Token::new(TokenKind::Ident, &self.input[start..self.position], start)
    }

    fn read_string(&mut self) -> Result<Token, QueryError> {
        let start = self.position;
        self.advance('"');

        let mut value = String::new();
        while let Some(ch) = self.current_char() {
            self.advance(ch);
            match ch {
                '"' => return Ok(Token::new(TokenKind::Str, value, start)),
                '\\' if self.current_char() == Some('"') => {
                    self.advance('"');
                    value.push('"');
                }
                other => value.push(other),
            }
        }

        Err(QueryError::syntax(
            "unterminated string literal",
            start,
            &self.input[start..],
        ))
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if !ch.is_whitespace() {
                break;
            }
            self.advance(ch);
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn advance(&mut self, ch: char) {
        self.position += ch.len_utf8();
    }
}
