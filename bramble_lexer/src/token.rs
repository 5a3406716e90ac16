//! Token definitions for the Bramble lexer

use crate::keyword::Keyword;
use bramble_common::Position;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The scalar type an identifier's sigil declares.
///
/// BASIC variable names carry their type: `count%` is an integer, `name$` a
/// string, `flag&` a byte, and a bare name is a real.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentType {
    Int,
    Real,
    Str,
    Byte,
}

impl fmt::Display for IdentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentType::Int => write!(f, "integer"),
            IdentType::Real => write!(f, "real"),
            IdentType::Str => write!(f, "string"),
            IdentType::Byte => write!(f, "byte"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    /// Integer literal, decimal or `&`-prefixed hex
    Integer(i32),
    /// Real literal
    Real(f64),
    /// String literal with `""` escapes resolved
    Str(String),
    /// Identifier with the type its sigil declares
    Identifier { name: String, id_type: IdentType },
    /// Operator or punctuation, e.g. `+`, `<>`, `>>>`, `(`, `:`
    Operator(String),
    /// Keyword; `FN`/`PROC` keywords keep the full name in the lexeme and
    /// carry the return type declared by the name's sigil
    Keyword {
        keyword: Keyword,
        id_type: Option<IdentType>,
    },
    Eof,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub pos: Position,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, pos: Position) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            pos,
        }
    }

    pub fn eof(pos: Position) -> Self {
        Self::new(TokenKind::Eof, "", pos)
    }

    /// True if this token is the given operator
    pub fn is_operator(&self, text: &str) -> bool {
        matches!(&self.kind, TokenKind::Operator(op) if op == text)
    }

    /// True if this token is the given keyword
    pub fn is_keyword(&self, kw: Keyword) -> bool {
        matches!(&self.kind, TokenKind::Keyword { keyword, .. } if *keyword == kw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_predicates() {
        let pos = Position::start();
        let tok = Token::new(TokenKind::Operator("<>".to_string()), "<>", pos);
        assert!(tok.is_operator("<>"));
        assert!(!tok.is_operator("<"));

        let tok = Token::new(
            TokenKind::Keyword {
                keyword: Keyword::Print,
                id_type: None,
            },
            "PRINT",
            pos,
        );
        assert!(tok.is_keyword(Keyword::Print));
        assert!(!tok.is_keyword(Keyword::Dim));
    }
}
