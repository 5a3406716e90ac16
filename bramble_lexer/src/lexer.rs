//! Main lexer implementation
//!
//! The parser drives the lexer one token at a time: it peeks at the current
//! token and advances with [`Lexer::get`]. Line and column numbers are
//! tracked for every token so errors can point back into the source.

use crate::keyword::Keyword;
use crate::token::{IdentType, Token, TokenKind};
use bramble_common::{Error, ErrorKind, Position, Result};
use log::trace;

#[derive(Debug)]
pub struct Lexer {
    stream_name: String,
    chars: Vec<char>,
    index: usize,
    pos: Position,
    current: Token,
}

impl Lexer {
    pub fn new(source: &str, stream_name: impl Into<String>) -> Result<Self> {
        let mut lexer = Self {
            stream_name: stream_name.into(),
            chars: source.chars().collect(),
            index: 0,
            pos: Position::start(),
            current: Token::eof(Position::start()),
        };
        lexer.get()?;
        Ok(lexer)
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// The token the lexer is currently positioned on
    pub fn current(&self) -> &Token {
        &self.current
    }

    /// Position of the current token
    pub fn pos(&self) -> Position {
        self.current.pos
    }

    /// Advance to the next token and return it
    pub fn get(&mut self) -> Result<&Token> {
        self.current = self.scan_token()?;
        trace!("token '{}' at {}", self.current.lexeme, self.current.pos);
        Ok(&self.current)
    }

    fn scan_token(&mut self) -> Result<Token> {
        self.skip_whitespace_and_comments();

        let start = self.pos;
        let ch = match self.peek_char() {
            None => return Ok(Token::eof(start)),
            Some(ch) => ch,
        };

        if ch.is_ascii_digit() {
            return self.read_number(start);
        }
        if ch == '&' && self.peek_char_at(1).is_some_and(|c| c.is_ascii_hexdigit()) {
            return self.read_hex_number(start);
        }
        if ch == '"' {
            return self.read_string(start);
        }
        if ch.is_ascii_alphabetic() || ch == '_' {
            return self.read_identifier(start);
        }
        self.read_operator(start)
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.chars.get(self.index).copied()?;
        self.index += 1;
        if ch == '\n' {
            self.pos.line += 1;
            self.pos.column = 1;
        } else {
            self.pos.column += 1;
        }
        Some(ch)
    }

    fn peek_char(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.peek_char().is_some_and(|c| c.is_whitespace()) {
                self.advance_char();
            }
            // REM swallows the rest of the line
            if self.lookahead_is_rem() {
                while self.peek_char().is_some_and(|c| c != '\n') {
                    self.advance_char();
                }
                continue;
            }
            break;
        }
    }

    fn lookahead_is_rem(&self) -> bool {
        self.peek_char() == Some('R')
            && self.peek_char_at(1) == Some('E')
            && self.peek_char_at(2) == Some('M')
            && !self
                .peek_char_at(3)
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    fn read_number(&mut self, start: Position) -> Result<Token> {
        let mut text = String::new();
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.advance_char().unwrap());
        }

        let is_real = self.peek_char() == Some('.')
            && self.peek_char_at(1).is_some_and(|c| c.is_ascii_digit());
        if is_real {
            text.push(self.advance_char().unwrap());
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                text.push(self.advance_char().unwrap());
            }
            let value: f64 = text
                .parse()
                .map_err(|_| Error::new(ErrorKind::NumericExpected, start))?;
            return Ok(Token::new(TokenKind::Real(value), text, start));
        }

        let value: i64 = text
            .parse()
            .map_err(|_| Error::new(ErrorKind::NumericExpected, start))?;
        if value > i32::MAX as i64 {
            return Err(Error::new(ErrorKind::NumericExpected, start));
        }
        Ok(Token::new(TokenKind::Integer(value as i32), text, start))
    }

    fn read_hex_number(&mut self, start: Position) -> Result<Token> {
        self.advance_char();
        let mut text = String::from("&");
        while self.peek_char().is_some_and(|c| c.is_ascii_hexdigit()) {
            text.push(self.advance_char().unwrap());
        }
        let value = u32::from_str_radix(&text[1..], 16)
            .map_err(|_| Error::new(ErrorKind::NumericExpected, start))?;
        Ok(Token::new(TokenKind::Integer(value as i32), text, start))
    }

    fn read_string(&mut self, start: Position) -> Result<Token> {
        self.advance_char();
        let mut value = String::new();
        loop {
            match self.advance_char() {
                None | Some('\n') => {
                    return Err(Error::new(
                        ErrorKind::ExpectedToken {
                            expected: "'\"'".to_string(),
                            found: "end of line".to_string(),
                        },
                        start,
                    ));
                }
                Some('"') => {
                    // "" is an escaped quote
                    if self.peek_char() == Some('"') {
                        self.advance_char();
                        value.push('"');
                    } else {
                        break;
                    }
                }
                Some(ch) => value.push(ch),
            }
        }
        let lexeme = format!("\"{}\"", value);
        Ok(Token::new(TokenKind::Str(value), lexeme, start))
    }

    fn read_identifier(&mut self, start: Position) -> Result<Token> {
        let mut name = String::new();
        while self
            .peek_char()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            name.push(self.advance_char().unwrap());
        }

        let id_type = match self.peek_char() {
            Some('%') => {
                self.advance_char();
                name.push('%');
                IdentType::Int
            }
            Some('$') => {
                self.advance_char();
                name.push('$');
                IdentType::Str
            }
            Some('&') => {
                self.advance_char();
                name.push('&');
                IdentType::Byte
            }
            _ => IdentType::Real,
        };

        // FN and PROC attach directly to the routine name, e.g. FNmax%.
        // The whole name stays in the lexeme; the sigil declares the
        // function's return type.
        if name.starts_with("FN") && name.len() > 2 {
            return Ok(Token::new(
                TokenKind::Keyword {
                    keyword: Keyword::Fn,
                    id_type: Some(id_type),
                },
                name,
                start,
            ));
        }
        if name.starts_with("PROC") && name.len() > 4 {
            return Ok(Token::new(
                TokenKind::Keyword {
                    keyword: Keyword::Proc,
                    id_type: None,
                },
                name,
                start,
            ));
        }

        if id_type == IdentType::Real {
            if let Some(keyword) = Keyword::from_str(&name) {
                return Ok(Token::new(
                    TokenKind::Keyword {
                        keyword,
                        id_type: None,
                    },
                    name,
                    start,
                ));
            }
        }

        Ok(Token::new(
            TokenKind::Identifier {
                name: name.clone(),
                id_type,
            },
            name,
            start,
        ))
    }

    fn read_operator(&mut self, start: Position) -> Result<Token> {
        let three: String = (0..3).filter_map(|i| self.peek_char_at(i)).collect();
        if three == ">>>" {
            for _ in 0..3 {
                self.advance_char();
            }
            return Ok(Token::new(TokenKind::Operator(three.clone()), three, start));
        }

        let two: String = (0..2).filter_map(|i| self.peek_char_at(i)).collect();
        if matches!(two.as_str(), "<>" | "<=" | ">=" | "<<" | ">>" | "+=" | "-=" | "<-" | ":=") {
            for _ in 0..2 {
                self.advance_char();
            }
            return Ok(Token::new(TokenKind::Operator(two.clone()), two, start));
        }

        let ch = self.advance_char().unwrap();
        if matches!(
            ch,
            '+' | '-' | '*' | '/' | '^' | '=' | '<' | '>' | '(' | ')' | '{' | '}' | ',' | ';'
                | ':' | '.' | '~' | '!' | '?'
        ) {
            let text = ch.to_string();
            return Ok(Token::new(TokenKind::Operator(text.clone()), text, start));
        }

        Err(Error::new(
            ErrorKind::ExpectedToken {
                expected: "a token".to_string(),
                found: ch.to_string(),
            },
            start,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn all_tokens(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source, "test").unwrap();
        let mut kinds = vec![lexer.current().kind.clone()];
        while lexer.current().kind != TokenKind::Eof {
            lexer.get().unwrap();
            kinds.push(lexer.current().kind.clone());
        }
        kinds.pop();
        kinds
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            all_tokens("10 3.25 &FF"),
            vec![
                TokenKind::Integer(10),
                TokenKind::Real(3.25),
                TokenKind::Integer(255),
            ]
        );
    }

    #[test]
    fn test_identifier_sigils() {
        assert_eq!(
            all_tokens("count% name$ flag& x"),
            vec![
                TokenKind::Identifier {
                    name: "count%".to_string(),
                    id_type: IdentType::Int
                },
                TokenKind::Identifier {
                    name: "name$".to_string(),
                    id_type: IdentType::Str
                },
                TokenKind::Identifier {
                    name: "flag&".to_string(),
                    id_type: IdentType::Byte
                },
                TokenKind::Identifier {
                    name: "x".to_string(),
                    id_type: IdentType::Real
                },
            ]
        );
    }

    #[test]
    fn test_fn_proc_names() {
        let kinds = all_tokens("FNmax% PROCshow");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword {
                    keyword: Keyword::Fn,
                    id_type: Some(IdentType::Int)
                },
                TokenKind::Keyword {
                    keyword: Keyword::Proc,
                    id_type: None
                },
            ]
        );

        let mut lexer = Lexer::new("FNmax%(1, 2)", "test").unwrap();
        assert_eq!(lexer.current().lexeme, "FNmax%");
        lexer.get().unwrap();
        assert!(lexer.current().is_operator("("));
    }

    #[test]
    fn test_operators_longest_match() {
        assert_eq!(
            all_tokens("<< >> >>> <= <> <-"),
            vec![
                TokenKind::Operator("<<".to_string()),
                TokenKind::Operator(">>".to_string()),
                TokenKind::Operator(">>>".to_string()),
                TokenKind::Operator("<=".to_string()),
                TokenKind::Operator("<>".to_string()),
                TokenKind::Operator("<-".to_string()),
            ]
        );
    }

    #[test_case::test_case("+=" ; "plus assign")]
    #[test_case::test_case("-=" ; "minus assign")]
    #[test_case::test_case(":=" ; "becomes")]
    #[test_case::test_case(">=" ; "greater equal")]
    fn test_two_char_operator(op: &str) {
        assert_eq!(all_tokens(op), vec![TokenKind::Operator(op.to_string())]);
    }

    #[test]
    fn test_string_escape() {
        assert_eq!(
            all_tokens(r#""say ""hi""""#),
            vec![TokenKind::Str("say \"hi\"".to_string())]
        );
    }

    #[test]
    fn test_rem_comment() {
        assert_eq!(
            all_tokens("PRINT 1 REM the rest is ignored\nPRINT 2"),
            vec![
                TokenKind::Keyword {
                    keyword: Keyword::Print,
                    id_type: None
                },
                TokenKind::Integer(1),
                TokenKind::Keyword {
                    keyword: Keyword::Print,
                    id_type: None
                },
                TokenKind::Integer(2),
            ]
        );
    }

    #[test]
    fn test_line_tracking() {
        let mut lexer = Lexer::new("PRINT\nx% = 1", "test").unwrap();
        assert_eq!(lexer.current().pos.line, 1);
        lexer.get().unwrap();
        assert_eq!(lexer.current().pos.line, 2);
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("\"oops", "test").unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ExpectedToken { .. }));
    }
}
