//! Keyword table for the Bramble source language

use serde::{Deserialize, Serialize};
use std::fmt;

/// Keywords recognised by the statement dispatcher and expression parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    Print,
    Let,
    Dim,
    Local,
    Def,
    Proc,
    Fn,
    EndProc,
    End,
    If,
    Then,
    Else,
    EndIf,
    While,
    EndWhile,
    For,
    To,
    Step,
    Next,
    Repeat,
    Until,
    OnError,
    EndError,
    Error,
    Type,
    EndType,
    As,
    Append,
    Swap,
    Sys,
    Mod,
    Div,
    And,
    Or,
    Eor,
    Not,
    True,
    False,
    Err,
    Abs,
    Sgn,
}

impl Keyword {
    /// Look up a bare keyword. `FN`/`PROC` prefixes are handled separately by
    /// the lexer because they attach to the routine name.
    pub fn from_str(text: &str) -> Option<Keyword> {
        let kw = match text {
            "PRINT" => Keyword::Print,
            "LET" => Keyword::Let,
            "DIM" => Keyword::Dim,
            "LOCAL" => Keyword::Local,
            "DEF" => Keyword::Def,
            "ENDPROC" => Keyword::EndProc,
            "END" => Keyword::End,
            "IF" => Keyword::If,
            "THEN" => Keyword::Then,
            "ELSE" => Keyword::Else,
            "ENDIF" => Keyword::EndIf,
            "WHILE" => Keyword::While,
            "ENDWHILE" => Keyword::EndWhile,
            "FOR" => Keyword::For,
            "TO" => Keyword::To,
            "STEP" => Keyword::Step,
            "NEXT" => Keyword::Next,
            "REPEAT" => Keyword::Repeat,
            "UNTIL" => Keyword::Until,
            "ONERROR" => Keyword::OnError,
            "ENDERROR" => Keyword::EndError,
            "ERROR" => Keyword::Error,
            "TYPE" => Keyword::Type,
            "ENDTYPE" => Keyword::EndType,
            "AS" => Keyword::As,
            "APPEND" => Keyword::Append,
            "SWAP" => Keyword::Swap,
            "SYS" => Keyword::Sys,
            "MOD" => Keyword::Mod,
            "DIV" => Keyword::Div,
            "AND" => Keyword::And,
            "OR" => Keyword::Or,
            "EOR" => Keyword::Eor,
            "NOT" => Keyword::Not,
            "TRUE" => Keyword::True,
            "FALSE" => Keyword::False,
            "ERR" => Keyword::Err,
            "ABS" => Keyword::Abs,
            "SGN" => Keyword::Sgn,
            _ => return None,
        };
        Some(kw)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Keyword::Print => "PRINT",
            Keyword::Let => "LET",
            Keyword::Dim => "DIM",
            Keyword::Local => "LOCAL",
            Keyword::Def => "DEF",
            Keyword::Proc => "PROC",
            Keyword::Fn => "FN",
            Keyword::EndProc => "ENDPROC",
            Keyword::End => "END",
            Keyword::If => "IF",
            Keyword::Then => "THEN",
            Keyword::Else => "ELSE",
            Keyword::EndIf => "ENDIF",
            Keyword::While => "WHILE",
            Keyword::EndWhile => "ENDWHILE",
            Keyword::For => "FOR",
            Keyword::To => "TO",
            Keyword::Step => "STEP",
            Keyword::Next => "NEXT",
            Keyword::Repeat => "REPEAT",
            Keyword::Until => "UNTIL",
            Keyword::OnError => "ONERROR",
            Keyword::EndError => "ENDERROR",
            Keyword::Error => "ERROR",
            Keyword::Type => "TYPE",
            Keyword::EndType => "ENDTYPE",
            Keyword::As => "AS",
            Keyword::Append => "APPEND",
            Keyword::Swap => "SWAP",
            Keyword::Sys => "SYS",
            Keyword::Mod => "MOD",
            Keyword::Div => "DIV",
            Keyword::And => "AND",
            Keyword::Or => "OR",
            Keyword::Eor => "EOR",
            Keyword::Not => "NOT",
            Keyword::True => "TRUE",
            Keyword::False => "FALSE",
            Keyword::Err => "ERR",
            Keyword::Abs => "ABS",
            Keyword::Sgn => "SGN",
        };
        write!(f, "{}", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_round_trip() {
        for text in ["PRINT", "DIM", "ONERROR", "ENDWHILE", "EOR"] {
            let kw = Keyword::from_str(text).unwrap();
            assert_eq!(kw.to_string(), text);
        }
        assert!(Keyword::from_str("GOSUB").is_none());
        assert!(Keyword::from_str("print").is_none());
    }
}
