//! Lexical analysis for Bramble BASIC source
//!
//! Produces a stream of [`Token`]s tagged with source positions. Identifiers
//! carry the type their sigil declares (`%` integer, `$` string, `&` byte,
//! none real); `FN`/`PROC` routine names are delivered as keyword tokens with
//! the full name in the lexeme.

pub mod keyword;
pub mod lexer;
pub mod token;

pub use keyword::Keyword;
pub use lexer::Lexer;
pub use token::{IdentType, Token, TokenKind};
