//! PRINT

use crate::context::Parser;
use crate::expr_parser;
use crate::type_if;
use bramble_common::Result;
use bramble_ir::Opcode;
use bramble_lexer::{Keyword, TokenKind};

/// True if the current token can begin an expression
fn starts_expression(p: &Parser) -> bool {
    match &p.token().kind {
        TokenKind::Integer(_)
        | TokenKind::Real(_)
        | TokenKind::Str(_)
        | TokenKind::Identifier { .. } => true,
        TokenKind::Operator(op) => matches!(op.as_str(), "(" | "-" | "~"),
        TokenKind::Keyword { keyword, .. } => matches!(
            keyword,
            Keyword::Not
                | Keyword::True
                | Keyword::False
                | Keyword::Err
                | Keyword::Abs
                | Keyword::Sgn
                | Keyword::Fn
        ),
        _ => false,
    }
}

/// `PRINT [~]expr [; [~]expr ...] [;]`. A `~` prints in hex and a trailing
/// `;` suppresses the newline.
pub fn print_stmt(p: &mut Parser) -> Result<()> {
    p.advance()?;

    while starts_expression(p) {
        if p.token().is_operator("~") {
            p.advance()?;
            let e = expr_parser::expression(p)?;
            let e = type_if::to_hex_string(p, e)?;
            type_if::print(p, e)?;
        } else {
            let e = expr_parser::expression(p)?;
            type_if::print(p, e)?;
        }

        if p.token().is_operator(";") {
            p.advance()?;
            if !starts_expression(p) {
                // trailing ; keeps the cursor on the line
                return Ok(());
            }
        } else {
            break;
        }
    }

    p.section().add_instr_no_arg(Opcode::PrintNl);
    Ok(())
}
