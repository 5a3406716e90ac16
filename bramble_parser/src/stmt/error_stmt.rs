//! ON ERROR handlers and the ERROR statement

use super::block;
use crate::context::Parser;
use crate::exp;
use crate::expr_parser;
use crate::type_if;
use bramble_common::{Error, Result};
use bramble_lexer::Keyword;

/// `ONERROR ... ENDERROR`: collect the handler's code out of line; it is
/// appended after the end label when the section closes. Runtime errors
/// raised while the handler is live branch to it; the handler falls through
/// to the function's default return.
pub fn onerror_stmt(p: &mut Parser) -> Result<()> {
    let pos = p.pos();
    p.advance()?;

    if p.section_ref().in_error_handler {
        return Err(Error::not_supported("ONERROR", "an error handler", pos));
    }

    let label = p.section().new_label();
    p.section().start_error_handler(label)?;

    let result = (|| {
        block(p, &[Keyword::EndError])?;
        exp::return_default_value(p)
    })();
    p.section().end_error_handler();
    result
}

/// `ERROR e`: raise a runtime error with the given code
pub fn error_stmt(p: &mut Parser) -> Result<()> {
    p.advance()?;
    let e = expr_parser::expression(p)?;
    let e = type_if::to_int32(p, e)?;
    exp::generate_error(p, e)
}
