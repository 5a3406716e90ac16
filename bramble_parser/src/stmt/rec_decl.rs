//! TYPE ... ENDTYPE record declarations

use crate::context::Parser;
use crate::types::{RecType, Type};
use bramble_common::{Error, ErrorKind, Result};
use bramble_lexer::{IdentType, Keyword, TokenKind};

/// ```text
/// TYPE Point
///   x%
///   y%
///   label$
/// ENDTYPE
/// ```
/// Field offsets are assigned in declaration order, each aligned to its
/// field's requirement. Nested records use `name AS TYPE Other`.
pub fn type_stmt(p: &mut Parser) -> Result<()> {
    let pos = p.pos();
    p.advance()?;

    let TokenKind::Identifier { name, id_type } = p.token().kind.clone() else {
        return Err(Error::new(
            ErrorKind::IdExpected(p.token().lexeme.clone()),
            p.pos(),
        ));
    };
    if id_type != IdentType::Real {
        return Err(Error::new(ErrorKind::IdExpected(name), p.pos()));
    }
    if p.rec_types.contains_key(&name) {
        return Err(Error::new(ErrorKind::AlreadyDefined(name), p.pos()));
    }
    p.advance()?;

    let mut fields: Vec<(String, Type)> = Vec::new();
    loop {
        p.skip_separators()?;
        if p.at_eof() {
            return Err(Error::new(ErrorKind::CompoundNotTerminated, p.pos()));
        }
        if p.token().is_keyword(Keyword::EndType) {
            p.advance()?;
            break;
        }

        let TokenKind::Identifier {
            name: field_name,
            id_type,
        } = p.token().kind.clone()
        else {
            return Err(Error::new(
                ErrorKind::IdExpected(p.token().lexeme.clone()),
                p.pos(),
            ));
        };
        p.advance()?;

        let field_ty = if p.token().is_keyword(Keyword::As) {
            p.advance()?;
            p.expect_keyword(Keyword::Type)?;
            let TokenKind::Identifier {
                name: nested_name, ..
            } = p.token().kind.clone()
            else {
                return Err(Error::new(
                    ErrorKind::IdExpected(p.token().lexeme.clone()),
                    p.pos(),
                ));
            };
            let nested = p
                .rec_types
                .get(&nested_name)
                .cloned()
                .ok_or_else(|| Error::new(ErrorKind::UnknownVariable(nested_name), p.pos()))?;
            p.advance()?;
            Type::Rec(nested)
        } else {
            match id_type {
                IdentType::Int => Type::Int,
                IdentType::Real => Type::Real,
                IdentType::Str => Type::Str,
                IdentType::Byte => Type::Byte,
            }
        };
        fields.push((field_name, field_ty));
    }

    let rec = RecType::build(name.clone(), fields, pos)?;
    p.rec_types.insert(name, rec);
    Ok(())
}
