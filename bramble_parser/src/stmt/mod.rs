//! Statement dispatch
//!
//! One handler per keyword, driven by the current token. Compound
//! statements parse their bodies through [`block`], which enforces
//! termination before end of input. Inside functions each block opens a
//! scope level; leaving it pops the level's symbols and drains the cleanup
//! stack back to the depth captured at entry.

pub mod assignment;
pub mod dim;
pub mod error_stmt;
pub mod loops;
pub mod output;
pub mod proc;
pub mod rec_decl;
pub mod sys;

use crate::context::Parser;
use crate::exp;
use crate::parser_call;
use crate::rec;
use crate::reference;
use crate::type_if;
use crate::types::Type;
use bramble_common::config::ERR_CODE_BAD_DIM;
use bramble_common::{Error, ErrorKind, Result};
use bramble_ir::{Opcode, Operand, REG_GLOBAL, REG_LOCAL};
use bramble_lexer::{Keyword, TokenKind};

pub fn statement(p: &mut Parser) -> Result<()> {
    let pos = p.pos();
    match p.token().kind.clone() {
        TokenKind::Keyword { keyword, .. } => match keyword {
            Keyword::Print => output::print_stmt(p),
            Keyword::Let => {
                p.advance()?;
                assignment::assignment(p)
            }
            Keyword::Dim => dim::dim_stmt(p),
            Keyword::Local => dim::local_stmt(p),
            Keyword::Def => proc::def_stmt(p),
            Keyword::Proc => parser_call::proc_call(p),
            Keyword::EndProc => Err(Error::new(ErrorKind::ProcInMain, pos)),
            Keyword::End => {
                let end_label = p.section_ref().end_label;
                p.section()
                    .add_instr_no_reg(Opcode::Jmp, Operand::Label(end_label));
                p.advance()
            }
            Keyword::If => loops::if_stmt(p),
            Keyword::While => loops::while_stmt(p),
            Keyword::For => loops::for_stmt(p),
            Keyword::Repeat => loops::repeat_stmt(p),
            Keyword::OnError => error_stmt::onerror_stmt(p),
            Keyword::Error => error_stmt::error_stmt(p),
            Keyword::Type => rec_decl::type_stmt(p),
            Keyword::Swap => assignment::swap_stmt(p),
            Keyword::Append => assignment::append_stmt(p),
            Keyword::Sys => sys::sys_stmt(p),
            Keyword::Fn => Err(Error::new(ErrorKind::UselessStatement, pos)),
            other => Err(Error::new(
                ErrorKind::KeywordExpected(other.to_string()),
                pos,
            )),
        },
        TokenKind::Identifier { .. } => assignment::assignment(p),
        TokenKind::Operator(op) if op == "<-" => {
            if p.in_proc && p.fn_ret.is_none() {
                Err(Error::new(ErrorKind::ReturnInProc, pos))
            } else {
                Err(Error::new(ErrorKind::ReturnInMain, pos))
            }
        }
        _ => Err(Error::new(
            ErrorKind::ExpectedToken {
                expected: "a statement".to_string(),
                found: p.token().lexeme.clone(),
            },
            pos,
        )),
    }
}

/// Parse statements until one of `terminators` appears, consume it and
/// return which one. Reaching end of input first is an unterminated
/// compound statement.
pub fn block(p: &mut Parser, terminators: &[Keyword]) -> Result<Keyword> {
    loop {
        p.skip_separators()?;
        if p.at_eof() {
            return Err(Error::new(ErrorKind::CompoundNotTerminated, p.pos()));
        }
        if let TokenKind::Keyword { keyword, .. } = &p.token().kind {
            if terminators.contains(keyword) {
                let found = *keyword;
                p.advance()?;
                return Ok(found);
            }
        }
        statement(p)?;
    }
}

/// Capture the cleanup depth and open a scope level. Only functions scope
/// their blocks; main-body variables persist.
pub fn enter_block(p: &mut Parser) -> Result<Option<u32>> {
    if !p.in_proc {
        return Ok(None);
    }
    let saved = reference::save_cleanup_depth(p)?;
    p.st.level_up();
    Ok(Some(saved))
}

/// Close a scope level: pop its symbols, release record fields, and drain
/// the cleanup stack back to the saved depth
pub fn leave_block(p: &mut Parser, saved: Option<u32>) -> Result<()> {
    let Some(saved) = saved else {
        return Ok(());
    };
    let popped = p.st.level_down();

    for symbol in &popped {
        if let Type::Rec(rec) = &symbol.ty {
            if rec.has_references() {
                let rec = rec.clone();
                let loc = symbol.offset()?;
                let ptr = reference::get_pointer(p, REG_LOCAL, loc)?;
                rec::call_rec_deref(p, &rec, ptr)?;
            }
        }
    }

    reference::emit_drain_loop(p, Operand::Reg(saved))
}

/// Emit the shared out-of-range trap if any access in this section needed
/// one: it materialises the BAD_DIM error and leaves through the standard
/// error path
fn emit_array_access_trap(p: &mut Parser) -> Result<()> {
    let Some(label) = p.section_ref().array_access_label else {
        return Ok(());
    };
    p.section().add_label(label)?;
    let pos = p.pos();
    exp::generate_error(p, crate::exp::Exp::int_const(ERR_CODE_BAD_DIM, pos))
}

/// Close the main section: release record globals, drain the cleanup
/// stack, and exit through the no-cleanup label
pub fn end_main(p: &mut Parser) -> Result<()> {
    let end_label = p.section_ref().end_label;
    p.section().add_label(end_label)?;

    let rec_globals = p.rec_globals.clone();
    for (loc, rec) in rec_globals {
        let ptr = reference::get_pointer(p, REG_GLOBAL, loc)?;
        rec::call_rec_deref(p, &rec, ptr)?;
    }

    reference::emit_drain_loop(p, Operand::I32(0))?;

    let nofree = p.section().new_label();
    p.section().nofree_label = Some(nofree);
    p.section().add_label(nofree)?;
    p.section().add_instr_no_arg(Opcode::End);

    emit_array_access_trap(p)?;
    p.section().append_error_ops();

    let locals = p.st.max_allocated();
    p.section().locals = locals;
    Ok(())
}

/// Close a function section: every return path has jumped to `end_label`;
/// drain the cleanup stack and emit the return of the declared flavour
pub fn end_function(p: &mut Parser, ret: Option<&Type>) -> Result<()> {
    let end_label = p.section_ref().end_label;
    p.section().add_label(end_label)?;

    reference::emit_drain_loop(p, Operand::I32(0))?;

    match ret {
        Some(ty) => {
            let ret_reg = p.section_ref().ret_reg;
            let pos = p.pos();
            type_if::ret(p, ty, ret_reg, pos)?;
        }
        None => p.section().add_instr_no_arg(Opcode::Ret),
    }

    emit_array_access_trap(p)?;
    p.section().append_error_ops();

    let locals = p.st.max_allocated();
    p.section().locals = locals;
    Ok(())
}
