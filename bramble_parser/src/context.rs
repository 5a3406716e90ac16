//! The parser context
//!
//! One [`Parser`] drives a whole compilation: it owns the lexer, the program
//! under construction, the global and local symbol tables and the list of
//! calls awaiting resolution. Expression and statement helpers receive the
//! context explicitly; code that needs to emit into another section (builtin
//! synthesis, destructors) does so through [`Parser::with_section`] rather
//! than by swapping a raw pointer.

use crate::call::PendingCall;
use crate::symbol::{Symbol, SymbolTable};
use crate::types::{RecType, Type};
use bramble_common::config::{EFLAG_HIDDEN_VAR, ERR_HIDDEN_VAR};
use bramble_common::{Error, ErrorKind, Position, Result};
use bramble_ir::{Opcode, Operand, Program, Section, TypeSignature, REG_GLOBAL, REG_LOCAL};
use bramble_lexer::{Keyword, Lexer, Token, TokenKind};
use indexmap::IndexMap;

pub struct Parser {
    pub lexer: Lexer,
    pub prog: Program,
    current: usize,
    main: usize,
    /// Locals of the function being parsed
    pub st: SymbolTable,
    /// Globals; variables created in the main body live here
    pub main_st: SymbolTable,
    pub calls: Vec<PendingCall>,
    /// Declared record types, by name
    pub rec_types: IndexMap<String, RecType>,
    /// Global record variables whose fields need releasing at program exit
    pub rec_globals: Vec<(u32, RecType)>,
    /// True while parsing a DEF PROC / DEF FN body
    pub in_proc: bool,
    /// The declared return type while parsing a DEF FN body
    pub fn_ret: Option<Type>,
}

impl Parser {
    pub fn new(source: &str, stream_name: &str) -> Result<Self> {
        let lexer = Lexer::new(source, stream_name)?;
        let mut prog = Program::new();
        let main = prog.section_new(
            "main",
            Some(TypeSignature::proc(Vec::new())),
            Position::start(),
        )?;

        // eflag and err occupy the first two global slots
        let mut main_st = SymbolTable::new();
        main_st.insert(EFLAG_HIDDEN_VAR, Type::Int, Position::start())?;
        main_st.insert(ERR_HIDDEN_VAR, Type::Int, Position::start())?;

        let mut parser = Self {
            lexer,
            prog,
            current: main,
            main,
            st: SymbolTable::new(),
            main_st,
            calls: Vec::new(),
            rec_types: IndexMap::new(),
            rec_globals: Vec::new(),
            in_proc: false,
            fn_ret: None,
        };
        parser.reserve_cleanup_nop();
        Ok(parser)
    }

    /// The section currently being emitted into
    pub fn section(&mut self) -> &mut Section {
        self.prog.section_mut(self.current)
    }

    pub fn section_ref(&self) -> &Section {
        self.prog.section(self.current)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Redirect emission to another section. Prefer [`Parser::with_section`]
    /// for scoped redirection; this is for the statement handlers that open
    /// and close function bodies.
    pub fn set_current(&mut self, section: usize) {
        self.current = section;
    }

    pub fn main_index(&self) -> usize {
        self.main
    }

    pub fn in_main(&self) -> bool {
        self.current == self.main
    }

    /// Run `f` with emission redirected to `section`, restoring the previous
    /// target afterwards even on failure
    pub fn with_section<T>(
        &mut self,
        section: usize,
        f: impl FnOnce(&mut Parser) -> Result<T>,
    ) -> Result<T> {
        let saved = self.current;
        self.current = section;
        let result = f(self);
        self.current = saved;
        result
    }

    /// Reserve the entry placeholder that is later rewritten to initialise
    /// the cleanup-stack counter, or elided if the function never pushes
    pub fn reserve_cleanup_nop(&mut self) {
        let offset = self.section().add_nop();
        self.section().cleanup_stack_nop = Some(offset);
    }

    // ----- token plumbing -----

    pub fn token(&self) -> &Token {
        self.lexer.current()
    }

    pub fn pos(&self) -> Position {
        self.lexer.current().pos
    }

    pub fn advance(&mut self) -> Result<()> {
        self.lexer.get()?;
        Ok(())
    }

    pub fn at_eof(&self) -> bool {
        self.token().kind == TokenKind::Eof
    }

    pub fn expect_operator(&mut self, text: &str) -> Result<()> {
        if self.token().is_operator(text) {
            self.advance()
        } else {
            Err(Error::new(
                ErrorKind::ExpectedToken {
                    expected: format!("'{}'", text),
                    found: self.token().lexeme.clone(),
                },
                self.pos(),
            ))
        }
    }

    pub fn expect_keyword(&mut self, keyword: Keyword) -> Result<()> {
        if self.token().is_keyword(keyword) {
            self.advance()
        } else {
            Err(Error::new(
                ErrorKind::KeywordExpected(self.token().lexeme.clone()),
                self.pos(),
            ))
        }
    }

    /// Skip `:` statement separators
    pub fn skip_separators(&mut self) -> Result<()> {
        while self.token().is_operator(":") {
            self.advance()?;
        }
        Ok(())
    }

    // ----- variables -----

    /// Find a variable, checking function locals before globals. Returns the
    /// symbol and the register holding its frame base.
    pub fn lookup_var(&self, name: &str) -> Option<(Symbol, u32)> {
        if let Some(symbol) = self.st.lookup(name) {
            return Some((symbol, REG_LOCAL));
        }
        self.main_st
            .lookup(name)
            .map(|symbol| (symbol, REG_GLOBAL))
    }

    /// Create a variable in the frame new variables of the current context
    /// go to: the global frame, unless declared LOCAL (which inserts into
    /// `st` directly)
    pub fn create_global(&mut self, name: &str, ty: Type, pos: Position) -> Result<(Symbol, u32)> {
        let symbol = self.main_st.insert(name, ty, pos)?;
        Ok((symbol, REG_GLOBAL))
    }

    /// Create an anonymous temporary in whichever frame the current context
    /// allocates from
    pub fn tmp_var(&mut self, ty: Type) -> Result<(Symbol, u32)> {
        let pos = self.pos();
        if self.in_proc {
            let symbol = self.st.insert_tmp(ty, pos)?;
            Ok((symbol, REG_LOCAL))
        } else {
            let symbol = self.main_st.insert_tmp(ty, pos)?;
            Ok((symbol, REG_GLOBAL))
        }
    }

    /// Store an integer register into the hidden `err` variable
    pub fn assign_err(&mut self, reg: u32) {
        let offset = self.prog.error_offset;
        self.section().add_instr_reg(
            Opcode::StoreoI32,
            Operand::Reg(reg),
            Operand::Reg(REG_GLOBAL),
            Operand::I32(offset),
        );
    }

    /// Finalise the global frame size once parsing is done
    pub fn seal_globals(&mut self) {
        self.prog.globals_size = self.main_st.max_allocated();
    }
}
