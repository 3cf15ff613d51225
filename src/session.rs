//! Pipeline driver: scan → parse → resolve → interpret.
//!
//! A [`Session`] owns everything that must outlive a single run: the
//! interpreter with its globals and resolution table, the diagnostics context,
//! the expression‑id generator and, in REPL mode, every statement executed so
//! far.  Static errors stop a run before anything executes and leave the
//! interpreter untouched.

use std::io::{BufRead, Write};

use log::{debug, info};

use crate::ast::{ExprIdGen, Stmt};
use crate::diagnostics::Diagnostics;
use crate::error::PoplError;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::{Resolutions, Resolver};
use crate::scanner::scan_tokens;
use crate::token::{Token, TokenType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Whole program, run once.
    Script,
    /// One interactive entry; expression statements echo their value.
    Repl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Ok,
    StaticError,
    RuntimeError,
}

pub struct Session {
    interpreter: Interpreter,
    diagnostics: Diagnostics,
    ids: ExprIdGen,
    retained: Vec<Stmt>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_interpreter(Interpreter::new())
    }

    /// Session whose programs write to `out` and read from `input`.
    pub fn with_io(out: Box<dyn Write>, input: Box<dyn BufRead>) -> Self {
        Self::with_interpreter(Interpreter::with_io(out, input))
    }

    fn with_interpreter(interpreter: Interpreter) -> Self {
        info!("Session created");

        Self {
            interpreter,
            diagnostics: Diagnostics::new(),
            ids: ExprIdGen::new(),
            retained: Vec::new(),
        }
    }

    /// Runs `source` to completion.  Reports from the previous run are
    /// discarded first; the ones produced here stay available through
    /// [`Session::diagnostics`] until the next run.
    pub fn run(&mut self, source: &str, mode: Mode) -> RunStatus {
        info!("Running {} byte(s) in {:?} mode", source.len(), mode);

        self.diagnostics.reset();
        self.interpreter.set_repl_mode(mode == Mode::Repl);

        let tokens: Vec<Token> = scan_tokens(source, &mut self.diagnostics);

        let statements: Vec<Stmt> =
            Parser::new(tokens, &mut self.ids, &mut self.diagnostics).parse();

        if self.diagnostics.had_error() {
            debug!("Parse produced static errors; not resolving");
            return RunStatus::StaticError;
        }

        let resolutions: Resolutions = Resolver::new(&mut self.diagnostics).resolve(&statements);

        if self.diagnostics.had_error() {
            debug!("Resolve produced static errors; not running");
            return RunStatus::StaticError;
        }

        self.interpreter.commit(resolutions);

        let outcome = self.interpreter.interpret(&statements);

        if mode == Mode::Repl {
            self.retained.extend(statements);
        }

        match outcome {
            Ok(()) => RunStatus::Ok,
            Err(error) => {
                self.diagnostics.runtime_error(error);
                RunStatus::RuntimeError
            }
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn take_reports(&mut self) -> Vec<PoplError> {
        self.diagnostics.take_reports()
    }

    /// Statements executed so far in REPL mode, oldest first.
    pub fn history(&self) -> &[Stmt] {
        &self.retained
    }
}

/// True when brackets balance and a top‑level `;` was seen, or the input ends
/// with a closing brace.  Unbalanced closers count as complete so the parser
/// gets to report them.
pub fn is_statement_complete(tokens: &[Token]) -> bool {
    let mut depth: i64 = 0;
    let mut terminated: bool = false;
    let mut last: Option<&TokenType> = None;

    for token in tokens {
        match token.token_type {
            TokenType::EOF => continue,
            TokenType::LEFT_PAREN | TokenType::LEFT_BRACE => depth += 1,
            TokenType::RIGHT_PAREN | TokenType::RIGHT_BRACE => depth -= 1,
            TokenType::SEMICOLON if depth == 0 => terminated = true,
            _ => {}
        }

        last = Some(&token.token_type);
    }

    if depth < 0 {
        return true;
    }

    depth == 0 && (terminated || last == Some(&TokenType::RIGHT_BRACE))
}

/// [`is_statement_complete`] over raw text.  A string still open at the end of
/// `source` means more lines are coming.
pub fn is_source_complete(source: &str) -> bool {
    let mut scratch: Diagnostics = Diagnostics::new();
    let tokens: Vec<Token> = scan_tokens(source, &mut scratch);

    let open_string: bool = scratch
        .reports()
        .iter()
        .any(|report| report.message() == "Unterminated string.");

    !open_string && is_statement_complete(&tokens)
}
