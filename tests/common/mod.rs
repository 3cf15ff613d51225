#![allow(dead_code)]

use std::cell::RefCell;
use std::io::{self, Cursor, Write};
use std::rc::Rc;

use popl as lang;

use lang::ast::{ExprIdGen, Stmt};
use lang::diagnostics::Diagnostics;
use lang::parser::Parser;
use lang::scanner::scan_tokens;
use lang::session::{Mode, RunStatus, Session};

/// In‑memory output sink that stays readable after being boxed into a session.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct Outcome {
    pub status: RunStatus,
    pub output: String,
    pub errors: Vec<String>,
}

impl Outcome {
    pub fn lines(&self) -> Vec<&str> {
        self.output.lines().collect()
    }

    pub fn has_error(&self, fragment: &str) -> bool {
        self.errors.iter().any(|e| e.contains(fragment))
    }
}

pub fn run(source: &str) -> Outcome {
    run_with_input(source, "")
}

pub fn run_with_input(source: &str, input: &str) -> Outcome {
    let out = SharedBuffer::default();
    let mut session = Session::with_io(
        Box::new(out.clone()),
        Box::new(Cursor::new(input.as_bytes().to_vec())),
    );

    let status = session.run(source, Mode::Script);
    let errors = session
        .take_reports()
        .iter()
        .map(|e| e.to_string())
        .collect();

    Outcome {
        status,
        output: out.contents(),
        errors,
    }
}

/// A REPL session fed one entry at a time.
pub struct Repl {
    pub session: Session,
    out: SharedBuffer,
}

impl Repl {
    pub fn new() -> Self {
        let out = SharedBuffer::default();
        let session = Session::with_io(Box::new(out.clone()), Box::new(io::empty()));

        Self { session, out }
    }

    pub fn enter(&mut self, source: &str) -> Outcome {
        self.out.clear();

        let status = self.session.run(source, Mode::Repl);
        let errors = self
            .session
            .take_reports()
            .iter()
            .map(|e| e.to_string())
            .collect();

        Outcome {
            status,
            output: self.out.contents(),
            errors,
        }
    }
}

/// Parses `source` and hands back the statements with the diagnostics.
pub fn parse(source: &str) -> (Vec<Stmt>, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let mut ids = ExprIdGen::new();

    let tokens = scan_tokens(source, &mut diagnostics);
    let statements = Parser::new(tokens, &mut ids, &mut diagnostics).parse();

    (statements, diagnostics)
}
