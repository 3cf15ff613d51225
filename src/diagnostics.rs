//! Explicit diagnostics context.
//!
//! One `Diagnostics` value is threaded by `&mut` through scanning, parsing and
//! resolving, and receives the runtime error that escapes an `interpret` call.
//! The "had error" flags gate the pipeline: any static error suppresses
//! execution, and a REPL resets the static flag between lines.

use log::debug;

use crate::error::{PoplError, RuntimeError};
use crate::token::Token;

#[derive(Debug, Default)]
pub struct Diagnostics {
    reports: Vec<PoplError>,
    had_error: bool,
    had_runtime_error: bool,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scanner‑level issue that only knows its line.
    pub fn lex_error<S: Into<String>>(&mut self, line: usize, message: S) {
        self.report(PoplError::lex(line, message));
    }

    /// Syntax error anchored at `token`.
    pub fn error_at<S: Into<String>>(&mut self, token: &Token, message: S) {
        self.report(PoplError::parse(token, message));
    }

    /// Static‑analysis error anchored at `token`.
    pub fn resolve_error<S: Into<String>>(&mut self, token: &Token, message: S) {
        self.report(PoplError::resolve(token, message));
    }

    /// Records the runtime error that aborted an `interpret` call.
    pub fn runtime_error(&mut self, error: RuntimeError) {
        debug!("Runtime error recorded: {}", error);

        self.had_runtime_error = true;
        self.reports.push(PoplError::Runtime(error));
    }

    /// Records an already built error.
    pub fn report(&mut self, error: PoplError) {
        if error.is_static() {
            self.had_error = true;
        } else if matches!(error, PoplError::Runtime(_)) {
            self.had_runtime_error = true;
        }

        debug!("Diagnostic: {}", error);

        self.reports.push(error);
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    pub fn reports(&self) -> &[PoplError] {
        &self.reports
    }

    /// Hands the collected reports to the caller, leaving the flags intact.
    pub fn take_reports(&mut self) -> Vec<PoplError> {
        std::mem::take(&mut self.reports)
    }

    /// Clears both flags and all pending reports.
    pub fn reset(&mut self) {
        self.reports.clear();
        self.had_error = false;
        self.had_runtime_error = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_reports_are_all_kept() {
        let mut diagnostics = Diagnostics::new();

        diagnostics.lex_error(3, "Unexpected character.");
        diagnostics.lex_error(3, "Unexpected character.");
        diagnostics.lex_error(4, "Unexpected character.");

        let rendered: Vec<String> = diagnostics.reports().iter().map(|r| r.to_string()).collect();

        assert_eq!(
            rendered,
            vec![
                "[line 3] Error: Unexpected character.",
                "[line 3] Error: Unexpected character.",
                "[line 4] Error: Unexpected character.",
            ]
        );
        assert!(diagnostics.had_error());
        assert!(!diagnostics.had_runtime_error());
    }

    #[test]
    fn reset_clears_flags_and_reports() {
        let mut diagnostics = Diagnostics::new();
        let token: Token = Token::synthetic("x", 2);

        diagnostics.lex_error(1, "Unterminated string.");
        diagnostics.runtime_error(RuntimeError::new(&token, "Division by zero."));

        assert_eq!(diagnostics.reports().len(), 2);
        assert!(diagnostics.had_runtime_error());

        diagnostics.reset();

        assert!(diagnostics.reports().is_empty());
        assert!(!diagnostics.had_error());
        assert!(!diagnostics.had_runtime_error());
    }

    #[test]
    fn take_reports_keeps_flags() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.lex_error(1, "Unexpected character.");

        assert_eq!(diagnostics.take_reports().len(), 1);
        assert!(diagnostics.reports().is_empty());
        assert!(diagnostics.had_error());
    }
}
