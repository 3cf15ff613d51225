//! Centralised error hierarchy for the **PopL interpreter**.
//!
//! Every pipeline stage (scanner, parser, resolver, runtime, CLI) converts its
//! failure modes into one of the variants defined here.  Static diagnostics are
//! collected by [`crate::diagnostics::Diagnostics`]; the runtime raises a
//! [`RuntimeError`] that carries the offending token for line/lexeme context.
//!
//! The module **does not** print diagnostics itself.

use std::io;
use thiserror::Error;

use log::info;

use crate::token::{Token, TokenType};

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoplError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error.
    #[error("[line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        line: usize,
        /// ` at end` or ` at '<lexeme>'`.
        location: String,
    },

    /// Static‑analysis failure (redeclaration, unused local, misplaced `break` …).
    #[error("[line {line}] Error{location}: {message}")]
    Resolve {
        message: String,
        line: usize,
        location: String,
    },

    /// Runtime evaluation error that escaped a top‑level `interpret` call.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF‑8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl PoplError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        PoplError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", token.line, message);

        PoplError::Parse {
            message,
            line: token.line,
            location: location(token),
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: line={}, msg={}", token.line, message);

        PoplError::Resolve {
            message,
            line: token.line,
            location: location(token),
        }
    }

    /// `true` for errors that must stop a program before it runs.
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            PoplError::Lex { .. } | PoplError::Parse { .. } | PoplError::Resolve { .. }
        )
    }

    /// Message text without the line/location decoration.
    pub fn message(&self) -> String {
        match self {
            PoplError::Lex { message, .. }
            | PoplError::Parse { message, .. }
            | PoplError::Resolve { message, .. } => message.clone(),
            PoplError::Runtime(e) => e.message.clone(),
            other => other.to_string(),
        }
    }
}

/// Renders where a token‑anchored diagnostic points to.
fn location(token: &Token) -> String {
    if token.token_type == TokenType::EOF {
        " at end".to_string()
    } else {
        format!(" at '{}'", token.lexeme)
    }
}

/// Error raised while executing a resolved program.
#[derive(Debug, Clone, Error)]
#[error("{message}\n[line {}]", token.line)]
pub struct RuntimeError {
    /// Token closest to the failure, used for line/lexeme context.
    pub token: Token,

    pub message: String,
}

impl RuntimeError {
    pub fn new<S: Into<String>>(token: &Token, msg: S) -> Self {
        Self {
            token: token.clone(),
            message: msg.into(),
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, PoplError>;
