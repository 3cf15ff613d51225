//! Abstract syntax tree for PopL.
//!
//! Every expression node carries an [`ExprId`] handed out by an [`ExprIdGen`]
//! at parse time.  The resolver keys lexical depths by that handle, so moving
//! or sharing nodes never invalidates resolution data.  Function declarations
//! are held behind `Rc` so runtime function values reference the very nodes
//! that were resolved instead of cloning them.

use std::rc::Rc;

use serde::Serialize;

use crate::token::{LiteralValue, Token};

/// Stable handle of an expression node, unique within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ExprId(pub u32);

/// Monotonic source of [`ExprId`]s.  A session keeps one generator alive so
/// REPL lines never reuse a handle.
#[derive(Debug, Default)]
pub struct ExprIdGen {
    next: u32,
}

impl ExprIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> ExprId {
        let id = ExprId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExprKind {
    /// The `nil` keyword.
    Nil,

    /// Infix operator, including the comma operator.
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// `condition ? then_branch : else_branch`
    Ternary {
        condition: Box<Expr>,
        question: Token,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },

    Grouping(Box<Expr>),

    Literal(LiteralValue),

    Unary {
        operator: Token,
        right: Box<Expr>,
    },

    Call {
        callee: Box<Expr>,
        /// The closing `)` token ‑ retained for error reporting.
        paren: Token,
        arguments: Vec<Expr>,
    },

    /// Variable access; its depth is looked up by this node's id.
    Variable(Token),

    /// `name = value`; resolved like a variable reference.
    Assign {
        name: Token,
        value: Box<Expr>,
    },

    /// Short‑circuiting `and` / `or`.
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// Anonymous function literal.
    Function(Rc<FunctionDecl>),

    /// object.property
    Get {
        object: Box<Expr>,
        name: Token,
    },

    /// object.property = value
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },

    This(Token),
}

impl Expr {
    pub fn new(id: ExprId, kind: ExprKind) -> Self {
        Self { id, kind }
    }

    /// Best source line for diagnostics about this expression.
    pub fn line(&self) -> usize {
        match &self.kind {
            ExprKind::Nil | ExprKind::Literal(_) => 0,
            ExprKind::Binary { operator, .. } | ExprKind::Logical { operator, .. } => {
                operator.line
            }
            ExprKind::Ternary { question, .. } => question.line,
            ExprKind::Grouping(inner) => inner.line(),
            ExprKind::Unary { operator, .. } => operator.line,
            ExprKind::Call { paren, .. } => paren.line,
            ExprKind::Variable(name) | ExprKind::This(name) => name.line,
            ExprKind::Assign { name, .. }
            | ExprKind::Get { name, .. }
            | ExprKind::Set { name, .. } => name.line,
            ExprKind::Function(decl) => decl.keyword.line,
        }
    }
}

/// Parameter list and body shared by named functions, methods and function
/// literals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDecl {
    /// `fun` keyword, or the method name for methods.
    pub keyword: Token,
    pub name: Option<Token>,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

impl FunctionDecl {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Stmt {
    /// Placeholder left where a declaration failed to parse.
    Nop,

    Block(Vec<Stmt>),

    Expression(Expr),

    Var {
        name: Token,
        initializer: Option<Expr>,
    },

    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    /// `while` loop.  `increment` is only set by the `for` desugaring and runs
    /// after every iteration, including one cut short by `continue`.
    While {
        condition: Expr,
        body: Box<Stmt>,
        increment: Option<Expr>,
    },

    Break(Token),

    Continue(Token),

    Function {
        name: Token,
        function: Rc<FunctionDecl>,
    },

    Return {
        keyword: Token,
        value: Option<Expr>,
    },

    Class {
        name: Token,
        methods: Vec<Rc<FunctionDecl>>,
    },
}
