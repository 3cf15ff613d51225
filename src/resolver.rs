//! Static resolver pass for the **PopL** interpreter.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (stack of maps tracking declared/defined/used).
//! 2. Report static errors (redeclaration, read in own initializer, unused
//!    locals, `break`/`continue` outside a loop, `return` outside a function
//!    or with a value inside `init`, `this` outside a class).
//! 3. Record, for *each* variable occurrence that binds to a local, how many
//!    environments up its declaration lives.  Anything not recorded is a
//!    global and is looked up by name at run time.
//!
//! Depths are keyed by [`ExprId`], never by node address.

use crate::ast::{Expr, ExprId, ExprKind, FunctionDecl, Stmt};
use crate::diagnostics::Diagnostics;
use crate::stack;
use crate::token::Token;
use crate::value::INITIALIZER;
use log::{debug, info};
use std::collections::{HashMap, HashSet};

/// Lexical depth of every resolved local reference.
pub type Resolutions = HashMap<ExprId, usize>;

/// Which kind of function body are we in?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LoopType {
    None,
    Loop,
}

#[derive(Debug, Clone)]
struct VariableInfo {
    defined: bool,
    used: bool,
    token: Token,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances for the interpreter.
pub struct Resolver<'d> {
    diagnostics: &'d mut Diagnostics,
    scopes: Vec<HashMap<String, VariableInfo>>,
    resolutions: Resolutions,
    /// Top‑level names whose initializer is being resolved right now.
    initializing_globals: HashSet<String>,
    current_function: FunctionType,
    current_class: ClassType,
    current_loop: LoopType,
}

impl<'d> Resolver<'d> {
    pub fn new(diagnostics: &'d mut Diagnostics) -> Self {
        info!("Resolver instantiated");

        Resolver {
            diagnostics,
            scopes: Vec::new(),
            resolutions: Resolutions::new(),
            initializing_globals: HashSet::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            current_loop: LoopType::None,
        }
    }

    /// Walk all top‑level statements once and hand back the depth table.
    pub fn resolve(mut self, statements: &[Stmt]) -> Resolutions {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        self.resolve_stmts(statements);

        info!("Resolved {} local reference(s)", self.resolutions.len());

        self.resolutions
    }

    fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        stack::ensure_sufficient_stack(|| self.resolve_stmt_inner(stmt))
    }

    fn resolve_stmt_inner(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Nop => {}

            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_stmts(statements);
                self.end_scope();
            }

            Stmt::Expression(expr) => self.resolve_expr(expr),

            Stmt::Var { name, initializer } => {
                debug!("Resolving var '{}'", name.lexeme);

                // declare → resolve initializer → define
                self.declare(name);

                if let Some(expr) = initializer {
                    let global: bool = self.scopes.is_empty();

                    if global {
                        self.initializing_globals.insert(name.lexeme.clone());
                    }

                    self.resolve_expr(expr);

                    if global {
                        self.initializing_globals.remove(&name.lexeme);
                    }
                }

                self.define(name);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);

                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While {
                condition,
                body,
                increment,
            } => {
                let enclosing: LoopType = self.current_loop;
                self.current_loop = LoopType::Loop;

                self.resolve_expr(condition);
                self.resolve_stmt(body);

                if let Some(inc) = increment {
                    self.resolve_expr(inc);
                }

                self.current_loop = enclosing;
            }

            Stmt::Break(keyword) => {
                if self.current_loop == LoopType::None {
                    self.diagnostics
                        .resolve_error(keyword, "Can't use 'break' outside of a loop.");
                }
            }

            Stmt::Continue(keyword) => {
                if self.current_loop == LoopType::None {
                    self.diagnostics
                        .resolve_error(keyword, "Can't use 'continue' outside of a loop.");
                }
            }

            Stmt::Function { name, function } => {
                // The name is visible inside its own body.
                self.declare(name);
                self.define(name);
                self.resolve_function(function, FunctionType::Function);
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.diagnostics
                        .resolve_error(keyword, "Can't return from top-level code.");
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.diagnostics
                            .resolve_error(keyword, "Can't return a value from an initializer.");
                    }

                    self.resolve_expr(expr);
                }
            }

            Stmt::Class { name, methods } => {
                debug!("Resolving class '{}'", name.lexeme);

                let enclosing: ClassType = self.current_class;
                self.current_class = ClassType::Class;

                self.declare(name);
                self.define(name);

                // Methods close over a scope holding `this`.
                self.begin_scope();
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert(
                        "this".to_string(),
                        VariableInfo {
                            defined: true,
                            used: true,
                            token: Token::synthetic("this", name.line),
                        },
                    );
                }

                for method in methods {
                    let kind: FunctionType = match &method.name {
                        Some(n) if n.lexeme == INITIALIZER => FunctionType::Initializer,
                        _ => FunctionType::Method,
                    };

                    self.resolve_function(method, kind);
                }

                self.end_scope();

                self.current_class = enclosing;
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) {
        stack::ensure_sufficient_stack(|| self.resolve_expr_inner(expr))
    }

    fn resolve_expr_inner(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Nil | ExprKind::Literal(_) => {}

            ExprKind::Grouping(inner) => self.resolve_expr(inner),

            ExprKind::Unary { right, .. } => self.resolve_expr(right),

            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }

            ExprKind::Ternary {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.resolve_expr(condition);
                self.resolve_expr(then_branch);
                self.resolve_expr(else_branch);
            }

            ExprKind::Variable(name) => {
                if self.reads_own_initializer(name) {
                    self.diagnostics.resolve_error(
                        name,
                        "Can't read local variable in its own initializer.",
                    );
                }

                self.resolve_local(expr.id, name);
            }

            ExprKind::Assign { name, value } => {
                self.resolve_expr(value);

                if self.reads_own_initializer(name) {
                    self.diagnostics.resolve_error(
                        name,
                        "Can't read local variable in its own initializer.",
                    );
                }

                self.resolve_local(expr.id, name);
            }

            ExprKind::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);

                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }

            ExprKind::Function(decl) => self.resolve_function(decl, FunctionType::Function),

            ExprKind::Get { object, .. } => self.resolve_expr(object),

            ExprKind::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }

            ExprKind::This(keyword) => {
                if self.current_class == ClassType::None {
                    self.diagnostics
                        .resolve_error(keyword, "Can't use 'this' outside of a class.");
                    return;
                }

                self.resolve_local(expr.id, keyword);
            }
        }
    }

    /// Declared in the innermost scope but not defined yet, or a global whose
    /// initializer is being resolved from top‑level code.
    fn reads_own_initializer(&self, name: &Token) -> bool {
        match self.scopes.last() {
            Some(scope) => scope
                .get(&name.lexeme)
                .is_some_and(|info| !info.defined),
            None => self.initializing_globals.contains(&name.lexeme),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Fresh scope holding only the parameters, nested in the scope active at
    /// the declaration site.
    fn resolve_function(&mut self, function: &FunctionDecl, kind: FunctionType) {
        let enclosing_function: FunctionType = self.current_function;
        let enclosing_loop: LoopType = self.current_loop;

        self.current_function = kind;
        self.current_loop = LoopType::None;

        self.begin_scope();

        for param in &function.params {
            self.declare(param);
            self.define(param);
        }

        self.resolve_stmts(&function.body);
        self.end_scope();

        self.current_function = enclosing_function;
        self.current_loop = enclosing_loop;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    /// Pops the innermost scope and reports locals that were defined but never
    /// used, in source order.
    fn end_scope(&mut self) {
        let Some(scope) = self.scopes.pop() else {
            return;
        };

        let mut unused: Vec<VariableInfo> = scope
            .into_values()
            .filter(|info| info.defined && !info.used)
            .collect();

        unused.sort_by(|a, b| {
            (a.token.line, &a.token.lexeme).cmp(&(b.token.line, &b.token.lexeme))
        });

        for info in unused {
            self.diagnostics.resolve_error(
                &info.token,
                format!("Unused local variable '{}'.", info.token.lexeme),
            );
        }
    }

    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };

        if scope.contains_key(&name.lexeme) {
            self.diagnostics.resolve_error(
                name,
                format!("Variable '{}' already declared in this scope.", name.lexeme),
            );
        }

        scope.insert(
            name.lexeme.clone(),
            VariableInfo {
                defined: false,
                used: false,
                token: name.clone(),
            },
        );
    }

    fn define(&mut self, name: &Token) {
        if let Some(info) = self
            .scopes
            .last_mut()
            .and_then(|scope| scope.get_mut(&name.lexeme))
        {
            info.defined = true;
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at depth `d`, or leave it unrecorded
    /// (global) if no local scope declares the name.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        let innermost: usize = self.scopes.len();

        for (index, scope) in self.scopes.iter_mut().enumerate().rev() {
            if let Some(info) = scope.get_mut(&name.lexeme) {
                let depth: usize = innermost - 1 - index;

                debug!("Resolved '{}' at depth {}", name.lexeme, depth);

                info.used = true;
                self.resolutions.insert(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }
}
