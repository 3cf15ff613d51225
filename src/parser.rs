/*!
Recursive‑descent parser for PopL.

Grammar (EBNF, lowest precedence first)
---------------------------------------

```text
program        → declaration* EOF ;
declaration    → classDecl | funDecl | varDecl | statement ;
classDecl      → "class" IDENT "{" function* "}" ;
funDecl        → "fun" function ;
function       → IDENT "(" parameters? ")" block ;
varDecl        → "var" IDENT ( "=" expression )? ";" ;
statement      → exprStmt | forStmt | ifStmt | whileStmt | breakStmt
               | continueStmt | returnStmt | block ;
forStmt        → "for" "(" ( varDecl | exprStmt | ";" )
                 expression? ";" expression? ")" statement ;
block          → "{" declaration* "}" ;
expression     → comma ;
comma          → assignment ( "," assignment )* ;
assignment     → ( call "." )? IDENT "=" assignment | ternary ;
ternary        → logic_or ( "?" expression ":" ternary )? ;
logic_or       → logic_and ( "or" logic_and )* ;
logic_and      → equality ( "and" equality )* ;
equality       → comparison ( ( "!=" | "==" ) comparison )* ;
comparison     → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
term           → factor ( ( "-" | "+" ) factor )* ;
factor         → unary ( ( "/" | "*" ) unary )* ;
unary          → ( "!" | "-" ) unary | call ;
call           → primary ( "(" arguments? ")" | "." IDENT )* ;
arguments      → assignment ( "," assignment )* ;
primary        → NUMBER | STRING | "true" | "false" | "nil" | "this"
               | IDENT | "(" expression ")" | "fun" "(" parameters? ")" block ;
```

Error recovery
--------------

A syntax error is recorded in [`Diagnostics`] where it is detected and a
[`ParseError`] marker unwinds to the nearest `declaration`, which discards
tokens up to the next statement boundary and substitutes [`Stmt::Nop`].  One
bad statement therefore never hides errors in the following ones.

### Logging Policy

| Location                     | Level  | Purpose                                   |
|------------------------------|--------|-------------------------------------------|
| `Parser::new`, `parse`       | `info` | Lifecycle milestones.                     |
| `declaration`, `statement`   | `debug`| High‑level descent into grammar branches. |
| `synchronize`                | `debug`| Recovery after a syntax error.            |
*/

use std::rc::Rc;

use crate::ast::{Expr, ExprIdGen, ExprKind, FunctionDecl, Stmt};
use crate::diagnostics::Diagnostics;
use crate::stack;
use crate::token::{LiteralValue, Token, TokenType};

use log::{debug, info};

/// Most parameters or arguments a single call may carry.
pub const MAX_ARITY: usize = 255;

/// Unwinding marker; the message was already recorded in the diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError;

type PResult<T> = std::result::Result<T, ParseError>;

/// Top‑level parser over an owned token stream.
pub struct Parser<'a> {
    tokens: Vec<Token>,
    current: usize,
    ids: &'a mut ExprIdGen,
    diagnostics: &'a mut Diagnostics,
    loop_depth: usize,
    function_depth: usize,
}

impl<'a> Parser<'a> {
    /// Construct a new parser.  A missing trailing `EOF` is appended.
    pub fn new(
        mut tokens: Vec<Token>,
        ids: &'a mut ExprIdGen,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        info!("Parser created with {} tokens", tokens.len());

        if tokens.last().map(|t| &t.token_type) != Some(&TokenType::EOF) {
            let line: usize = tokens.last().map_or(1, |t| t.line);
            tokens.push(Token::new(TokenType::EOF, "", line));
        }

        Self {
            tokens,
            current: 0,
            ids,
            diagnostics,
            loop_depth: 0,
            function_depth: 0,
        }
    }

    // ───────────────────────── public API ─────────────────────────

    /// Parse an entire program.  Statements that failed to parse come back as
    /// [`Stmt::Nop`]; check the diagnostics before using the result.
    pub fn parse(&mut self) -> Vec<Stmt> {
        info!("Beginning parse phase");

        let mut statements: Vec<Stmt> = Vec::new();

        while !self.is_at_end() {
            statements.push(self.declaration());
        }

        info!("Parsed {} statement(s)", statements.len());

        statements
    }

    // ──────────────────────── declaration rules ───────────────────

    fn declaration(&mut self) -> Stmt {
        stack::ensure_sufficient_stack(|| self.declaration_inner())
    }

    fn declaration_inner(&mut self) -> Stmt {
        debug!("Entering declaration at {:?}", self.peek().token_type);

        let result: PResult<Stmt> = if self.matches(TokenType::CLASS) {
            self.class_declaration()
        } else if self.check(TokenType::FUN) && self.check_next(TokenType::IDENTIFIER) {
            self.advance();
            self.function_declaration()
        } else if self.matches(TokenType::VAR) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => stmt,
            Err(ParseError) => {
                self.synchronize();
                Stmt::Nop
            }
        }
    }

    fn class_declaration(&mut self) -> PResult<Stmt> {
        let name: Token = self.consume(TokenType::IDENTIFIER, "Expect class name.")?;

        self.consume(TokenType::LEFT_BRACE, "Expect '{' before class body.")?;

        let mut methods: Vec<Rc<FunctionDecl>> = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            let method_name: Token = self.consume(TokenType::IDENTIFIER, "Expect method name.")?;

            methods.push(self.function_rest(method_name.clone(), Some(method_name), "method")?);
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after class body.")?;

        Ok(Stmt::Class { name, methods })
    }

    fn function_declaration(&mut self) -> PResult<Stmt> {
        let keyword: Token = self.previous().clone();
        let name: Token = self.consume(TokenType::IDENTIFIER, "Expect function name.")?;
        let function = self.function_rest(keyword, Some(name.clone()), "function")?;

        Ok(Stmt::Function { name, function })
    }

    /// Parameter list and body, shared by declarations, methods and literals.
    fn function_rest(
        &mut self,
        keyword: Token,
        name: Option<Token>,
        kind: &str,
    ) -> PResult<Rc<FunctionDecl>> {
        self.consume(
            TokenType::LEFT_PAREN,
            &format!("Expect '(' after {} name.", kind),
        )?;

        let mut params: Vec<Token> = Vec::new();

        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= MAX_ARITY {
                    let at: Token = self.peek().clone();
                    self.diagnostics
                        .error_at(&at, "Can't have more than 255 parameters.");
                }

                params.push(self.consume(TokenType::IDENTIFIER, "Expect parameter name.")?);

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after parameters.")?;
        self.consume(
            TokenType::LEFT_BRACE,
            &format!("Expect '{{' before {} body.", kind),
        )?;

        let body: Vec<Stmt> = self.in_function(|p| p.block())?;

        Ok(Rc::new(FunctionDecl {
            keyword,
            name,
            params,
            body,
        }))
    }

    fn var_declaration(&mut self) -> PResult<Stmt> {
        let name: Token = self.consume(TokenType::IDENTIFIER, "Expect variable name.")?;

        let initializer: Option<Expr> = if self.matches(TokenType::EQUAL) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::SEMICOLON,
            "Expect ';' after variable declaration.",
        )?;

        Ok(Stmt::Var { name, initializer })
    }

    // ───────────────────────── statement rules ────────────────────

    fn statement(&mut self) -> PResult<Stmt> {
        stack::ensure_sufficient_stack(|| self.statement_inner())
    }

    fn statement_inner(&mut self) -> PResult<Stmt> {
        debug!("Entering statement at {:?}", self.peek().token_type);

        if self.matches(TokenType::FOR) {
            self.for_statement()
        } else if self.matches(TokenType::IF) {
            self.if_statement()
        } else if self.matches(TokenType::WHILE) {
            self.while_statement()
        } else if self.matches(TokenType::BREAK) {
            self.break_statement()
        } else if self.matches(TokenType::CONTINUE) {
            self.continue_statement()
        } else if self.matches(TokenType::RETURN) {
            self.return_statement()
        } else if self.matches(TokenType::LEFT_BRACE) {
            Ok(Stmt::Block(self.block()?))
        } else {
            self.expression_statement()
        }
    }

    /// `for` is sugar for a block holding the initializer and a `while` whose
    /// increment runs after every iteration.
    fn for_statement(&mut self) -> PResult<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'for'.")?;

        let initializer: Option<Stmt> = if self.matches(TokenType::SEMICOLON) {
            None
        } else if self.matches(TokenType::VAR) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition: Option<Expr> = if !self.check(TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::SEMICOLON, "Expect ';' after loop condition.")?;

        let increment: Option<Expr> = if !self.check(TokenType::RIGHT_PAREN) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after for clauses.")?;

        let body: Stmt = self.in_loop(|p| p.statement())?;

        let condition: Expr = match condition {
            Some(c) => c,
            None => self.make(ExprKind::Literal(LiteralValue::Bool(true))),
        };

        let looped = Stmt::While {
            condition,
            body: Box::new(body),
            increment,
        };

        Ok(match initializer {
            Some(init) => Stmt::Block(vec![init, looped]),
            None => looped,
        })
    }

    fn if_statement(&mut self) -> PResult<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'if'.")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after if condition.")?;

        let then_branch: Box<Stmt> = Box::new(self.statement()?);
        let else_branch: Option<Box<Stmt>> = if self.matches(TokenType::ELSE) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> PResult<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'while'.")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after condition.")?;
        let body: Box<Stmt> = Box::new(self.in_loop(|p| p.statement())?);

        Ok(Stmt::While {
            condition,
            body,
            increment: None,
        })
    }

    fn break_statement(&mut self) -> PResult<Stmt> {
        let keyword: Token = self.previous().clone();

        if self.loop_depth == 0 {
            self.diagnostics
                .error_at(&keyword, "Can't use 'break' outside of a loop.");
        }

        self.consume(TokenType::SEMICOLON, "Expect ';' after 'break'.")?;

        Ok(Stmt::Break(keyword))
    }

    fn continue_statement(&mut self) -> PResult<Stmt> {
        let keyword: Token = self.previous().clone();

        if self.loop_depth == 0 {
            self.diagnostics
                .error_at(&keyword, "Can't use 'continue' outside of a loop.");
        }

        self.consume(TokenType::SEMICOLON, "Expect ';' after 'continue'.")?;

        Ok(Stmt::Continue(keyword))
    }

    fn return_statement(&mut self) -> PResult<Stmt> {
        let keyword: Token = self.previous().clone();

        if self.function_depth == 0 {
            self.diagnostics
                .error_at(&keyword, "Can't return from top-level code.");
        }

        let value: Option<Expr> = if !self.check(TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::SEMICOLON, "Expect ';' after return value.")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            statements.push(self.declaration());
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after block.")?;

        Ok(statements)
    }

    fn expression_statement(&mut self) -> PResult<Stmt> {
        let expr: Expr = self.expression()?;
        self.consume(TokenType::SEMICOLON, "Expect ';' after expression.")?;

        Ok(Stmt::Expression(expr))
    }

    // ───────────────────────── expression rules ───────────────────

    fn expression(&mut self) -> PResult<Expr> {
        stack::ensure_sufficient_stack(|| self.comma())
    }

    fn comma(&mut self) -> PResult<Expr> {
        self.left_assoc(Self::assignment, &[TokenType::COMMA])
    }

    fn assignment(&mut self) -> PResult<Expr> {
        let expr: Expr = self.ternary()?;

        if !self.matches(TokenType::EQUAL) {
            return Ok(expr);
        }

        let equals: Token = self.previous().clone();
        let value: Box<Expr> = Box::new(self.assignment()?);

        let Expr { id, kind } = expr;

        match kind {
            ExprKind::Variable(name) => Ok(self.make(ExprKind::Assign { name, value })),

            ExprKind::Get { object, name } => Ok(self.make(ExprKind::Set {
                object,
                name,
                value,
            })),

            kind => {
                // Reported but not thrown: the parser is not confused.
                self.diagnostics
                    .error_at(&equals, "Invalid assignment target.");

                Ok(Expr::new(id, kind))
            }
        }
    }

    /// Right‑associative through self‑recursion on the false branch.
    fn ternary(&mut self) -> PResult<Expr> {
        let condition: Expr = self.logical_or()?;

        if !self.matches(TokenType::QUESTION) {
            return Ok(condition);
        }

        let question: Token = self.previous().clone();
        let then_branch: Expr = self.expression()?;

        self.consume(
            TokenType::COLON,
            "Expect ':' after then branch of ternary expression.",
        )?;

        let else_branch: Expr = self.ternary()?;

        Ok(self.make(ExprKind::Ternary {
            condition: Box::new(condition),
            question,
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        }))
    }

    fn logical_or(&mut self) -> PResult<Expr> {
        let mut expr: Expr = self.logical_and()?;

        while self.matches(TokenType::OR) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.logical_and()?;

            expr = self.make(ExprKind::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn logical_and(&mut self) -> PResult<Expr> {
        let mut expr: Expr = self.equality()?;

        while self.matches(TokenType::AND) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.equality()?;

            expr = self.make(ExprKind::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn equality(&mut self) -> PResult<Expr> {
        self.left_assoc(
            Self::comparison,
            &[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL],
        )
    }

    fn comparison(&mut self) -> PResult<Expr> {
        self.left_assoc(
            Self::term,
            &[
                TokenType::GREATER,
                TokenType::GREATER_EQUAL,
                TokenType::LESS,
                TokenType::LESS_EQUAL,
            ],
        )
    }

    fn term(&mut self) -> PResult<Expr> {
        self.left_assoc(Self::factor, &[TokenType::MINUS, TokenType::PLUS])
    }

    fn factor(&mut self) -> PResult<Expr> {
        self.left_assoc(Self::unary, &[TokenType::SLASH, TokenType::STAR])
    }

    /// One precedence level of left‑associative binary operators.
    fn left_assoc(
        &mut self,
        operand: fn(&mut Self) -> PResult<Expr>,
        operators: &[TokenType],
    ) -> PResult<Expr> {
        let mut expr: Expr = operand(self)?;

        while self.match_any(operators) {
            let operator: Token = self.previous().clone();
            let right: Expr = operand(self)?;

            expr = self.make(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn unary(&mut self) -> PResult<Expr> {
        if self.match_any(&[TokenType::BANG, TokenType::MINUS]) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.unary()?;

            return Ok(self.make(ExprKind::Unary {
                operator,
                right: Box::new(right),
            }));
        }

        self.call()
    }

    fn call(&mut self) -> PResult<Expr> {
        let mut expr: Expr = self.primary()?;

        loop {
            if self.matches(TokenType::LEFT_PAREN) {
                expr = self.finish_call(expr)?;
            } else if self.matches(TokenType::DOT) {
                let name: Token =
                    self.consume(TokenType::IDENTIFIER, "Expect property name after '.'.")?;

                expr = self.make(ExprKind::Get {
                    object: Box::new(expr),
                    name,
                });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> PResult<Expr> {
        let mut arguments: Vec<Expr> = Vec::new();

        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if arguments.len() >= MAX_ARITY {
                    let at: Token = self.peek().clone();
                    self.diagnostics
                        .error_at(&at, "Can't have more than 255 arguments.");
                }

                // Arguments sit above the comma operator.
                arguments.push(self.assignment()?);

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        let paren: Token = self.consume(TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?;

        Ok(self.make(ExprKind::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        }))
    }

    fn primary(&mut self) -> PResult<Expr> {
        if self.matches(TokenType::FALSE) {
            return Ok(self.make(ExprKind::Literal(LiteralValue::Bool(false))));
        }
        if self.matches(TokenType::TRUE) {
            return Ok(self.make(ExprKind::Literal(LiteralValue::Bool(true))));
        }
        if self.matches(TokenType::NIL) {
            return Ok(self.make(ExprKind::Nil));
        }

        if self.match_any(&[TokenType::NUMBER(0.0), TokenType::STRING(String::new())]) {
            let kind: ExprKind = match self.previous().literal() {
                Some(value) => ExprKind::Literal(value),
                None => ExprKind::Nil,
            };
            return Ok(self.make(kind));
        }

        if self.matches(TokenType::IDENTIFIER) {
            let name: Token = self.previous().clone();
            return Ok(self.make(ExprKind::Variable(name)));
        }

        if self.matches(TokenType::THIS) {
            let keyword: Token = self.previous().clone();
            return Ok(self.make(ExprKind::This(keyword)));
        }

        if self.matches(TokenType::FUN) {
            let keyword: Token = self.previous().clone();
            let function = self.function_rest(keyword, None, "function")?;
            return Ok(self.make(ExprKind::Function(function)));
        }

        if self.matches(TokenType::LEFT_PAREN) {
            let expr: Expr = self.expression()?;

            self.consume(TokenType::RIGHT_PAREN, "Expect ')' after expression.")?;

            return Ok(self.make(ExprKind::Grouping(Box::new(expr))));
        }

        let at: Token = self.peek().clone();

        Err(self.error(&at, "Expect expression."))
    }

    // ────────────────────── nesting scopes ────────────────────────

    /// Runs `f` one loop level deeper; the counter is restored on every path.
    fn in_loop<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        self.loop_depth += 1;
        let result = f(self);
        self.loop_depth -= 1;
        result
    }

    /// Runs `f` inside a function body.  Loops enclosing the function do not
    /// count inside it.
    fn in_function<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let enclosing_loops: usize = std::mem::replace(&mut self.loop_depth, 0);
        self.function_depth += 1;

        let result = f(self);

        self.function_depth -= 1;
        self.loop_depth = enclosing_loops;
        result
    }

    // ────────────────────── utility helpers ───────────────────────

    #[inline]
    fn make(&mut self, kind: ExprKind) -> Expr {
        Expr::new(self.ids.next_id(), kind)
    }

    fn error(&mut self, token: &Token, message: &str) -> ParseError {
        self.diagnostics.error_at(token, message);
        ParseError
    }

    #[inline(always)]
    fn matches(&mut self, ttype: TokenType) -> bool {
        if self.check(ttype) {
            self.advance();

            return true;
        }

        false
    }

    fn match_any(&mut self, types: &[TokenType]) -> bool {
        for ttype in types {
            if self.matches(ttype.clone()) {
                return true;
            }
        }

        false
    }

    fn consume(&mut self, ttype: TokenType, message: &str) -> PResult<Token> {
        if self.check(ttype) {
            return Ok(self.advance().clone());
        }

        let at: Token = self.peek().clone();

        Err(self.error(&at, message))
    }

    #[inline(always)]
    fn check(&self, ttype: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().token_type == ttype
    }

    fn check_next(&self, ttype: TokenType) -> bool {
        match self.tokens.get(self.current + 1) {
            Some(token) => token.token_type == ttype,
            None => false,
        }
    }

    #[inline(always)]
    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::EOF)
    }

    #[inline(always)]
    fn peek(&self) -> &Token {
        // `new` guarantees a trailing EOF and `advance` never moves past it.
        &self.tokens[self.current]
    }

    #[inline(always)]
    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    /// Discards tokens until it thinks it is at a statement boundary.
    fn synchronize(&mut self) {
        debug!("Synchronizing after syntax error at line {}", self.peek().line);

        self.advance();

        while !self.is_at_end() {
            if matches!(self.previous().token_type, TokenType::SEMICOLON) {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::RETURN
                | TokenType::BREAK
                | TokenType::CONTINUE => return,
                _ => {}
            }

            self.advance();
        }
    }
}
