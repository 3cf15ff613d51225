use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, ExprKind, Stmt};
use crate::environment::{EnvRef, Environment};
use crate::error::RuntimeError;
use crate::natives;
use crate::resolver::Resolutions;
use crate::stack;
use crate::token::{LiteralValue, Token, TokenType};
use crate::value::{Callable, Instance, PoplClass, PoplFunction, Value, INITIALIZER};

/// Nested calls allowed before the interpreter gives up with "Stack overflow.".
pub const MAX_CALL_DEPTH: usize = 2_000;

/// Outcome of executing one statement.  Non‑`Normal` variants unwind to the
/// nearest loop (`Break`, `Continue`) or call boundary (`Return`).
#[derive(Debug)]
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Convenient alias for interpreter results.
pub type IResult<T> = Result<T, RuntimeError>;

pub struct Interpreter {
    globals: EnvRef,
    environment: EnvRef,
    locals: HashMap<ExprId, usize>,
    out: Box<dyn Write>,
    input: Box<dyn BufRead>,
    repl_mode: bool,
    call_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Interpreter wired to the process's stdout and stdin.
    pub fn new() -> Self {
        Self::with_io(
            Box::new(io::stdout()),
            Box::new(BufReader::new(io::stdin())),
        )
    }

    /// Interpreter with injected output sink and input source.  The global
    /// environment is seeded with the native functions.
    pub fn with_io(out: Box<dyn Write>, input: Box<dyn BufRead>) -> Self {
        info!("Initializing Interpreter");

        let globals: EnvRef = Environment::new().into_ref();
        natives::register_all(&globals);

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            out,
            input,
            repl_mode: false,
            call_depth: 0,
        }
    }

    /// In REPL mode top‑level expression statements echo their value.
    pub fn set_repl_mode(&mut self, enabled: bool) {
        self.repl_mode = enabled;
    }

    /// Merges the depths recorded by a resolver pass.
    pub fn commit(&mut self, resolutions: Resolutions) {
        debug!("Committing {} resolution(s)", resolutions.len());
        self.locals.extend(resolutions);
    }

    /// Writes `text` and a newline to the output sink.
    pub fn write_line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text)?;
        self.out.flush()
    }

    /// Next line of input without its terminator; `None` at end of input.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line: String = String::new();

        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }

        Ok(Some(line))
    }

    /// Interprets a list of statements (a "program").  The first runtime
    /// error aborts the rest and is handed back; the interpreter stays usable.
    pub fn interpret(&mut self, statements: &[Stmt]) -> IResult<()> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            if let Err(error) = self.execute_top_level(stmt) {
                info!("Interpretation aborted: {}", error.message);

                self.environment = Rc::clone(&self.globals);
                self.call_depth = 0;

                return Err(error);
            }
        }

        info!("Interpretation completed successfully");

        Ok(())
    }

    fn execute_top_level(&mut self, stmt: &Stmt) -> IResult<()> {
        match stmt {
            Stmt::Expression(expr) if self.repl_mode => {
                let value: Value = self.evaluate(expr)?;
                self.echo(expr, &value)
            }

            _ => self.execute(stmt).map(|_| ()),
        }
    }

    fn echo(&mut self, expr: &Expr, value: &Value) -> IResult<()> {
        let anchor: Token = Token::synthetic("<repl>", expr.line());

        check_initialized(&anchor, value)?;

        if matches!(value, Value::Nil) {
            return Ok(());
        }

        self.write_line(&value.to_string())
            .map_err(|e| RuntimeError::new(&anchor, e.to_string()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> IResult<Flow> {
        stack::ensure_sufficient_stack(|| self.execute_stmt(stmt))
    }

    fn execute_stmt(&mut self, stmt: &Stmt) -> IResult<Flow> {
        match stmt {
            Stmt::Nop => Ok(Flow::Normal),

            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Uninitialized,
                };

                debug!("Defining variable '{}' = {}", name.lexeme, value);

                self.environment.borrow_mut().define(&name.lexeme, value);

                Ok(Flow::Normal)
            }

            Stmt::Block(statements) => {
                debug!("Entering block with {} statements", statements.len());

                let scope: EnvRef =
                    Environment::with_enclosing(Rc::clone(&self.environment)).into_ref();

                self.execute_block(statements, scope)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(eb) = else_branch {
                    self.execute(eb)
                } else {
                    Ok(Flow::Normal)
                }
            }

            Stmt::While {
                condition,
                body,
                increment,
            } => {
                debug!("Entering while loop");

                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }

                    if let Some(inc) = increment {
                        self.evaluate(inc)?;
                    }
                }

                debug!("Exited while loop");

                Ok(Flow::Normal)
            }

            Stmt::Break(_) => Ok(Flow::Break),

            Stmt::Continue(_) => Ok(Flow::Continue),

            Stmt::Function { name, function } => {
                debug!("Defining function '{}'", name.lexeme);

                let value: PoplFunction = PoplFunction::new(
                    Rc::clone(function),
                    Rc::clone(&self.environment),
                    false,
                );

                self.environment.borrow_mut().define(
                    &name.lexeme,
                    Value::Callable(Callable::Function(Rc::new(value))),
                );

                Ok(Flow::Normal)
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Ok(Flow::Return(value))
            }

            Stmt::Class { name, methods } => {
                debug!("Defining class '{}'", name.lexeme);

                // Methods may name their own class.
                self.environment
                    .borrow_mut()
                    .define(&name.lexeme, Value::Nil);

                let mut table: HashMap<String, Rc<PoplFunction>> = HashMap::new();

                for method in methods {
                    let Some(method_name) = &method.name else {
                        continue;
                    };

                    let function: PoplFunction = PoplFunction::new(
                        Rc::clone(method),
                        Rc::clone(&self.environment),
                        method_name.lexeme == INITIALIZER,
                    );

                    table.insert(method_name.lexeme.clone(), Rc::new(function));
                }

                let class: PoplClass = PoplClass {
                    name: name.lexeme.clone(),
                    methods: table,
                };

                self.environment
                    .borrow_mut()
                    .assign(name, Value::Callable(Callable::Class(Rc::new(class))))?;

                Ok(Flow::Normal)
            }
        }
    }

    /// Runs `statements` inside `environment`, restoring the previous
    /// environment on every exit path.  Stops at the first non‑`Normal` flow.
    pub fn execute_block(&mut self, statements: &[Stmt], environment: EnvRef) -> IResult<Flow> {
        let previous: EnvRef = std::mem::replace(&mut self.environment, environment);

        let mut outcome: IResult<Flow> = Ok(Flow::Normal);

        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => {}
                other => {
                    outcome = other;
                    break;
                }
            }
        }

        self.environment = previous;

        outcome
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> IResult<Value> {
        stack::ensure_sufficient_stack(|| self.evaluate_expr(expr))
    }

    fn evaluate_expr(&mut self, expr: &Expr) -> IResult<Value> {
        match &expr.kind {
            ExprKind::Nil => Ok(Value::Nil),

            ExprKind::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::Bool(b) => Value::Bool(*b),
                LiteralValue::Nil => Value::Nil,
            }),

            ExprKind::Grouping(inner) => self.evaluate(inner),

            ExprKind::Unary { operator, right } => self.evaluate_unary(operator, right),

            ExprKind::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            ExprKind::Ternary {
                condition,
                question,
                then_branch,
                else_branch,
            } => {
                let cond: Value = self.evaluate(condition)?;
                check_initialized(question, &cond)?;

                if cond.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            ExprKind::Logical {
                left,
                operator,
                right,
            } => {
                let left_val: Value = self.evaluate(left)?;

                let short_circuit: bool = if operator.token_type == TokenType::OR {
                    left_val.is_truthy()
                } else {
                    !left_val.is_truthy()
                };

                if short_circuit {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }

            ExprKind::Variable(name) => self.look_up_variable(name, expr.id),

            ExprKind::This(keyword) => self.look_up_variable(keyword, expr.id),

            ExprKind::Assign { name, value } => {
                let value: Value = self.evaluate(value)?;

                debug!("Assigning {} to '{}'", value, name.lexeme);

                match self.locals.get(&expr.id) {
                    Some(depth) => {
                        Environment::assign_at(&self.environment, *depth, name, value.clone())?
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            ExprKind::Call {
                callee,
                paren,
                arguments,
            } => {
                let Value::Callable(callable) = self.evaluate(callee)? else {
                    return Err(RuntimeError::new(
                        paren,
                        "Can only call functions and classes.",
                    ));
                };

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }

                if args.len() != callable.arity() {
                    return Err(RuntimeError::new(
                        paren,
                        format!(
                            "Expected {} arguments but got {}.",
                            callable.arity(),
                            args.len()
                        ),
                    ));
                }

                self.call(&callable, args, paren)
            }

            ExprKind::Function(declaration) => {
                let function: PoplFunction = PoplFunction::new(
                    Rc::clone(declaration),
                    Rc::clone(&self.environment),
                    false,
                );

                Ok(Value::Callable(Callable::Function(Rc::new(function))))
            }

            ExprKind::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Instance::get(&instance, name),
                _ => Err(RuntimeError::new(name, "Only instances have properties.")),
            },

            ExprKind::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(RuntimeError::new(name, "Only instances have fields."));
                };

                let value: Value = self.evaluate(value)?;
                instance.borrow_mut().set(name, value.clone());

                Ok(value)
            }
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> IResult<Value> {
        let value: Value = self.evaluate(right)?;
        check_initialized(operator, &value)?;

        match operator.token_type {
            TokenType::MINUS => match value {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(RuntimeError::new(operator, "Operand must be a number.")),
            },

            TokenType::BANG => Ok(Value::Bool(!value.is_truthy())),

            _ => Err(RuntimeError::new(operator, "Unknown unary operator.")),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> IResult<Value> {
        let left_val: Value = self.evaluate(left)?;
        let right_val: Value = self.evaluate(right)?;

        check_initialized(operator, &left_val)?;
        check_initialized(operator, &right_val)?;

        debug!(
            "Binary '{}' on {} and {}",
            operator.lexeme, left_val, right_val
        );

        match operator.token_type {
            TokenType::COMMA => Ok(right_val),

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_val == right_val)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_val != right_val)),

            TokenType::PLUS => match (&left_val, &right_val) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),

                (Value::String(_), _) | (_, Value::String(_)) => {
                    Ok(Value::String(format!("{}{}", left_val, right_val)))
                }

                _ => Err(RuntimeError::new(
                    operator,
                    "Operands must be two numbers or two strings.",
                )),
            },

            TokenType::MINUS
            | TokenType::STAR
            | TokenType::SLASH
            | TokenType::GREATER
            | TokenType::GREATER_EQUAL
            | TokenType::LESS
            | TokenType::LESS_EQUAL => {
                let (Value::Number(a), Value::Number(b)) = (&left_val, &right_val) else {
                    return Err(RuntimeError::new(operator, "Operands must be numbers."));
                };

                let (a, b): (f64, f64) = (*a, *b);

                match operator.token_type {
                    TokenType::MINUS => Ok(Value::Number(a - b)),
                    TokenType::STAR => Ok(Value::Number(a * b)),
                    TokenType::SLASH if b == 0.0 => {
                        Err(RuntimeError::new(operator, "Division by zero."))
                    }
                    TokenType::SLASH => Ok(Value::Number(a / b)),
                    TokenType::GREATER => Ok(Value::Bool(a > b)),
                    TokenType::GREATER_EQUAL => Ok(Value::Bool(a >= b)),
                    TokenType::LESS => Ok(Value::Bool(a < b)),
                    _ => Ok(Value::Bool(a <= b)),
                }
            }

            _ => Err(RuntimeError::new(operator, "Unknown binary operator.")),
        }
    }

    /// Resolved locals jump straight to their scope; everything else is global.
    fn look_up_variable(&self, name: &Token, id: ExprId) -> IResult<Value> {
        match self.locals.get(&id) {
            Some(depth) => Environment::get_at(&self.environment, *depth, name),
            None => self.globals.borrow().get(name),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────────

    fn call(&mut self, callable: &Callable, arguments: Vec<Value>, paren: &Token) -> IResult<Value> {
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::new(paren, "Stack overflow."));
        }

        debug!("Calling {} with {} argument(s)", callable, arguments.len());

        self.call_depth += 1;

        let result: IResult<Value> = match callable {
            Callable::Native(native) => {
                (native.func)(self, &arguments).map_err(|message| RuntimeError::new(paren, message))
            }
            Callable::Function(function) => self.call_function(function, arguments),
            Callable::Class(class) => self.instantiate(class, arguments),
        };

        self.call_depth -= 1;

        result
    }

    /// Parameters live in a fresh scope whose parent is the closure, not the
    /// caller's environment.
    fn call_function(&mut self, function: &PoplFunction, arguments: Vec<Value>) -> IResult<Value> {
        let mut scope: Environment = Environment::with_enclosing(Rc::clone(&function.closure));

        for (param, arg) in function.declaration.params.iter().zip(arguments) {
            scope.define(&param.lexeme, arg);
        }

        let flow: Flow = self.execute_block(&function.declaration.body, scope.into_ref())?;

        if function.is_initializer {
            let this: Token = Token::synthetic("this", function.declaration.keyword.line);
            return Environment::get_at(&function.closure, 0, &this);
        }

        match flow {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Nil),
        }
    }

    /// The result is always the new instance; `init`'s own result is dropped.
    fn instantiate(&mut self, class: &Rc<PoplClass>, arguments: Vec<Value>) -> IResult<Value> {
        let instance: Rc<RefCell<Instance>> =
            Rc::new(RefCell::new(Instance::new(Rc::clone(class))));

        if let Some(initializer) = class.find_method(INITIALIZER) {
            let bound: PoplFunction = initializer.bind(Rc::clone(&instance));
            self.call_function(&bound, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

/// Reading the uninitialized marker as an operand is an error at its use.
fn check_initialized(token: &Token, value: &Value) -> IResult<()> {
    if value.is_uninitialized() {
        Err(RuntimeError::new(token, "Use of uninitialized value."))
    } else {
        Ok(())
    }
}
