//! Host functions seeded into the global environment before any user code
//! runs.

use std::rc::Rc;

use log::debug;

use crate::environment::EnvRef;
use crate::interpreter::Interpreter;
use crate::value::{Callable, NativeFn, NativeFunction, Value};

/// Defines `clock`, `print` and `input` in `globals`.
pub fn register_all(globals: &EnvRef) {
    define(globals, "clock", 0, clock);
    define(globals, "print", 1, print);
    define(globals, "input", 0, input);
}

fn define(globals: &EnvRef, name: &str, arity: usize, func: NativeFn) {
    debug!("Defining native function '{}'", name);

    let native: NativeFunction = NativeFunction {
        name: name.to_string(),
        arity,
        func,
    };

    globals
        .borrow_mut()
        .define(name, Value::Callable(Callable::Native(Rc::new(native))));
}

/// Seconds since the Unix epoch, with millisecond precision.
fn clock(_interpreter: &mut Interpreter, _args: &[Value]) -> Result<Value, String> {
    let millis: i64 = chrono::Utc::now().timestamp_millis();

    Ok(Value::Number(millis as f64 / 1000.0))
}

fn print(interpreter: &mut Interpreter, args: &[Value]) -> Result<Value, String> {
    let [value] = args else {
        return Err(format!("Expected 1 arguments but got {}.", args.len()));
    };

    if value.is_uninitialized() {
        return Err("Use of uninitialized value.".to_string());
    }

    interpreter
        .write_line(&value.to_string())
        .map_err(|e| format!("Could not write output: {}", e))?;

    Ok(Value::Nil)
}

fn input(interpreter: &mut Interpreter, _args: &[Value]) -> Result<Value, String> {
    let line: Option<String> = interpreter
        .read_line()
        .map_err(|e| format!("Could not read input: {}", e))?;

    Ok(line.map_or(Value::Nil, Value::String))
}
