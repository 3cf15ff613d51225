use crate::error::RuntimeError;
use crate::token::Token;
use crate::value::Value;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Shared handle to a scope.  Closures, child scopes and the interpreter may
/// all hold one; mutation through any handle is visible through every other.
pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wraps the environment into a shareable handle.
    pub fn into_ref(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    /// Inserts or overwrites `name` in this scope only.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Name lookup along the whole chain.  Used for unresolved (global) names.
    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    pub fn assign(&mut self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }

    /// Walks exactly `depth` enclosing links up from `env`.
    pub fn ancestor(env: &EnvRef, depth: usize) -> Option<EnvRef> {
        let mut current: EnvRef = Rc::clone(env);

        for _ in 0..depth {
            let next: EnvRef = current.borrow().enclosing.clone()?;
            current = next;
        }

        Some(current)
    }

    /// Reads `name` from the scope `depth` hops up, without searching others.
    pub fn get_at(env: &EnvRef, depth: usize, name: &Token) -> Result<Value, RuntimeError> {
        debug!("get_at depth={} name={}", depth, name.lexeme);

        let scope: EnvRef = Self::ancestor(env, depth).ok_or_else(|| undefined(name))?;
        let value: Option<Value> = scope.borrow().values.get(&name.lexeme).cloned();

        value.ok_or_else(|| undefined(name))
    }

    /// Writes `name` in the scope `depth` hops up; the name must exist there.
    pub fn assign_at(
        env: &EnvRef,
        depth: usize,
        name: &Token,
        value: Value,
    ) -> Result<(), RuntimeError> {
        debug!("assign_at depth={} name={}", depth, name.lexeme);

        let scope: EnvRef = Self::ancestor(env, depth).ok_or_else(|| undefined(name))?;
        let mut target = scope.borrow_mut();

        let outcome = match target.values.get_mut(&name.lexeme) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(undefined(name)),
        };

        outcome
    }
}

fn undefined(name: &Token) -> RuntimeError {
    RuntimeError::new(name, format!("Undefined variable '{}'.", name.lexeme))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(name: &str) -> Token {
        Token::synthetic(name, 1)
    }

    #[test]
    fn get_at_skips_shadowing_scopes() {
        let globals: EnvRef = Environment::new().into_ref();
        globals.borrow_mut().define("a", Value::Number(1.0));

        let inner: EnvRef = Environment::with_enclosing(Rc::clone(&globals)).into_ref();
        inner.borrow_mut().define("a", Value::Number(2.0));

        let a = tok("a");
        assert_eq!(Environment::get_at(&inner, 0, &a).ok(), Some(Value::Number(2.0)));
        assert_eq!(Environment::get_at(&inner, 1, &a).ok(), Some(Value::Number(1.0)));
    }

    #[test]
    fn get_at_does_not_search_other_scopes() {
        let globals: EnvRef = Environment::new().into_ref();
        globals.borrow_mut().define("a", Value::Number(1.0));
        let inner: EnvRef = Environment::with_enclosing(Rc::clone(&globals)).into_ref();

        let err = Environment::get_at(&inner, 0, &tok("a")).unwrap_err();
        assert_eq!(err.message, "Undefined variable 'a'.");
    }

    #[test]
    fn assignment_through_shared_parent_is_visible_to_siblings() {
        let parent: EnvRef = Environment::new().into_ref();
        parent.borrow_mut().define("n", Value::Number(0.0));

        let left: EnvRef = Environment::with_enclosing(Rc::clone(&parent)).into_ref();
        let right: EnvRef = Environment::with_enclosing(Rc::clone(&parent)).into_ref();

        Environment::assign_at(&left, 1, &tok("n"), Value::Number(5.0)).unwrap();

        assert_eq!(Environment::get_at(&right, 1, &tok("n")).ok(), Some(Value::Number(5.0)));
    }

    #[test]
    fn assign_to_missing_name_fails() {
        let env: EnvRef = Environment::new().into_ref();
        let err = env.borrow_mut().assign(&tok("ghost"), Value::Nil).unwrap_err();

        assert_eq!(err.message, "Undefined variable 'ghost'.");
        assert_eq!(err.token.lexeme, "ghost");
    }
}
