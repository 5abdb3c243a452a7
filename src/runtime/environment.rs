use crate::runtime::{
    error::{RuntimeError, RuntimeResult},
    platform::Platform,
    session::SessionState,
    value::Value,
};
use std::collections::HashMap;

/// Arguments of one built-in call, as materialised by the interpreter.
#[derive(Clone, Debug, Default)]
pub struct CallArgs {
    positional: Vec<Value>,
    named: HashMap<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn positional(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn named(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.named.insert(name.to_string(), value.into());
        self
    }

    pub fn push(&mut self, value: Value) {
        self.positional.push(value);
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.named.insert(name.into(), value);
    }
}

/// Binding environment for a single built-in call. Borrows the session for the
/// duration of the call and never mutates it.
pub struct ExecutionContext<'a> {
    args: CallArgs,
    session: &'a SessionState,
    platform: &'a dyn Platform,
    authenticated: bool,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(args: CallArgs, session: &'a SessionState, platform: &'a dyn Platform) -> Self {
        Self {
            args,
            session,
            platform,
            authenticated: false,
        }
    }

    /// Outcome of the script signature check, decided by the interpreter.
    pub fn with_authenticated(mut self, authenticated: bool) -> Self {
        self.authenticated = authenticated;
        self
    }

    pub fn session_state(&self) -> &'a SessionState {
        self.session
    }

    pub fn platform(&self) -> &'a dyn Platform {
        self.platform
    }

    pub fn positional(&self, index: usize) -> Option<&Value> {
        self.args.positional.get(index)
    }

    pub fn positional_count(&self) -> usize {
        self.args.positional.len()
    }

    /// Strings and data come back as their bytes; integers are rendered in
    /// decimal the way the language coerces them.
    pub fn get_positional_string(&self, index: usize) -> Option<Vec<u8>> {
        match self.args.positional.get(index)? {
            Value::String(bytes) | Value::Data(bytes) => Some(bytes.clone()),
            Value::Int(i) => Some(i.to_string().into_bytes()),
            Value::Undefined | Value::Array(_) => None,
        }
    }

    pub fn get_positional_int(&self, index: usize, default: i64) -> i64 {
        self.args
            .positional
            .get(index)
            .and_then(Value::as_int)
            .unwrap_or(default)
    }

    pub fn get_named_int(&self, name: &str, default: i64) -> i64 {
        self.args
            .named
            .get(name)
            .and_then(Value::as_int)
            .unwrap_or(default)
    }

    pub fn require_authenticated(&self, builtin: &'static str) -> RuntimeResult<()> {
        if self.authenticated {
            Ok(())
        } else {
            Err(RuntimeError::Unauthorized { builtin })
        }
    }
}
