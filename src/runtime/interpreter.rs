use crate::runtime::{
    builtins,
    environment::{CallArgs, ExecutionContext},
    error::{RuntimeError, RuntimeResult},
    platform::Platform,
    session::SessionState,
    value::Reply,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Call surface between a running script and the host built-ins. One
/// interpreter serves one script instance; the platform handle may be
/// shared between instances.
#[derive(Clone)]
pub struct Interpreter {
    platform: Arc<dyn Platform>,
    authenticated: bool,
    script: String,
}

impl Interpreter {
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self {
            platform,
            authenticated: false,
            script: String::from("<inline>"),
        }
    }

    pub fn with_script_name(mut self, script: impl Into<String>) -> Self {
        self.script = script.into();
        self
    }

    /// Result of the signature check on the running script.
    pub fn with_authenticated(mut self, authenticated: bool) -> Self {
        self.authenticated = authenticated;
        self
    }

    pub fn is_builtin_name(&self, name: &str) -> bool {
        builtins::lookup(name).is_some()
    }

    /// Runs `name` against `session`. Script-level failures come back as
    /// `Reply::Declined` after a diagnostic; only an unknown name is an error.
    pub fn call_builtin(
        &self,
        session: &SessionState,
        name: &str,
        args: CallArgs,
    ) -> RuntimeResult<Reply> {
        let builtin = builtins::lookup(name).ok_or_else(|| RuntimeError::UnknownBuiltin {
            name: name.to_string(),
        })?;
        let ctx = ExecutionContext::new(args, session, self.platform.as_ref())
            .with_authenticated(self.authenticated);
        match builtin(&ctx) {
            Ok(value) => Ok(Reply::Value(value)),
            Err(err) if err.is_decline() => {
                self.report_decline(name, &err);
                Ok(Reply::Declined)
            }
            Err(err) => Err(err),
        }
    }

    fn report_decline(&self, builtin: &str, err: &RuntimeError) {
        match err {
            RuntimeError::NoData { .. } => {
                debug!(script = %self.script, builtin, error = %err, "no value")
            }
            _ => warn!(script = %self.script, builtin, error = %err, "built-in declined"),
        }
    }
}
