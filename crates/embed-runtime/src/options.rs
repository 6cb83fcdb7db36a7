//! Options for a single run.

use crate::error::RuntimeError;
use crate::module::NativeModule;

/// What to run: process-style arguments plus the native module to inject.
#[derive(Debug)]
pub struct RunOptions<B> {
    args: Vec<String>,
    insert_default_process_arg: bool,
    deferred: bool,
    module: NativeModule<B>,
}

impl<B> RunOptions<B> {
    pub fn new(module: NativeModule<B>) -> Self {
        Self {
            args: Vec::new(),
            insert_default_process_arg: true,
            deferred: false,
            module,
        }
    }

    pub fn args<T, I>(mut self, args: T) -> Self
    where
        T: IntoIterator<Item = I>,
        I: ToString,
    {
        self.args = args.into_iter().map(|arg| arg.to_string()).collect();
        self
    }

    /// Prepend the host executable as `argv[0]` unless the arguments already
    /// start with it. Enabled by default.
    pub fn insert_default_process_arg(mut self, insert: bool) -> Self {
        self.insert_default_process_arg = insert;
        self
    }

    /// Reserved. Runs with this flag set are rejected.
    pub fn deferred(mut self, deferred: bool) -> Self {
        self.deferred = deferred;
        self
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// The arguments handed to process initialization.
    pub fn process_args(&self) -> Result<Vec<String>, RuntimeError> {
        if !self.insert_default_process_arg {
            return Ok(self.args.clone());
        }

        let program = std::env::args().next().ok_or_else(|| {
            RuntimeError::InvalidOptions("failed to determine the host program name".to_string())
        })?;
        Ok(self.with_program(program))
    }

    fn with_program(&self, program: String) -> Vec<String> {
        let mut args = self.args.clone();
        if args.first() != Some(&program) {
            args.insert(0, program);
        }
        args
    }

    pub fn into_module(self) -> NativeModule<B> {
        self.module
    }
}
