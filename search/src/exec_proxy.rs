//! Pass-through wrapper handed to the step function as its execution entry point.

use anyhow::Result;

use crate::core::cancel::CancelToken;
use crate::core::types::ExecutionResult;
use crate::io::interpreter::Interpreter;
use crate::observer::{RunEvent, RunObserver};

/// Execution entry point available to a step function.
pub trait ExecCallback {
    fn exec(&mut self, code: &str) -> Result<ExecutionResult>;
}

/// Forwards every call to the wrapped interpreter unchanged, emitting
/// [`RunEvent::ExecutionStarted`] before and [`RunEvent::ExecutionFinished`]
/// after, whether the call succeeded or not.
pub struct ExecProxy<'a> {
    interpreter: &'a mut dyn Interpreter,
    observer: &'a mut dyn RunObserver,
    cancel: &'a CancelToken,
}

impl<'a> ExecProxy<'a> {
    pub fn new(
        interpreter: &'a mut dyn Interpreter,
        observer: &'a mut dyn RunObserver,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            interpreter,
            observer,
            cancel,
        }
    }
}

impl ExecCallback for ExecProxy<'_> {
    fn exec(&mut self, code: &str) -> Result<ExecutionResult> {
        self.observer.on_event(&RunEvent::ExecutionStarted);
        let result = self.interpreter.run(code, self.cancel);
        self.observer.on_event(&RunEvent::ExecutionFinished);
        result
    }
}
