use thiserror::Error;

use crate::object::Object;
use crate::token::Token;

/// An error raised during evaluation. Carries the offending token for
/// line/lexeme context and unconditionally aborts the current execution
/// unit.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("[line {}] {message}", .token.line)]
pub struct RuntimeFault {
    pub token: Token,
    pub message: String,
}

impl RuntimeFault {
    pub fn new(token: Token, message: impl Into<String>) -> Self {
        Self { token, message: message.into() }
    }
}

/// The Err channel of statement execution. `Return` is pure control flow:
/// it unwinds to the nearest enclosing call frame, where `Function::call`
/// consumes it. Only `Fault` ever reaches the driver.
#[derive(Debug)]
pub enum RuntimeInterrupt {
    Fault(RuntimeFault),
    Return { value: Object },
}

impl From<RuntimeFault> for RuntimeInterrupt {
    fn from(fault: RuntimeFault) -> Self {
        Self::Fault(fault)
    }
}
