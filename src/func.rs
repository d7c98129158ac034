use std::cell::RefCell;
use std::fmt::{self, Display};
use std::rc::Rc;

use crate::ast::FunctionDecl;
use crate::environment::Environment;
use crate::error::{RuntimeFault, RuntimeInterrupt};
use crate::interpreter::Interpreter;
use crate::object::Object;

/// A declared function or closure: the shared declaration plus the
/// environment that was active at its definition point. Calling it chains a
/// fresh frame onto that environment, never onto the caller's.
#[derive(Clone)]
pub struct Function {
    declaration: Rc<FunctionDecl>,
    closure: Rc<RefCell<Environment>>,
    is_initializer: bool,
}

impl Function {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        Self { declaration, closure, is_initializer }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// A fresh closure over the same declaration, extended with one frame
    /// that binds `this` to the given instance. Created anew on every
    /// property access, never cached on the instance.
    pub fn bind(&self, instance: Object) -> Function {
        let env = Environment::new().with_enclosing(self.closure.clone()).as_shared();
        env.borrow_mut().define("this", instance);

        Function::new(self.declaration.clone(), env, self.is_initializer)
    }

    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Object>,
    ) -> Result<Object, RuntimeFault> {
        let environment = Environment::new().with_enclosing(self.closure.clone()).as_shared();

        {
            let mut env = environment.borrow_mut();
            for (param, arg) in self.declaration.params.iter().zip(arguments) {
                env.define(&param.lexeme, arg);
            }
        }

        match interpreter.execute_block(&self.declaration.body, environment) {
            Err(RuntimeInterrupt::Fault(fault)) => Err(fault),
            Err(RuntimeInterrupt::Return { value }) => {
                // A bare return in an initializer still yields the instance
                if self.is_initializer {
                    Ok(self.bound_this())
                } else {
                    Ok(value)
                }
            }
            Ok(()) => {
                if self.is_initializer {
                    Ok(self.bound_this())
                } else {
                    Ok(Object::Null)
                }
            }
        }
    }

    fn bound_this(&self) -> Object {
        // An initializer is only ever called through `bind`, so its closure
        // is the frame defining 'this'.
        self.closure
            .borrow()
            .get_local("this")
            .expect("initializer closure must define 'this'")
    }
}

impl fmt::Debug for Function {
    // Closures can be cyclic through their environment, so keep Debug flat
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name())
            .field("arity", &self.arity())
            .field("is_initializer", &self.is_initializer)
            .finish()
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

/// A built-in callable. The variant set is tiny (a clock), so a plain
/// function pointer is enough.
#[derive(Debug, Clone)]
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub function: fn(&[Object]) -> Object,
}

impl Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn>")
    }
}

/// Wall-clock seconds since the Unix epoch, the single native binding.
pub fn clock() -> NativeFunction {
    use std::time::{SystemTime, UNIX_EPOCH};

    fn current_time(_arguments: &[Object]) -> Object {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backward");

        Object::Number(since_epoch.as_millis() as f64 / 1000.0)
    }

    NativeFunction { name: "clock", arity: 0, function: current_time }
}
