use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::rc::Rc;

use crate::error::RuntimeFault;
use crate::func::Function;
use crate::interpreter::Interpreter;
use crate::object::Object;
use crate::token::Token;

/// A class value: a name plus its method table. Methods live here, never on
/// instances; an instance only stores fields.
pub struct Class {
    name: String,
    methods: HashMap<String, Function>,
}

impl Class {
    pub fn new(name: impl AsRef<str>, methods: HashMap<String, Function>) -> Self {
        Self { name: name.as_ref().to_owned(), methods }
    }

    /// Calling a class allocates an instance and, when an `init` method
    /// exists, runs it bound to the new instance. The instance is always
    /// what the call yields; init's own return value is discarded.
    pub fn construct(
        class: Rc<Class>,
        arguments: Vec<Object>,
        interpreter: &mut Interpreter,
    ) -> Result<Object, RuntimeFault> {
        let instance = Rc::new(RefCell::new(Instance::new(class.clone())));

        if let Some(initializer) = class.find_method("init") {
            initializer.bind(Object::Instance(instance.clone())).call(interpreter, arguments)?;
        }

        Ok(Object::Instance(instance))
    }

    pub fn find_method(&self, name: &str) -> Option<&Function> {
        self.methods.get(name)
    }

    pub fn arity(&self) -> usize {
        self.find_method("init").map(Function::arity).unwrap_or(0)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class").field("name", &self.name).finish()
    }
}

impl Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

/// One object of a class. Field storage starts out empty and is filled
/// lazily on first write; it never aliases another instance's fields.
pub struct Instance {
    class: Rc<Class>,
    fields: HashMap<String, Object>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self { class, fields: HashMap::new() }
    }

    /// Fields shadow methods. A method found in the class table is returned
    /// as a fresh bound copy closing over this receiver.
    pub fn get(&self, name: &Token, receiver: &Object) -> Result<Object, RuntimeFault> {
        if let Some(value) = self.fields.get(&name.lexeme) {
            return Ok(value.clone());
        }

        if let Some(method) = self.class.find_method(&name.lexeme) {
            let bound = method.bind(receiver.clone());
            return Ok(Object::Function(Rc::new(bound)));
        }

        Err(RuntimeFault::new(
            name.clone(),
            format!("Undefined property '{}' on {}.", name.lexeme, self),
        ))
    }

    /// Setting always succeeds; fields are created freely on first write.
    pub fn set(&mut self, name: &Token, value: Object) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}

impl fmt::Debug for Instance {
    // Fields can be cyclic through self-referencing values, so keep Debug flat
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance").field("class", &self.class.name).finish()
    }
}

impl Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} instance>", self.class.name)
    }
}
