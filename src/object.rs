use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;

use crate::class::{Class, Instance};
use crate::func::{Function, NativeFunction};

/// A runtime value. The callable variants form a closed set on purpose:
/// call dispatch is one match arm per variant in the interpreter, not a
/// shared trait object.
#[derive(Debug, Clone)]
pub enum Object {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    Native(NativeFunction),
    Function(Rc<Function>),
    Class(Rc<Class>),
    Instance(Rc<RefCell<Instance>>),
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(left), Self::Boolean(right)) => left == right,
            (Self::Number(left), Self::Number(right)) => left == right,
            (Self::String(left), Self::String(right)) => left == right,
            // Callables and instances compare by identity, never structurally
            (Self::Native(left), Self::Native(right)) => left.name == right.name,
            (Self::Function(left), Self::Function(right)) => Rc::ptr_eq(left, right),
            (Self::Class(left), Self::Class(right)) => Rc::ptr_eq(left, right),
            (Self::Instance(left), Self::Instance(right)) => Rc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl Object {
    pub fn number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl Display for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "nil"),
            Self::Boolean(b) => write!(f, "{}", b),
            // `{}` on f64 already drops a whole-number fraction: 3.0 -> "3"
            Self::Number(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{}", s),
            Self::Native(n) => write!(f, "{}", n),
            Self::Function(func) => write!(f, "{}", func),
            Self::Class(c) => write!(f, "{}", c),
            Self::Instance(i) => write!(f, "{}", i.borrow()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_display_without_trailing_fraction() {
        assert_eq!(Object::Number(3.0).to_string(), "3");
        assert_eq!(Object::Number(3.25).to_string(), "3.25");
        assert_eq!(Object::Number(-0.5).to_string(), "-0.5");
    }

    #[test]
    fn null_displays_as_nil() {
        assert_eq!(Object::Null.to_string(), "nil");
    }

    #[test]
    fn equality_does_not_coerce() {
        assert_ne!(Object::Number(1.0), Object::String("1".to_owned()));
        assert_ne!(Object::Boolean(false), Object::Null);
        assert_eq!(Object::Null, Object::Null);
        assert_eq!(Object::Number(2.0), Object::Number(2.0));
    }
}
