use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::RuntimeFault;
use crate::object::Object;
use crate::token::Token;

/// One lexical scope frame: name-to-value bindings plus the link to the
/// enclosing frame. Frames are shared-owned; every closure created while a
/// frame is active keeps it alive after the block exits.
#[derive(Debug, Default)]
pub struct Environment {
    pub enclosing: Option<Rc<RefCell<Environment>>>,
    values: HashMap<String, Object>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enclosing(self, enclosing: Rc<RefCell<Environment>>) -> Self {
        Self { enclosing: Some(enclosing), ..Default::default() }
    }

    pub fn as_shared(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }

    pub fn define(&mut self, name: &str, value: Object) {
        self.values.insert(name.to_owned(), value);
    }

    pub fn assign(&mut self, name: &Token, value: Object) -> Result<(), RuntimeFault> {
        if !self.values.contains_key(&name.lexeme) {
            // Ask one level above if possible
            if let Some(ref e) = self.enclosing {
                return e.borrow_mut().assign(name, value);
            }

            return Err(RuntimeFault::new(
                name.clone(),
                format!("Undefined variable '{}'.", name.lexeme),
            ));
        }

        self.values.insert(name.lexeme.clone(), value);
        Ok(())
    }

    pub fn assign_at(
        &mut self,
        distance: usize,
        name: &Token,
        value: Object,
    ) -> Result<(), RuntimeFault> {
        if distance == 0 {
            return self.assign(name, value);
        }

        match self.ancestor(distance) {
            None => Err(RuntimeFault::new(
                name.clone(),
                format!("No enclosing environment at {distance} for '{}'.", name.lexeme),
            )),
            Some(ancestor) => ancestor.borrow_mut().assign(name, value),
        }
    }

    pub fn get(&self, name: &Token) -> Result<Object, RuntimeFault> {
        if let Some(value) = self.values.get(&name.lexeme) {
            return Ok(value.clone());
        }

        // Ask one level above if possible
        if let Some(ref e) = self.enclosing {
            return e.borrow().get(name);
        }

        Err(RuntimeFault::new(name.clone(), format!("Undefined variable '{}'.", name.lexeme)))
    }

    pub fn get_at(&self, distance: usize, name: &Token) -> Result<Object, RuntimeFault> {
        if distance == 0 {
            return self.get(name);
        }

        match self.ancestor(distance) {
            None => Err(RuntimeFault::new(
                name.clone(),
                format!("No enclosing environment at {distance} for '{}'.", name.lexeme),
            )),
            Some(ancestor) => {
                let value = ancestor.borrow().get(name);
                value
            }
        }
    }

    /// Direct lookup in this frame only, by plain name. Used where failure
    /// is an interpreter bug rather than a user error.
    pub fn get_local(&self, name: &str) -> Option<Object> {
        self.values.get(name).cloned()
    }

    /// Sorted listing of this frame's bindings, for the verbose REPL dump.
    pub fn dump(&self) -> String {
        let mut names: Vec<_> = self.values.keys().collect();
        names.sort();

        names
            .into_iter()
            .map(|name| format!("{} = {}", name, self.values[name]))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn ancestor(&self, distance: usize) -> Option<Rc<RefCell<Environment>>> {
        let mut env = self.enclosing.clone()?;

        for _ in 1..distance {
            let parent = env.borrow().enclosing.clone()?;
            env = parent;
        }
        Some(env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::Identifier, name, None, 1)
    }

    #[test]
    fn get_walks_the_chain_outward() {
        let global = Environment::new().as_shared();
        global.borrow_mut().define("a", Object::Number(1.0));

        let inner = Environment::new().with_enclosing(global).as_shared();
        let got = inner.borrow().get(&ident("a")).unwrap();
        assert_eq!(got, Object::Number(1.0));
    }

    #[test]
    fn assign_mutates_the_declaring_frame() {
        let global = Environment::new().as_shared();
        global.borrow_mut().define("a", Object::Number(1.0));

        let inner = Environment::new().with_enclosing(global.clone()).as_shared();
        inner.borrow_mut().assign(&ident("a"), Object::Number(2.0)).unwrap();

        assert_eq!(global.borrow().get(&ident("a")).unwrap(), Object::Number(2.0));
    }

    #[test]
    fn assigning_an_undeclared_name_faults() {
        let global = Environment::new().as_shared();
        let err = global.borrow_mut().assign(&ident("ghost"), Object::Null).unwrap_err();
        assert!(err.message.contains("Undefined variable 'ghost'"));
    }

    #[test]
    fn get_at_crosses_the_requested_number_of_frames() {
        let global = Environment::new().as_shared();
        global.borrow_mut().define("x", Object::Number(1.0));

        let middle = Environment::new().with_enclosing(global).as_shared();
        middle.borrow_mut().define("x", Object::Number(2.0));

        let inner = Environment::new().with_enclosing(middle).as_shared();

        assert_eq!(inner.borrow().get_at(1, &ident("x")).unwrap(), Object::Number(2.0));
        assert_eq!(inner.borrow().get_at(2, &ident("x")).unwrap(), Object::Number(1.0));
    }

    #[test]
    fn two_closures_share_one_frame() {
        let shared = Environment::new().as_shared();
        shared.borrow_mut().define("count", Object::Number(0.0));

        let a = Environment::new().with_enclosing(shared.clone()).as_shared();
        let b = Environment::new().with_enclosing(shared.clone()).as_shared();

        a.borrow_mut().assign(&ident("count"), Object::Number(5.0)).unwrap();
        assert_eq!(b.borrow().get(&ident("count")).unwrap(), Object::Number(5.0));
    }

    #[test]
    fn dump_lists_bindings_sorted() {
        let mut env = Environment::new();
        env.define("b", Object::Number(2.0));
        env.define("a", Object::Number(1.0));
        assert_eq!(env.dump(), "a = 1\nb = 2");
    }
}
