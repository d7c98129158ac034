use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::ast::{Expr, ExprId, ExprKind, Stmt};
use crate::class::Class;
use crate::environment::Environment;
use crate::error::{RuntimeFault, RuntimeInterrupt};
use crate::func::{clock, Function};
use crate::object::Object;
use crate::token::{Token, TokenType};

type EvalResult = Result<Object, RuntimeFault>;
type ExecResult = Result<(), RuntimeInterrupt>;

/// Recursive tree evaluator. Statements execute against a mutable current
/// environment pointer; the hop-count table produced by the resolver turns
/// local variable access into a direct ancestor-frame hit, with everything
/// unresolved falling back to the global frame.
pub struct Interpreter {
    pub globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
}

impl Interpreter {
    pub fn new() -> Self {
        let globals = Environment::new().as_shared();
        let environment = globals.clone();

        globals.borrow_mut().define("clock", Object::Native(clock()));

        Self { globals, environment, locals: HashMap::new() }
    }

    /// Merge a resolution's side-table into this interpreter. Ids are never
    /// reused across parses, so extending is safe for long-lived sessions.
    pub fn bind_locals(&mut self, locals: HashMap<ExprId, usize>) {
        self.locals.extend(locals);
    }

    /// Runs a program to completion. The first runtime fault aborts the
    /// remainder of the execution unit.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeFault> {
        for stmt in statements {
            if let Err(interrupt) = self.execute(stmt) {
                return match interrupt {
                    RuntimeInterrupt::Fault(fault) => {
                        debug!("runtime fault: {}", fault);
                        Err(fault)
                    }
                    // The resolver rejects top-level 'return'
                    RuntimeInterrupt::Return { .. } => {
                        unreachable!("return escaped past every call frame")
                    }
                };
            }
        }

        Ok(())
    }

    pub fn dump_globals(&self) -> String {
        self.globals.borrow().dump()
    }

    fn execute(&mut self, stmt: &Stmt) -> ExecResult {
        match stmt {
            Stmt::Expression { expr } => {
                self.evaluate_expr(expr)?;
            }
            Stmt::Print { expr } => {
                let value = self.evaluate_expr(expr)?;
                println!("{value}");
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate_expr(expr)?,
                    None => Object::Null,
                };

                self.environment.borrow_mut().define(&name.lexeme, value);
            }
            Stmt::Block { statements } => {
                let new_env =
                    Environment::new().with_enclosing(self.environment.clone()).as_shared();
                self.execute_block(statements, new_env)?;
            }
            Stmt::If { condition, then_branch, else_branch } => {
                let condition = self.evaluate_expr(condition)?;

                if is_truthy(&condition) {
                    self.execute(then_branch)?;
                } else if let Some(stmt) = else_branch {
                    self.execute(stmt)?;
                }
            }
            Stmt::While { condition, body } => loop {
                let value = self.evaluate_expr(condition)?;
                if !is_truthy(&value) {
                    break;
                }

                self.execute(body)?;
            },
            Stmt::Function(decl) => {
                // The closure is the environment active at the declaration,
                // not at any later call
                let function =
                    Function::new(decl.clone(), self.environment.clone(), false);
                self.environment
                    .borrow_mut()
                    .define(&decl.name.lexeme, Object::Function(Rc::new(function)));
            }
            Stmt::Return { keyword: _, value } => {
                let value = match value {
                    Some(expr) => self.evaluate_expr(expr)?,
                    None => Object::Null,
                };

                return Err(RuntimeInterrupt::Return { value });
            }
            Stmt::Class { name, methods } => {
                self.environment.borrow_mut().define(&name.lexeme, Object::Null);

                let mut method_table = HashMap::new();
                for method in methods {
                    let is_initializer = method.name.lexeme == "init";
                    method_table.insert(
                        method.name.lexeme.clone(),
                        Function::new(method.clone(), self.environment.clone(), is_initializer),
                    );
                }

                let class = Object::Class(Rc::new(Class::new(&name.lexeme, method_table)));
                self.environment.borrow_mut().assign(name, class).map_err(RuntimeInterrupt::from)?;
            }
        };

        Ok(())
    }

    /// Runs statements against the given environment, restoring the prior
    /// one on every exit path, including an in-flight return unwind.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> ExecResult {
        let prev_env = std::mem::replace(&mut self.environment, environment);

        for stmt in statements {
            if let Err(interrupt) = self.execute(stmt) {
                self.environment = prev_env;
                return Err(interrupt);
            }
        }

        self.environment = prev_env;
        Ok(())
    }

    pub fn evaluate_expr(&mut self, expr: &Expr) -> EvalResult {
        match &expr.kind {
            ExprKind::Literal { value } => Ok(value.clone()),
            ExprKind::Grouping { expr } => self.evaluate_expr(expr),
            ExprKind::Unary { operator, right } => self.evaluate_unary(operator, right),
            ExprKind::Binary { left, operator, right } => {
                self.evaluate_binary(left, operator, right)
            }
            ExprKind::Logical { left, operator, right } => {
                let left_value = self.evaluate_expr(left)?;

                // Short-circuit yields the operand itself, not a boolean cast
                if operator.token_type == TokenType::Or {
                    if is_truthy(&left_value) {
                        return Ok(left_value);
                    }
                } else if !is_truthy(&left_value) {
                    return Ok(left_value);
                }

                self.evaluate_expr(right)
            }
            ExprKind::Variable { name } => self.lookup_variable(name, expr.id),
            ExprKind::This { keyword } => self.lookup_variable(keyword, expr.id),
            ExprKind::Assignment { name, value } => {
                let value = self.evaluate_expr(value)?;

                if let Some(&distance) = self.locals.get(&expr.id) {
                    self.environment.borrow_mut().assign_at(distance, name, value.clone())?;
                } else {
                    self.globals.borrow_mut().assign(name, value.clone())?;
                }

                Ok(value)
            }
            ExprKind::Call { callee, paren, arguments } => {
                let callee = self.evaluate_expr(callee)?;

                // Arguments evaluate left to right before any binding
                let mut args = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.evaluate_expr(arg)?);
                }

                match callee {
                    Object::Function(function) => {
                        check_arity(function.arity(), args.len(), paren)?;
                        function.call(self, args)
                    }
                    Object::Class(class) => {
                        check_arity(class.arity(), args.len(), paren)?;
                        Class::construct(class, args, self)
                    }
                    Object::Native(native) => {
                        check_arity(native.arity, args.len(), paren)?;
                        Ok((native.function)(&args))
                    }
                    _ => Err(RuntimeFault::new(
                        paren.clone(),
                        "Can only call functions and classes.",
                    )),
                }
            }
            ExprKind::Get { object, name } => {
                let object = self.evaluate_expr(object)?;

                if let Object::Instance(ref instance) = object {
                    instance.borrow().get(name, &object)
                } else {
                    Err(RuntimeFault::new(name.clone(), "Only instances have properties."))
                }
            }
            ExprKind::Set { object, name, value } => {
                let object = self.evaluate_expr(object)?;

                let Object::Instance(instance) = object else {
                    return Err(RuntimeFault::new(name.clone(), "Only instances have fields."));
                };

                let value = self.evaluate_expr(value)?;
                instance.borrow_mut().set(name, value.clone());
                Ok(value)
            }
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> EvalResult {
        let value = self.evaluate_expr(right)?;

        match operator.token_type {
            TokenType::Minus => match value.number() {
                Some(n) => Ok(Object::Number(-n)),
                None => Err(RuntimeFault::new(
                    operator.clone(),
                    "Operand must be a number.",
                )),
            },
            TokenType::Bang => Ok(Object::Boolean(!is_truthy(&value))),

            // The grammar only produces the two operators above
            _ => unreachable!("unsupported unary operator '{}'", operator.lexeme),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> EvalResult {
        let left_value = self.evaluate_expr(left)?;
        let right_value = self.evaluate_expr(right)?;

        match operator.token_type {
            TokenType::Plus => {
                if let (Some(l), Some(r)) = (left_value.number(), right_value.number()) {
                    Ok(Object::Number(l + r))
                } else if let (Some(l), Some(r)) = (left_value.string(), right_value.string()) {
                    Ok(Object::String(format!("{l}{r}")))
                } else {
                    Err(RuntimeFault::new(
                        operator.clone(),
                        "Operands must be two numbers or two strings.",
                    ))
                }
            }
            TokenType::Minus => check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Object::Number(l - r)),
            TokenType::Star => check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Object::Number(l * r)),
            // Division by zero deliberately follows IEEE float semantics
            TokenType::Slash => check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Object::Number(l / r)),
            TokenType::Greater => check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Object::Boolean(l > r)),
            TokenType::GreaterEqual => check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Object::Boolean(l >= r)),
            TokenType::Less => check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Object::Boolean(l < r)),
            TokenType::LessEqual => check_number_operands(operator, &left_value, &right_value)
                .map(|(l, r)| Object::Boolean(l <= r)),

            TokenType::EqualEqual => Ok(Object::Boolean(left_value == right_value)),
            TokenType::BangEqual => Ok(Object::Boolean(left_value != right_value)),

            _ => unreachable!("unsupported binary operator '{}'", operator.lexeme),
        }
    }

    fn lookup_variable(&self, name: &Token, id: ExprId) -> EvalResult {
        if let Some(&distance) = self.locals.get(&id) {
            self.environment.borrow().get_at(distance, name)
        } else {
            self.globals.borrow().get(name)
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Nil and false are falsy; every other value is truthy, zero and the empty
/// string included.
fn is_truthy(value: &Object) -> bool {
    !matches!(value, Object::Null | Object::Boolean(false))
}

fn check_arity(expected: usize, got: usize, paren: &Token) -> Result<(), RuntimeFault> {
    if expected == got {
        return Ok(());
    }

    Err(RuntimeFault::new(
        paren.clone(),
        format!("Expected {} arguments but got {}.", expected, got),
    ))
}

fn check_number_operands(
    operator: &Token,
    left: &Object,
    right: &Object,
) -> Result<(f64, f64), RuntimeFault> {
    if let (Some(l), Some(r)) = (left.number(), right.number()) {
        Ok((l, r))
    } else {
        Err(RuntimeFault::new(operator.clone(), "Operands must be numbers."))
    }
}
