use std::collections::HashMap;
use std::fmt::Display;

use log::debug;
use thiserror::Error;

use crate::ast::{Expr, ExprId, ExprKind, FunctionDecl, Stmt};
use crate::token::Token;

#[derive(Debug, Clone, Error)]
#[error("[line {}] Error at '{}': {message}", .token.line, .token.lexeme)]
pub struct ResolveError {
    pub token: Token,
    pub message: String,
}

/// Non-fatal resolution finding. Warnings never set the had-error flag and
/// never block evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub line: i32,
    pub message: String,
}

impl Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[line {}] Warning: {}", self.line, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ClassType {
    None,
    Class,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum VariableState {
    Declared,
    Defined,
    Used,
}

#[derive(Debug)]
struct Variable {
    token: Token,
    state: VariableState,
}

/// What the resolver hands to the evaluator: the hop-count side-table keyed
/// by node id, plus any unused-name warnings.
#[derive(Debug)]
pub struct Resolution {
    pub locals: HashMap<ExprId, usize>,
    pub warnings: Vec<Warning>,
}

/// Static scope analysis: a second full tree walk that binds every local
/// variable reference to the environment frame that will hold it at runtime.
/// Errors accumulate; resolution keeps going so one run surfaces as many
/// diagnostics as possible.
pub struct Resolver {
    scopes: Vec<HashMap<String, Variable>>,
    locals: HashMap<ExprId, usize>,
    warnings: Vec<Warning>,
    errors: Vec<ResolveError>,
    current_function: FunctionType,
    current_class: ClassType,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            scopes: vec![],
            locals: HashMap::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    pub fn resolve(mut self, statements: &[Stmt]) -> Result<Resolution, Vec<ResolveError>> {
        self.resolve_stmts(statements);

        if self.errors.is_empty() {
            debug!("resolved {} local bindings", self.locals.len());
            Ok(Resolution { locals: self.locals, warnings: self.warnings })
        } else {
            Err(self.errors)
        }
    }

    fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block { statements } => {
                self.begin_scope();
                self.resolve_stmts(statements);
                self.end_scope();
            }
            Stmt::Var { name, initializer } => {
                // Three steps, so a variable can't read itself in its own
                // initializer: declare -> resolve initializer -> define
                self.declare(name);
                if let Some(initializer) = initializer {
                    self.resolve_expr(initializer);
                }
                self.define(name);
            }
            Stmt::Function(decl) => {
                // Unlike variables, functions are defined before their body
                // is resolved, so they can recursively call themselves.
                self.declare(&decl.name);
                self.define(&decl.name);

                self.resolve_function(decl, FunctionType::Function);
            }
            Stmt::Class { name, methods } => {
                let enclosing_class = self.current_class;
                self.current_class = ClassType::Class;

                self.declare(name);
                self.define(name);

                self.begin_scope();
                // Methods may reference 'this' unconditionally
                self.peek_scope_mut().insert(
                    "this".to_owned(),
                    Variable { token: name.clone(), state: VariableState::Used },
                );

                for method in methods {
                    let func_type = if method.name.lexeme == "init" {
                        FunctionType::Initializer
                    } else {
                        FunctionType::Method
                    };

                    self.resolve_function(method, func_type);
                }

                self.end_scope();
                self.current_class = enclosing_class;
            }
            Stmt::Expression { expr } => self.resolve_expr(expr),
            Stmt::Print { expr } => self.resolve_expr(expr),
            Stmt::If { condition, then_branch, else_branch } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(stmt) = else_branch {
                    self.resolve_stmt(stmt);
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.error(keyword, "Can't return from top-level code.");
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.error(keyword, "Can't return a value from an initializer.");
                    }
                    self.resolve_expr(expr);
                }
            }
        }
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Variable { name } => {
                if let Some(scope) = self.scopes.last() {
                    if let Some(var) = scope.get(&name.lexeme) {
                        if var.state == VariableState::Declared {
                            self.error(
                                name,
                                "Can't read local variable in its own initializer.",
                            );
                        }
                    }
                }

                self.resolve_local(expr.id, name);
            }
            ExprKind::Assignment { name, value } => {
                self.resolve_expr(value);
                self.resolve_local(expr.id, name);
            }
            ExprKind::This { keyword } => {
                if self.current_class == ClassType::None {
                    self.error(keyword, "Can't use 'this' outside of a class.");
                    return;
                }

                self.resolve_local(expr.id, keyword);
            }
            ExprKind::Binary { left, operator: _, right } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            ExprKind::Logical { left, operator: _, right } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            ExprKind::Call { callee, paren: _, arguments } => {
                self.resolve_expr(callee);
                for arg in arguments {
                    self.resolve_expr(arg);
                }
            }
            ExprKind::Get { object, name: _ } => {
                // Only the receiver resolves statically; the property itself
                // is looked up at runtime
                self.resolve_expr(object);
            }
            ExprKind::Set { object, name: _, value } => {
                self.resolve_expr(object);
                self.resolve_expr(value);
            }
            ExprKind::Grouping { expr } => self.resolve_expr(expr),
            ExprKind::Unary { operator: _, right } => self.resolve_expr(right),
            ExprKind::Literal { value: _ } => {}
        }
    }

    fn resolve_function(&mut self, decl: &FunctionDecl, func_type: FunctionType) {
        let enclosing_func = self.current_function;
        self.current_function = func_type;

        // Parameters and the body's top level share one scope
        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }

        self.resolve_stmts(&decl.body);
        self.end_scope();
        self.current_function = enclosing_func;
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        let scope = self.scopes.pop().expect("scope stack underflow");

        // Anything that never made it to 'used' gets a warning on the way out
        let mut unused: Vec<&Variable> =
            scope.values().filter(|v| v.state != VariableState::Used).collect();
        unused.sort_by_key(|v| (v.token.line, v.token.lexeme.clone()));

        for var in unused {
            self.warnings.push(Warning {
                line: var.token.line,
                message: format!("Unused variable '{}'.", var.token.lexeme),
            });
        }
    }

    fn declare(&mut self, name: &Token) {
        if self.scopes.is_empty() {
            return;
        }

        if self.peek_scope_mut().contains_key(&name.lexeme) {
            self.error(name, "Already a variable with this name in this scope.");
        }

        self.peek_scope_mut().insert(
            name.lexeme.clone(),
            Variable { token: name.clone(), state: VariableState::Declared },
        );
    }

    fn define(&mut self, name: &Token) {
        if self.scopes.is_empty() {
            return;
        }

        if let Some(var) = self.peek_scope_mut().get_mut(&name.lexeme) {
            var.state = VariableState::Defined;
        }
    }

    fn peek_scope_mut(&mut self) -> &mut HashMap<String, Variable> {
        self.scopes.last_mut().expect("scope stack is empty")
    }

    /// Walk the scope stack from innermost outward; the first scope holding
    /// the name fixes the hop count. A name found nowhere is a global and
    /// gets no table entry.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        let scope_count = self.scopes.len();

        for (i, scope) in self.scopes.iter_mut().enumerate().rev() {
            if let Some(var) = scope.get_mut(&name.lexeme) {
                var.state = VariableState::Used;
                self.locals.insert(id, scope_count - 1 - i);
                return;
            }
        }
    }

    fn error(&mut self, token: &Token, message: &str) {
        self.errors.push(ResolveError { token: token.clone(), message: message.to_owned() });
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> Vec<Stmt> {
        let (tokens, errors) = Scanner::new(source).scan_tokens();
        assert!(errors.is_empty(), "scan errors: {:?}", errors);
        Parser::new(tokens).parse().expect("failed to parse")
    }

    fn resolve(source: &str) -> Result<Resolution, Vec<ResolveError>> {
        Resolver::new().resolve(&parse(source))
    }

    #[test]
    fn globals_have_no_table_entry() {
        let resolution = resolve("var a = 1; print a; a = 2;").unwrap();
        assert!(resolution.locals.is_empty());
    }

    #[test]
    fn hop_count_crosses_block_scopes() {
        let resolution = resolve("fun f() { var a = 1; { print a; } }").unwrap();
        let depths: Vec<usize> = resolution.locals.values().copied().collect();
        assert_eq!(depths, vec![1]);
    }

    #[test]
    fn parameter_reference_resolves_at_depth_zero() {
        let resolution = resolve("fun f(x) { print x; }").unwrap();
        let depths: Vec<usize> = resolution.locals.values().copied().collect();
        assert_eq!(depths, vec![0]);
    }

    #[test]
    fn resolution_is_deterministic() {
        let statements = parse("fun f(x) { var y = x; { print y; print x; } }");
        let first = Resolver::new().resolve(&statements).unwrap();
        let second = Resolver::new().resolve(&statements).unwrap();
        assert_eq!(first.locals, second.locals);
    }

    #[test]
    fn self_reference_in_initializer_is_an_error() {
        let errors = resolve("{ var a = a; }").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("its own initializer"));
    }

    #[test]
    fn shadowing_an_outer_scope_is_legal() {
        assert!(resolve("{ var a = 1; { var a = 2; print a; } print a; }").is_ok());
    }

    #[test]
    fn redeclaration_in_the_same_scope_is_an_error() {
        let errors = resolve("{ var a = 1; var a = 2; print a; }").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Already a variable"));
    }

    #[test]
    fn top_level_return_is_an_error() {
        let errors = resolve("return 1;").unwrap_err();
        assert!(errors[0].message.contains("top-level"));
    }

    #[test]
    fn returning_a_value_from_init_is_an_error() {
        let errors = resolve("class A { init() { return 1; } }").unwrap_err();
        assert!(errors[0].message.contains("initializer"));
    }

    #[test]
    fn bare_return_in_init_is_fine() {
        assert!(resolve("class A { init() { return; } }").is_ok());
    }

    #[test]
    fn this_outside_a_class_is_an_error() {
        let errors = resolve("print this;").unwrap_err();
        assert!(errors[0].message.contains("outside of a class"));
    }

    #[test]
    fn this_in_a_method_resolves_to_the_class_scope() {
        let resolution = resolve("class A { m() { return this; } }").unwrap();
        let depths: Vec<usize> = resolution.locals.values().copied().collect();
        assert_eq!(depths, vec![1]);
    }

    #[test]
    fn unused_local_produces_a_warning() {
        let resolution = resolve("{ var lonely = 1; }").unwrap();
        assert_eq!(resolution.warnings.len(), 1);
        assert!(resolution.warnings[0].message.contains("Unused variable 'lonely'"));
    }

    #[test]
    fn used_local_produces_no_warning() {
        let resolution = resolve("{ var a = 1; print a; }").unwrap();
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn warnings_do_not_fail_resolution() {
        // Two scopes, two unused names, still Ok
        let resolution = resolve("{ var a = 1; } { var b = 2; }").unwrap();
        assert_eq!(resolution.warnings.len(), 2);
    }

    #[test]
    fn errors_accumulate_across_siblings() {
        let errors = resolve("return 1; print this;").unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
