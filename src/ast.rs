use std::rc::Rc;

use crate::object::Object;
use crate::token::Token;

/// Stable per-node identifier, assigned by the parser at construction time.
/// The resolver keys its hop-count table by this id, so two syntactically
/// identical expressions never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub u32);

#[derive(Debug)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
}

#[derive(Debug)]
pub enum ExprKind {
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        paren: Token,
        arguments: Vec<Expr>,
    },
    Get {
        object: Box<Expr>,
        name: Token,
    },
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },
    This {
        keyword: Token,
    },
    Grouping {
        expr: Box<Expr>,
    },
    Literal {
        value: Object,
    },
    Unary {
        operator: Token,
        right: Box<Expr>,
    },
    Variable {
        name: Token,
    },
    Assignment {
        name: Token,
        value: Box<Expr>,
    },
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
}

#[derive(Debug)]
pub enum Stmt {
    Expression {
        expr: Expr,
    },
    Print {
        expr: Expr,
    },
    Var {
        name: Token,
        initializer: Option<Expr>,
    },
    Block {
        statements: Vec<Stmt>,
    },
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Function(Rc<FunctionDecl>),
    Return {
        keyword: Token,
        value: Option<Expr>,
    },
    Class {
        name: Token,
        methods: Vec<Rc<FunctionDecl>>,
    },
}

/// A function or method declaration. Shared between the AST and every
/// closure created from it, so the body outlives the declaring statement.
#[derive(Debug)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Vec<Token>,
    pub body: Vec<Stmt>,
}

/// Renders the tree as parenthesized s-expressions. Used by the verbose
/// mode of the driver and by parser tests checking associativity.
pub struct AstPrinter;

impl AstPrinter {
    pub fn print(&self, stmt: &Stmt) -> String {
        match stmt {
            Stmt::Expression { expr } => format!("(; {})", self.print_expr(expr)),
            Stmt::Print { expr } => format!("(print {})", self.print_expr(expr)),
            Stmt::Var { name, initializer } => match initializer {
                Some(init) => format!("(var {} {})", name.lexeme, self.print_expr(init)),
                None => format!("(var {})", name.lexeme),
            },
            Stmt::Block { statements } => {
                let inner =
                    statements.iter().map(|s| self.print(s)).collect::<Vec<_>>().join(" ");
                format!("(block {})", inner)
            }
            Stmt::If { condition, then_branch, else_branch } => match else_branch {
                Some(else_branch) => format!(
                    "(if {} {} {})",
                    self.print_expr(condition),
                    self.print(then_branch),
                    self.print(else_branch)
                ),
                None => {
                    format!("(if {} {})", self.print_expr(condition), self.print(then_branch))
                }
            },
            Stmt::While { condition, body } => {
                format!("(while {} {})", self.print_expr(condition), self.print(body))
            }
            Stmt::Function(decl) => self.print_function(decl),
            Stmt::Return { keyword: _, value } => match value {
                Some(value) => format!("(return {})", self.print_expr(value)),
                None => "(return)".to_owned(),
            },
            Stmt::Class { name, methods } => {
                let inner =
                    methods.iter().map(|m| self.print_function(m)).collect::<Vec<_>>().join(" ");
                format!("(class {} {})", name.lexeme, inner)
            }
        }
    }

    pub fn print_expr(&self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Binary { left, operator, right } => format!(
                "({} {} {})",
                operator.lexeme,
                self.print_expr(left),
                self.print_expr(right)
            ),
            ExprKind::Logical { left, operator, right } => format!(
                "({} {} {})",
                operator.lexeme,
                self.print_expr(left),
                self.print_expr(right)
            ),
            ExprKind::Grouping { expr } => format!("(group {})", self.print_expr(expr)),
            ExprKind::Literal { value } => match value {
                Object::String(s) => format!("\"{}\"", s),
                other => format!("{}", other),
            },
            ExprKind::Unary { operator, right } => {
                format!("({} {})", operator.lexeme, self.print_expr(right))
            }
            ExprKind::Variable { name } => name.lexeme.clone(),
            ExprKind::Assignment { name, value } => {
                format!("(= {} {})", name.lexeme, self.print_expr(value))
            }
            ExprKind::Call { callee, paren: _, arguments } => {
                let args =
                    arguments.iter().map(|a| self.print_expr(a)).collect::<Vec<_>>().join(" ");
                format!("(call {} {})", self.print_expr(callee), args)
            }
            ExprKind::Get { object, name } => {
                format!("(. {} {})", self.print_expr(object), name.lexeme)
            }
            ExprKind::Set { object, name, value } => format!(
                "(.= {} {} {})",
                self.print_expr(object),
                name.lexeme,
                self.print_expr(value)
            ),
            ExprKind::This { keyword } => keyword.lexeme.clone(),
        }
    }

    fn print_function(&self, decl: &FunctionDecl) -> String {
        let params = decl.params.iter().map(|p| p.lexeme.as_str()).collect::<Vec<_>>().join(" ");
        let body = decl.body.iter().map(|s| self.print(s)).collect::<Vec<_>>().join(" ");
        format!("(fun {} ({}) {})", decl.name.lexeme, params, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    #[test]
    fn print_an_ast() {
        // This is '-123 * (45.67)'
        let expr = Expr {
            id: ExprId(3),
            kind: ExprKind::Binary {
                left: Box::new(Expr {
                    id: ExprId(1),
                    kind: ExprKind::Unary {
                        operator: Token::new(TokenType::Minus, "-", None, 1),
                        right: Box::new(Expr {
                            id: ExprId(0),
                            kind: ExprKind::Literal { value: Object::Number(123.0) },
                        }),
                    },
                }),
                operator: Token::new(TokenType::Star, "*", None, 1),
                right: Box::new(Expr {
                    id: ExprId(2),
                    kind: ExprKind::Grouping {
                        expr: Box::new(Expr {
                            id: ExprId(4),
                            kind: ExprKind::Literal { value: Object::Number(45.67) },
                        }),
                    },
                }),
            },
        };

        let printer = AstPrinter;
        assert_eq!(printer.print_expr(&expr), "(* (- 123) (group 45.67))");
    }
}
