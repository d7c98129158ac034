use std::rc::Rc;

use log::debug;
use thiserror::Error;

use crate::ast::{Expr, ExprId, ExprKind, FunctionDecl, Stmt};
use crate::object::Object;
use crate::token::{Token, TokenType};

#[derive(Debug, Clone, Error)]
#[error("[line {}] Error {location}: {message}", .token.line)]
pub struct ParseError {
    pub token: Token,
    pub location: String,
    pub message: String,
}

/// Recursive-descent parser with a single token of lookahead. On a syntax
/// error it resynchronizes at the next statement boundary and keeps going,
/// so one `parse` call reports every independent error in the source.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    next_id: u32,
    errors: Vec<ParseError>,
}

type ParseResult<T> = Result<T, ParseError>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0, next_id: 0, errors: Vec::new() }
    }

    /// Continues the node-id sequence of an earlier parse. A driver that
    /// parses one line at a time must not hand out the same `ExprId` twice,
    /// because the interpreter's side-table outlives each line.
    pub fn with_first_id(self, first_id: u32) -> Self {
        Self { next_id: first_id, ..self }
    }

    /// The id the next parsed expression would receive.
    pub fn next_expr_id(&self) -> u32 {
        self.next_id
    }

    pub fn parse(&mut self) -> Result<Vec<Stmt>, Vec<ParseError>> {
        let mut statements = vec![];
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }

        if self.errors.is_empty() {
            debug!("parsed {} statements", statements.len());
            Ok(statements)
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    fn make(&mut self, kind: ExprKind) -> Expr {
        let id = ExprId(self.next_id);
        self.next_id += 1;
        Expr { id, kind }
    }

    fn declaration(&mut self) -> ParseResult<Stmt> {
        if self.match_tt(&[TokenType::Var]) {
            self.var_declaration()
        } else if self.match_tt(&[TokenType::Fun]) {
            self.function("function").map(|decl| Stmt::Function(Rc::new(decl)))
        } else if self.match_tt(&[TokenType::Class]) {
            self.class_declaration()
        } else {
            self.statement()
        }
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;

        let initializer = if self.match_tt(&[TokenType::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::Semicolon, "Expect ';' after variable declaration.")?;

        Ok(Stmt::Var { name, initializer })
    }

    fn class_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(TokenType::Identifier, "Expect class name.")?;
        self.consume(TokenType::LeftBrace, "Expect '{' before class body.")?;

        let mut methods = vec![];
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            methods.push(Rc::new(self.function("method")?));
        }

        self.consume(TokenType::RightBrace, "Expect '}' after class body.")?;

        Ok(Stmt::Class { name, methods })
    }

    fn function(&mut self, kind: &str) -> ParseResult<FunctionDecl> {
        let name =
            self.consume(TokenType::Identifier, &format!("Expect {} name.", kind))?;

        self.consume(TokenType::LeftParen, &format!("Expect '(' after {} name.", kind))?;

        let mut parameters = vec![];
        if !self.check(&TokenType::RightParen) {
            loop {
                if parameters.len() >= 255 {
                    // Report, but keep parsing
                    let token = self.peek().clone();
                    self.report(&token, "Can't have more than 255 parameters.");
                }

                parameters.push(self.consume(TokenType::Identifier, "Expect parameter name.")?);
                if !self.match_tt(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenType::LeftBrace, &format!("Expect '{{' before {} body.", kind))?;

        let body = self.block()?;

        Ok(FunctionDecl { name, params: parameters, body })
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.match_tt(&[TokenType::If]) {
            self.if_statement()
        } else if self.match_tt(&[TokenType::While]) {
            self.while_statement()
        } else if self.match_tt(&[TokenType::Return]) {
            self.return_statement()
        } else if self.match_tt(&[TokenType::For]) {
            self.for_statement()
        } else if self.match_tt(&[TokenType::Print]) {
            self.print_statement()
        } else if self.match_tt(&[TokenType::LeftBrace]) {
            Ok(Stmt::Block { statements: self.block()? })
        } else {
            self.expression_statement()
        }
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_tt(&[TokenType::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If { condition, then_branch, else_branch })
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous();
        let value = if !self.check(&TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after while condition.")?;

        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    /// There is no 'for' node past this point: the loop is rebuilt from an
    /// init block, a 'while', and an increment appended to the body.
    fn for_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_tt(&[TokenType::Semicolon]) {
            None
        } else if self.match_tt(&[TokenType::Var]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(&TokenType::Semicolon) {
            self.expression()?
        } else {
            self.make(ExprKind::Literal { value: Object::Boolean(true) })
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(&TokenType::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block {
                statements: vec![body, Stmt::Expression { expr: increment }],
            };
        }

        body = Stmt::While { condition, body: Box::new(body) };

        if let Some(initializer) = initializer {
            body = Stmt::Block { statements: vec![initializer, body] };
        }

        Ok(body)
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print { expr })
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = vec![];

        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression { expr })
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.or()?;

        if self.match_tt(&[TokenType::Equal]) {
            let equals = self.previous();
            let value = Box::new(self.assignment()?);

            // Only a variable or a property access may sit left of '='.
            // Anything else is reported but still returns a best-effort node.
            let Expr { id, kind } = expr;
            match kind {
                ExprKind::Variable { name } => {
                    return Ok(self.make(ExprKind::Assignment { name, value }));
                }
                ExprKind::Get { object, name } => {
                    return Ok(self.make(ExprKind::Set { object, name, value }));
                }
                kind => {
                    self.report(&equals, "Invalid assignment target.");
                    return Ok(Expr { id, kind });
                }
            }
        }

        Ok(expr)
    }

    fn or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and()?;

        while self.match_tt(&[TokenType::Or]) {
            let operator = self.previous();
            let right = self.and()?;
            expr = self.make(ExprKind::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;

        while self.match_tt(&[TokenType::And]) {
            let operator = self.previous();
            let right = self.equality()?;
            expr = self.make(ExprKind::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }

        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;

        while self.match_tt(&[TokenType::BangEqual, TokenType::EqualEqual]) {
            let operator = self.previous();
            let right = self.comparison()?;
            expr = self.make(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;

        while self.match_tt(&[
            TokenType::GreaterEqual,
            TokenType::Greater,
            TokenType::LessEqual,
            TokenType::Less,
        ]) {
            let operator = self.previous();
            let right = self.term()?;
            expr = self.make(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;

        while self.match_tt(&[TokenType::Minus, TokenType::Plus]) {
            let operator = self.previous();
            let right = self.factor()?;
            expr = self.make(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;

        while self.match_tt(&[TokenType::Slash, TokenType::Star]) {
            let operator = self.previous();
            let right = self.unary()?;
            expr = self.make(ExprKind::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.match_tt(&[TokenType::Bang, TokenType::Minus]) {
            let operator = self.previous();
            let right = Box::new(self.unary()?);
            return Ok(self.make(ExprKind::Unary { operator, right }));
        }

        self.call()
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;

        loop {
            if self.match_tt(&[TokenType::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.match_tt(&[TokenType::Dot]) {
                let name =
                    self.consume(TokenType::Identifier, "Expect property name after '.'.")?;
                expr = self.make(ExprKind::Get { object: Box::new(expr), name });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut arguments = vec![];

        if !self.check(&TokenType::RightParen) {
            loop {
                if arguments.len() >= 255 {
                    // Report, but keep parsing the argument list
                    let token = self.peek().clone();
                    self.report(&token, "Can't have more than 255 arguments.");
                }

                arguments.push(self.expression()?);

                if !self.match_tt(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;
        Ok(self.make(ExprKind::Call { callee: Box::new(callee), paren, arguments }))
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        if self.match_tt(&[TokenType::False]) {
            return Ok(self.make(ExprKind::Literal { value: Object::Boolean(false) }));
        }
        if self.match_tt(&[TokenType::True]) {
            return Ok(self.make(ExprKind::Literal { value: Object::Boolean(true) }));
        }
        if self.match_tt(&[TokenType::Nil]) {
            return Ok(self.make(ExprKind::Literal { value: Object::Null }));
        }
        if self.match_tt(&[TokenType::Number, TokenType::StringLiteral]) {
            let value =
                self.previous().literal.expect("number and string tokens carry a literal");
            return Ok(self.make(ExprKind::Literal { value }));
        }
        if self.match_tt(&[TokenType::This]) {
            let keyword = self.previous();
            return Ok(self.make(ExprKind::This { keyword }));
        }
        if self.match_tt(&[TokenType::Identifier]) {
            let name = self.previous();
            return Ok(self.make(ExprKind::Variable { name }));
        }
        if self.match_tt(&[TokenType::LeftParen]) {
            let expr = self.expression()?;
            self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
            return Ok(self.make(ExprKind::Grouping { expr: Box::new(expr) }));
        }

        Err(self.error(self.peek().clone(), "Expect expression."))
    }

    /// Return the next token if its type matches, otherwise a parse error.
    fn consume(&mut self, token_type: TokenType, message: &str) -> ParseResult<Token> {
        if self.check(&token_type) {
            return Ok(self.advance());
        }

        Err(self.error(self.peek().clone(), message))
    }

    fn error(&self, token: Token, message: &str) -> ParseError {
        let location = if token.token_type == TokenType::EOF {
            "at end".to_owned()
        } else {
            format!("at '{}'", token.lexeme)
        };

        ParseError { token, location, message: message.to_owned() }
    }

    /// Record a diagnostic without abandoning the current production.
    fn report(&mut self, token: &Token, message: &str) {
        let e = self.error(token.clone(), message);
        self.errors.push(e);
    }

    fn match_tt(&mut self, types: &[TokenType]) -> bool {
        for tt in types {
            if self.check(tt) {
                self.advance();
                return true;
            }
        }

        false
    }

    fn check(&self, token_type: &TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().token_type == *token_type
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::EOF
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> Token {
        self.tokens[self.current - 1].clone()
    }

    /// Move and discard tokens until we sit after a semicolon or in front of
    /// a token that plausibly starts a new statement.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::Semicolon {
                return;
            }

            match self.peek().token_type {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => {}
            }

            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstPrinter;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> Result<Vec<Stmt>, Vec<ParseError>> {
        let (tokens, errors) = Scanner::new(source).scan_tokens();
        assert!(errors.is_empty(), "scan errors: {:?}", errors);
        Parser::new(tokens).parse()
    }

    fn parse_one(source: &str) -> Stmt {
        let mut statements = parse(source).expect("failed to parse");
        assert_eq!(statements.len(), 1);
        statements.pop().unwrap()
    }

    fn printed(source: &str) -> String {
        AstPrinter.print(&parse_one(source))
    }

    #[test]
    fn subtraction_is_left_associative() {
        assert_eq!(printed("1 - 2 - 3;"), "(; (- (- 1 2) 3))");
    }

    #[test]
    fn unary_binds_tighter_than_factor() {
        assert_eq!(printed("-1 * 2;"), "(; (* (- 1) 2))");
    }

    #[test]
    fn precedence_chain() {
        assert_eq!(printed("1 + 2 * 3 == 7;"), "(; (== (+ 1 (* 2 3)) 7))");
    }

    #[test]
    fn call_and_property_chains() {
        assert_eq!(printed("a.b(1).c;"), "(; (. (call (. a b) 1) c))");
    }

    #[test]
    fn assignment_is_right_associative() {
        assert_eq!(printed("a = b = 1;"), "(; (= a (= b 1)))");
    }

    #[test]
    fn set_expression_from_property_target() {
        assert_eq!(printed("a.b = 2;"), "(; (.= a b 2))");
    }

    #[test]
    fn invalid_assignment_target_is_reported_not_fatal() {
        let errors = parse("1 = 2;").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Invalid assignment target"));
    }

    #[test]
    fn for_desugars_to_while() {
        let text = printed("for (var i = 0; i < 3; i = i + 1) print i;");
        assert_eq!(
            text,
            "(block (var i 0) (while (< i 3) (block (print i) (; (= i (+ i 1))))))"
        );
    }

    #[test]
    fn for_without_clauses_loops_on_true() {
        assert_eq!(printed("for (;;) print 1;"), "(while true (print 1))");
    }

    #[test]
    fn two_errors_from_one_invocation() {
        let errors = parse("var = 1;\nprint ;").unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("Expect variable name"));
        assert!(errors[1].message.contains("Expect expression"));
    }

    #[test]
    fn error_at_end_of_input() {
        let errors = parse("print 1").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].location, "at end");
    }

    #[test]
    fn expr_ids_are_unique_and_monotonic() {
        let (tokens, _) = Scanner::new("1 + 2;").scan_tokens();
        let mut parser = Parser::new(tokens).with_first_id(10);
        parser.parse().unwrap();
        // Three expressions: two literals and the binary node
        assert_eq!(parser.next_expr_id(), 13);
    }

    #[test]
    fn class_with_methods_parses() {
        let text = printed("class Point { init(x) { this.x = x; } get() { return this.x; } }");
        assert_eq!(
            text,
            "(class Point (fun init (x) (; (.= this x x))) (fun get () (return (. this x))))"
        );
    }
}
