use thiserror::Error;

use crate::object::Object;
use crate::token::{Token, TokenType};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("[line {line}] Error: {message}")]
pub struct ScanError {
    pub line: i32,
    pub message: String,
}

#[derive(Debug)]
pub struct Scanner {
    source_chars: Vec<char>,
    tokens: Vec<Token>,
    errors: Vec<ScanError>,
    start: usize,
    current: usize,
    line: i32,
}

impl Scanner {
    pub fn new(source: &str) -> Self {
        Self {
            source_chars: source.chars().collect(),
            tokens: Vec::new(),
            errors: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
        }
    }

    /// Scans the whole source in one left-to-right pass. Bad characters and
    /// unterminated strings are recorded as errors and skipped, so one pass
    /// surfaces every lexical error in the input. The token stream always
    /// ends with exactly one EOF token.
    pub fn scan_tokens(&mut self) -> (Vec<Token>, Vec<ScanError>) {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token();
        }

        self.tokens.push(Token::new(TokenType::EOF, "", None, self.line));

        (std::mem::take(&mut self.tokens), std::mem::take(&mut self.errors))
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source_chars.len()
    }

    fn scan_token(&mut self) {
        let c = self.advance();

        match c {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            '-' => self.add_token(TokenType::Minus),
            '+' => self.add_token(TokenType::Plus),
            ';' => self.add_token(TokenType::Semicolon),
            '*' => self.add_token(TokenType::Star),
            '!' => {
                let token_type = if self.match_next('=') {
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                };
                self.add_token(token_type);
            }
            '=' => {
                let token_type = if self.match_next('=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                };
                self.add_token(token_type);
            }
            '<' => {
                let token_type = if self.match_next('=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                };
                self.add_token(token_type);
            }
            '>' => {
                let token_type = if self.match_next('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                };
                self.add_token(token_type);
            }
            '/' => {
                if self.match_next('/') {
                    // Go until end of the commented line
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenType::Slash);
                }
            }
            ' ' | '\r' | '\t' => {}
            '\n' => {
                self.line += 1;
            }
            '"' => self.string(),
            '0'..='9' => self.number(),
            c if is_alpha(c) => self.identifier(),
            _ => self.error(self.line, "Unexpected character."),
        }
    }

    fn error(&mut self, line: i32, message: &str) {
        self.errors.push(ScanError { line, message: message.to_owned() });
    }

    fn advance(&mut self) -> char {
        let ch = self.source_chars[self.current];
        self.current += 1;
        ch
    }

    fn add_token(&mut self, token_type: TokenType) {
        self.add_token_with_literal(token_type, None);
    }

    fn source_substring(&self, start: usize, end: usize) -> String {
        self.source_chars[start..end].iter().collect()
    }

    fn add_token_with_literal(&mut self, token_type: TokenType, literal_value: Option<Object>) {
        let text = self.source_substring(self.start, self.current);
        self.tokens.push(Token::new(token_type, &text, literal_value, self.line));
    }

    fn match_next(&mut self, expected: char) -> bool {
        if self.is_at_end() {
            return false;
        }

        if self.source_chars[self.current] == expected {
            self.current += 1;
            return true;
        }

        false
    }

    fn peek(&self) -> char {
        *self.source_chars.get(self.current).unwrap_or(&'\0')
    }

    fn peek_next(&self) -> char {
        *self.source_chars.get(self.current + 1).unwrap_or(&'\0')
    }

    fn string(&mut self) {
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            // No token for a literal that was cut short
            self.error(self.line, "Unterminated string.");
            return;
        }

        // The closing "
        self.advance();

        // Skip the quote marks
        let text = self.source_substring(self.start + 1, self.current - 1);
        self.add_token_with_literal(TokenType::StringLiteral, Some(Object::String(text)));
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // A dot only belongs to the number if a digit follows; otherwise it
        // is a property access or call chain dot.
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            // Consume '.'
            self.advance();

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let text = self.source_substring(self.start, self.current);
        let value = text
            .parse::<f64>()
            .unwrap_or_else(|_| panic!("failed to parse number: {}", text));

        self.add_token_with_literal(TokenType::Number, Some(Object::Number(value)));
    }

    fn identifier(&mut self) {
        while is_alpha_numeric(self.peek()) {
            self.advance();
        }

        let text = self.source_substring(self.start, self.current);
        let token_type = get_keyword(&text).unwrap_or(TokenType::Identifier);
        self.add_token(token_type);
    }
}

fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_alpha_numeric(c: char) -> bool {
    is_alpha(c) || c.is_ascii_digit()
}

fn get_keyword(text: &str) -> Option<TokenType> {
    match text {
        "and" => Some(TokenType::And),
        "class" => Some(TokenType::Class),
        "else" => Some(TokenType::Else),
        "false" => Some(TokenType::False),
        "for" => Some(TokenType::For),
        "fun" => Some(TokenType::Fun),
        "if" => Some(TokenType::If),
        "nil" => Some(TokenType::Nil),
        "or" => Some(TokenType::Or),
        "print" => Some(TokenType::Print),
        "return" => Some(TokenType::Return),
        "this" => Some(TokenType::This),
        "true" => Some(TokenType::True),
        "var" => Some(TokenType::Var),
        "while" => Some(TokenType::While),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> (Vec<Token>, Vec<ScanError>) {
        Scanner::new(source).scan_tokens()
    }

    fn token_types(source: &str) -> Vec<TokenType> {
        let (tokens, errors) = scan(source);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        tokens.into_iter().map(|t| t.token_type).collect()
    }

    #[test]
    fn always_ends_with_a_single_eof() {
        for source in ["", "   \n\t ", "1 + 2", "// just a comment"] {
            let (tokens, _) = scan(source);
            let eofs = tokens.iter().filter(|t| t.token_type == TokenType::EOF).count();
            assert_eq!(eofs, 1, "source: {:?}", source);
            assert_eq!(tokens.last().unwrap().token_type, TokenType::EOF);
        }
    }

    #[test]
    fn lexeme_lengths_never_exceed_source_length() {
        let source = "var answer = 4.2 * (10 - 1); // trailing";
        let (tokens, _) = scan(source);
        let total: usize = tokens.iter().map(|t| t.lexeme.len()).sum();
        assert!(total <= source.len());
    }

    #[test]
    fn maximal_munch_bang_equal() {
        assert_eq!(
            token_types("!="),
            vec![TokenType::BangEqual, TokenType::EOF]
        );
    }

    #[test]
    fn less_followed_by_non_equal_is_a_single_token() {
        assert_eq!(
            token_types("<1"),
            vec![TokenType::Less, TokenType::Number, TokenType::EOF]
        );
        assert_eq!(token_types("<="), vec![TokenType::LessEqual, TokenType::EOF]);
    }

    #[test]
    fn number_dot_requires_digit() {
        // '3.' is a number followed by a dot, not '3.0'
        assert_eq!(
            token_types("3.sqrt"),
            vec![TokenType::Number, TokenType::Dot, TokenType::Identifier, TokenType::EOF]
        );
    }

    #[test]
    fn string_spans_newlines_and_counts_lines() {
        let (tokens, errors) = scan("\"a\nb\" x");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].literal, Some(Object::String("a\nb".to_owned())));
        // The identifier after the string sits on line 2
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn unterminated_string_is_an_error_without_a_token() {
        let (tokens, errors) = scan("\"oops");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Unterminated string"));
        assert_eq!(tokens.len(), 1); // EOF only
    }

    #[test]
    fn bad_characters_are_skipped_and_all_reported() {
        let (tokens, errors) = scan("@ 1 # 2");
        assert_eq!(errors.len(), 2);
        let types: Vec<_> = tokens.iter().map(|t| t.token_type).collect();
        assert_eq!(types, vec![TokenType::Number, TokenType::Number, TokenType::EOF]);
    }

    #[test]
    fn keywords_are_reclassified() {
        assert_eq!(
            token_types("var x = nil;"),
            vec![
                TokenType::Var,
                TokenType::Identifier,
                TokenType::Equal,
                TokenType::Nil,
                TokenType::Semicolon,
                TokenType::EOF
            ]
        );
    }

    #[test]
    fn comments_produce_no_tokens() {
        assert_eq!(token_types("// nothing here\n1"), vec![TokenType::Number, TokenType::EOF]);
    }
}
