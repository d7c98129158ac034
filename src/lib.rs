#![allow(clippy::new_without_default)]

mod ast;
mod class;
mod environment;
mod error;
mod func;
mod interpreter;
mod object;
mod parser;
mod resolver;
mod scanner;
mod token;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::class::*;
    pub use crate::environment::Environment;
    pub use crate::error::*;
    pub use crate::func::*;
    pub use crate::interpreter::*;
    pub use crate::object::*;
    pub use crate::parser::*;
    pub use crate::resolver::{Resolution, ResolveError, Resolver, Warning};
    pub use crate::scanner::*;
    pub use crate::token::*;
    pub use crate::Shared;
}

use std::cell::RefCell;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

use log::debug;

use prelude::{AstPrinter, Interpreter, Parser, Resolver, Scanner};

pub type Shared<T> = Rc<RefCell<T>>;

/// Front end for one interpreter session. Both file and prompt execution go
/// through [`Treelox::run`]; the error flags survive until inspected so a
/// file run can pick its exit code after the fact.
pub struct Treelox {
    interpreter: Interpreter,
    next_expr_id: u32,
    verbose: bool,
    had_error: bool,
    had_runtime_error: bool,
}

impl Treelox {
    pub fn new() -> Self {
        Self {
            interpreter: Interpreter::new(),
            next_expr_id: 0,
            verbose: false,
            had_error: false,
            had_runtime_error: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    pub fn run_file(&mut self, filename: &str) -> Result<(), anyhow::Error> {
        let content = std::fs::read_to_string(filename)?;
        self.run(&content);
        Ok(())
    }

    /// Line-at-a-time loop on stdin. Static errors are reported and
    /// forgotten so the next line gets a clean slate, while runtime state
    /// (globals, closures) persists across lines.
    pub fn run_prompt(&mut self) -> Result<(), anyhow::Error> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            print!("> ");
            stdout.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }

            self.run(&line);
            self.had_error = false;
            self.had_runtime_error = false;

            if self.verbose {
                let dump = self.interpreter.dump_globals();
                if !dump.is_empty() {
                    eprintln!("--- globals ---\n{dump}");
                }
            }
        }

        Ok(())
    }

    pub fn run(&mut self, source: &str) {
        let (tokens, scan_errors) = Scanner::new(source).scan_tokens();
        debug!("scanned {} tokens", tokens.len());

        for e in &scan_errors {
            eprintln!("{e}");
        }
        self.had_error = !scan_errors.is_empty();

        // Node ids keep counting up from previous runs so the persistent
        // resolution table never sees a collision
        let mut parser = Parser::new(tokens).with_first_id(self.next_expr_id);
        let statements = match parser.parse() {
            Ok(stmts) => stmts,
            Err(errors) => {
                for e in errors {
                    eprintln!("{e}");
                }
                self.had_error = true;
                return;
            }
        };

        if self.had_error {
            return;
        }

        let resolution = match Resolver::new().resolve(&statements) {
            Ok(resolution) => resolution,
            Err(errors) => {
                for e in errors {
                    eprintln!("{e}");
                }
                self.had_error = true;
                return;
            }
        };
        debug!("resolved {} local references", resolution.locals.len());

        if self.verbose {
            let printer = AstPrinter;
            for stmt in &statements {
                eprintln!("{}", printer.print(stmt));
            }
        }

        for warning in &resolution.warnings {
            eprintln!("{warning}");
        }

        self.next_expr_id = parser.next_expr_id();
        self.interpreter.bind_locals(resolution.locals);

        if let Err(fault) = self.interpreter.interpret(&statements) {
            eprintln!("{fault}");
            self.had_runtime_error = true;
        }
    }
}
