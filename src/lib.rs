pub mod analyzer;
pub mod codegen;
pub mod error;
pub mod lexer;
pub mod optimizer;
pub mod parser;

use analyzer::SemanticVisitor;
use codegen::Codegen;
use error::CompileResult;
use lexer::Lexer;
use optimizer::Optimizer;
use parser::{Parser, Program};

#[derive(Clone, Copy, Debug)]
pub struct CompileOptions {
    pub optimize: bool,
    /// Print the token stream to stderr.
    pub dump_tokens: bool,
    /// Print the final AST to stderr.
    pub dump_ast: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            optimize: true,
            dump_tokens: false,
            dump_ast: false,
        }
    }
}

/// Lexes, parses and analyzes `user_input`, then optimizes it if asked to.
pub fn analyze(
    user_input: &str,
    options: &CompileOptions,
) -> CompileResult<(Program, analyzer::SymbolTable)> {
    let tokens = Lexer::tokenize(user_input)?;
    if options.dump_tokens {
        for token in &tokens {
            eprintln!("{:>4} {:?} {:?}", token.line, token.kind, token.lexeme);
        }
    }

    let mut parser = Parser::new(tokens);
    let mut program = parser.parse()?;
    let symbol_table = parser.take_symbol_table();

    let mut visitor = SemanticVisitor::new(symbol_table);
    let symbol_table = visitor.visit_program(&mut program)?;

    if options.optimize {
        Optimizer::new().optimize(&mut program);
    }
    if options.dump_ast {
        eprint!("{}", program.ast.dump(program.root));
    }
    Ok((program, symbol_table))
}

/// Compiles a source text to IFJcode22 instructions.
pub fn compile(user_input: &str, options: &CompileOptions) -> CompileResult<String> {
    let (program, symbol_table) = analyze(user_input, options)?;
    let mut codegen = Codegen::new(symbol_table);
    codegen.generate(&program)
}
