use std::fs;
use std::process;

use clap::Parser;
use clap_stdin::FileOrStdin;

use phpcc::error::CompileError;
use phpcc::{compile, CompileOptions};

/// Compiles a PHP subset to IFJcode22.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Source file, `-` for stdin
    #[arg(default_value = "-")]
    input: FileOrStdin,

    /// Write the instructions here instead of stdout
    #[arg(short, long)]
    output: Option<String>,

    /// Skip folding, propagation and dead-branch removal
    #[arg(long)]
    no_optimize: bool,

    #[arg(long)]
    dump_tokens: bool,

    #[arg(long)]
    dump_ast: bool,
}

fn run(args: Args) -> Result<(), CompileError> {
    let options = CompileOptions {
        optimize: !args.no_optimize,
        dump_tokens: args.dump_tokens,
        dump_ast: args.dump_ast,
    };
    let user_input = args
        .input
        .contents()
        .map_err(|e| CompileError::internal(format!("cannot read input: {}", e)))?;

    let code = compile(&user_input, &options)?;

    match args.output {
        Some(path) => fs::write(&path, code)
            .map_err(|e| CompileError::internal(format!("cannot write {}: {}", path, e))),
        None => {
            print!("{}", code);
            Ok(())
        }
    }
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        process::exit(e.exit_code());
    }
}
