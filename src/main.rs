use std::env;
use std::fs;
use std::process;

use colored::Colorize;

use vau::repl::REPL;
use vau::runtime::Runtime;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone)]
enum ArgCmd {
    Repl,
    File { path: String },
    Help,
}

fn print_usage() {
    println!("vau v{}\n", VERSION);
    println!("Usage:");
    println!("  vau                    Start the REPL");
    println!("  vau --file <path>      Evaluate a file and print the last value");
    println!("  vau -h                 Show this help message");
}

fn parse_args(args: Vec<String>) -> Result<ArgCmd, String> {
    if args.len() == 1 {
        return Ok(ArgCmd::Repl);
    }

    let mut file_path: Option<String> = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                return Ok(ArgCmd::Help);
            }
            "--file" => {
                if i + 1 >= args.len() {
                    return Err("Error: --file requires a file path".to_string());
                }
                file_path = Some(args[i + 1].clone());
                i += 1; // Skip the file path
            }
            arg => {
                return Err(format!("Error: Unknown argument '{}'", arg));
            }
        }
        i += 1;
    }

    match file_path {
        Some(path) => Ok(ArgCmd::File { path }),
        None => Ok(ArgCmd::Repl),
    }
}

fn run_file(file_path: &str) -> Result<(), String> {
    let source = fs::read_to_string(file_path)
        .map_err(|e| format!("Error reading {}: {}", file_path, e))?;

    let runtime = Runtime::new();
    match runtime.rep(&source) {
        Ok(value) => {
            println!("{}", value);
            Ok(())
        }
        Err(diagnostic) => Err(diagnostic.format_error()),
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    let command = match parse_args(args) {
        Ok(cmd) => cmd,
        Err(e) => {
            eprintln!("{}\n", e);
            print_usage();
            process::exit(1);
        }
    };

    match command {
        ArgCmd::Help => {
            print_usage();
        }
        ArgCmd::Repl => {
            let repl = REPL::new();
            repl.run();
        }
        ArgCmd::File { path } => {
            if let Err(e) = run_file(&path) {
                eprintln!("{}", e.red());
                process::exit(1);
            }
        }
    }
}
