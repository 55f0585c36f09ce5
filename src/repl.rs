use std::rc::Rc;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::error::Diagnostic;
use crate::runtime::Runtime;
use crate::value::Value;

pub struct REPL {
    runtime: Rc<Runtime>,
}

impl REPL {
    pub fn new() -> Self {
        REPL { runtime: Runtime::new() }
    }

    pub fn rep(&self, input: &str) -> Result<Value, Diagnostic> {
        self.runtime.rep(input)
    }

    pub fn run(&self) {
        let mut rl = DefaultEditor::new().unwrap();
        if rl.load_history(".vau-history").is_err() {}

        'repl_loop: loop {
            let readline = rl.readline("vau> ");
            match readline {
                Ok(line) => {
                    if let Err(err) = rl.add_history_entry(line.as_str()) {
                        eprintln!("Error adding to history: {:?}", err);
                    }

                    if let Err(err) = rl.save_history(".vau-history") {
                        eprintln!("Error saving history: {:?}", err);
                    }

                    if !line.is_empty() {
                        match self.rep(&line) {
                            Ok(value) => println!("{}", value),
                            Err(e) => {
                                println!("{}", e.format_error().red());
                                continue 'repl_loop;
                            }
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => continue 'repl_loop,
                Err(ReadlineError::Eof) => break 'repl_loop,
                Err(err) => {
                    println!("Error: {:?}", err);
                    break 'repl_loop;
                }
            }
        }
    }
}
