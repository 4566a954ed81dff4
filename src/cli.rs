use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::runtime::Config;

#[derive(Parser, Debug)]
#[clap(version, about = "Interpreter for the Duet scripting language")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Maximum nesting of user function calls before evaluation aborts
    #[arg(long, global = true, default_value_t = Config::default().max_call_depth)]
    pub max_depth: usize,
}

impl Args {
    pub fn config(&self) -> Config {
        Config {
            max_call_depth: self.max_depth,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate a Duet program and print the value of its last expression
    Run {
        /// Program to evaluate
        file: PathBuf,

        /// Extra arguments, bound to `args` as a list of strings
        args: Vec<String>,
    },

    /// Parse a program and report syntax errors without evaluating it
    Check {
        /// Program to parse
        file: PathBuf,
    },

    /// Start the interactive prompt (used when no command is given)
    Repl,
}
