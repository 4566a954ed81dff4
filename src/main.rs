use clap::Parser;
use dirs::home_dir;
use duet::{
    cli::{Args, Commands},
    environment::Scope,
    error::Result,
    parser::parse,
    repl::{REPLPrompt, REPLValidator, SyntaxHighlighter},
    runtime::{Config, Interpreter},
    stdlib::Builtins,
    value::Value,
};
use log::{debug, info};
use nu_ansi_term::{Color, Style};
use reedline::{DefaultHinter, FileBackedHistory, Reedline, Signal};
use std::{fs, path::PathBuf};

fn run_file(file: PathBuf, args: Vec<String>, config: Config) -> Result<()> {
    let source = fs::read_to_string(file)?;
    let program = parse(&source)?;
    debug!("parsed {} statements", program.statements.len());

    let scope = Scope::new();
    scope.set(
        "args",
        Value::list(args.into_iter().map(Value::String).collect()),
    );

    let mut interpreter = Interpreter::with_config(Builtins::standard(), config);
    if let Some(value) = interpreter.run(&program, &scope)? {
        println!("{}", value);
    }

    Ok(())
}

fn check_file(file: PathBuf) -> Result<()> {
    let source = fs::read_to_string(file)?;
    let program = parse(&source)?;
    println!("ok: {} statements", program.statements.len());

    Ok(())
}

fn run_repl(config: Config) -> Result<()> {
    let mut line_editor = Reedline::create()
        .with_hinter(Box::new(
            DefaultHinter::default().with_style(Style::new().italic().fg(Color::LightGray)),
        ))
        .with_highlighter(Box::new(SyntaxHighlighter))
        .with_validator(Box::new(REPLValidator));

    // Add file-backed history if possible
    if let Some(history) = home_dir()
        .map(|home| home.join(".duet_history"))
        .and_then(|path| FileBackedHistory::with_file(100, path).ok())
        .map(Box::new)
    {
        line_editor = line_editor.with_history(history);
    } else {
        eprintln!("NOTE: Failed to load history. Persistence is now disabled.")
    }

    let prompt = REPLPrompt;
    let scope = Scope::new();
    let mut interpreter = Interpreter::with_config(Builtins::standard(), config);

    println!(
        "Duet version {}. Ctrl-C to exit.",
        env!("CARGO_PKG_VERSION")
    );

    loop {
        match line_editor.read_line(&prompt)? {
            Signal::Success(buffer) => {
                interpreter
                    .run_source(&buffer, &scope)
                    .inspect(|value| {
                        if let Some(value) = value {
                            println!("{}", value);
                        }
                    })
                    .inspect_err(|err| {
                        eprintln!("{}", err);
                    })
                    .ok();
            }
            Signal::CtrlD | Signal::CtrlC => {
                break Ok(());
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = args.config();
    debug!("config: {:?}", config);

    match args.command {
        Some(Commands::Run { file, args }) => {
            info!("FILE MODE");
            debug!("file: {:?}", file);
            debug!("args: {:?}", args);

            run_file(file, args, config)
                .inspect_err(|err| {
                    eprintln!("{}", err);
                })
                .ok();
        }
        Some(Commands::Check { file }) => {
            info!("CHECK MODE");
            debug!("file: {:?}", file);

            check_file(file)
                .inspect_err(|err| {
                    eprintln!("{}", err);
                })
                .ok();
        }
        Some(Commands::Repl) | None => {
            info!("REPL MODE");

            run_repl(config)
                .inspect_err(|err| {
                    eprintln!("{}", err);
                })
                .ok();
        }
    }
    Ok(())
}
