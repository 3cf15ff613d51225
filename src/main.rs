use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use popl::ast::{ExprIdGen, Stmt};
use popl::ast_printer::AstPrinter;
use popl::diagnostics::Diagnostics;
use popl::error::PoplError;
use popl::parser::Parser;
use popl::scanner::Scanner;
use popl::session::{is_source_complete, Mode, RunStatus, Session};

#[derive(ClapParser, Debug)]
#[command(version, about = "PopL language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Option<Commands>,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize { filename: PathBuf },

    /// Parses a file and prints every statement's syntax tree
    Parse {
        filename: PathBuf,

        /// Dump the tree as JSON instead of prefix form
        #[arg(long)]
        json: bool,
    },

    /// Runs input from a file as a PopL program
    Run { filename: PathBuf },

    /// Starts an interactive session (the default)
    Repl,
}

/// Reads a whole source file as UTF‑8 text.
fn read_file(filename: PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(&filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    String::from_utf8(buf)
        .map_err(PoplError::from)
        .context(format!("File {:?} is not valid UTF-8", filename))
}

fn init_logger() -> Result<()> {
    // Create or open the log file
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("popl::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn print_reports(reports: &[PoplError]) {
    for report in reports {
        eprintln!("{}", report);
    }
}

fn tokenize(filename: PathBuf) -> Result<()> {
    info!("Running Tokenize subcommand");

    let source = read_file(filename)?;
    let mut tokenized = true;

    for token in Scanner::new(&source) {
        match token {
            Ok(token) => {
                debug!("Scanned token: {}", token);
                println!("{}", token);
            }

            Err(e) => {
                tokenized = false;
                eprintln!("{}", e);
            }
        }
    }

    if !tokenized {
        debug!("Tokenization failed, exiting with code 65");
        std::process::exit(65);
    }

    info!("Tokenization completed successfully");
    Ok(())
}

fn parse(filename: PathBuf, json: bool) -> Result<()> {
    info!("Running Parse subcommand");

    let source = read_file(filename)?;
    let mut diagnostics = Diagnostics::new();
    let mut ids = ExprIdGen::new();

    let tokens = popl::scanner::scan_tokens(&source, &mut diagnostics);
    let statements: Vec<Stmt> = Parser::new(tokens, &mut ids, &mut diagnostics).parse();

    if diagnostics.had_error() {
        print_reports(diagnostics.reports());
        std::process::exit(65);
    }

    if json {
        let dump = serde_json::to_string_pretty(&statements).context("Failed to serialize AST")?;
        println!("{}", dump);
    } else {
        for stmt in &statements {
            println!("{}", AstPrinter::print_stmt(stmt));
        }
    }

    info!("Parse subcommand completed");
    Ok(())
}

fn run(filename: PathBuf) -> Result<()> {
    info!("Running Run subcommand");

    let source = read_file(filename)?;
    let mut session = Session::new();

    let status = session.run(&source, Mode::Script);
    print_reports(&session.take_reports());

    match status {
        RunStatus::Ok => {
            info!("Program executed successfully");
            Ok(())
        }
        RunStatus::StaticError => std::process::exit(65),
        RunStatus::RuntimeError => std::process::exit(70),
    }
}

fn repl() -> Result<()> {
    info!("Starting REPL");

    let mut rl = DefaultEditor::new().context("Failed to create REPL")?;
    let mut session = Session::new();
    let mut buffer = String::new();

    loop {
        let prompt = if buffer.is_empty() { "> " } else { ". " };

        match rl.readline(prompt) {
            Ok(line) => {
                if buffer.is_empty() && line.trim().is_empty() {
                    continue;
                }

                buffer.push_str(&line);
                buffer.push('\n');

                if !is_source_complete(&buffer) {
                    continue;
                }

                let _ = rl.add_history_entry(buffer.trim_end());

                session.run(&buffer, Mode::Repl);
                print_reports(&session.take_reports());

                buffer.clear();
            }

            Err(ReadlineError::Interrupted) => {
                buffer.clear();
            }

            Err(ReadlineError::Eof) => break,

            Err(err) => {
                eprintln!("error: {:?}", err);
                break;
            }
        }
    }

    info!("REPL finished");
    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands.unwrap_or(Commands::Repl) {
        Commands::Tokenize { filename } => tokenize(filename),
        Commands::Parse { filename, json } => parse(filename, json),
        Commands::Run { filename } => run(filename),
        Commands::Repl => repl(),
    }
}
