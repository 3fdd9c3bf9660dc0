//! sqlcell — compose SQL cells from the command line
//!
//! # Usage
//!
//! ```bash
//! # Compose a query against snippets from sqlcell.toml
//! sqlcell "--with recent SELECT count(*) FROM recent"
//!
//! # Line plus cell
//! sqlcell "--with recent" --cell "SELECT * FROM recent LIMIT 5"
//!
//! # Interactive session with --save / --with
//! sqlcell repl
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use sqlcell::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sqlcell")]
#[command(version)]
#[command(about = "Ad-hoc SQL cells with composable snippets", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlcell 'SELECT 1'
    sqlcell '--with recent SELECT count(*) FROM recent'
    sqlcell 'rows <<' --cell-file query.sql --format json
    sqlcell repl")]
struct Cli {
    /// The invocation line (flags and/or SQL). Quote it as one argument.
    line: Vec<String>,

    /// Cell text following the line
    #[arg(long, conflicts_with = "cell_file")]
    cell: Option<String>,

    /// Read the cell text from a file
    #[arg(long)]
    cell_file: Option<PathBuf>,

    /// Config file
    #[arg(long, env = "SQLCELL_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Write the composed SQL to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how an invocation is parsed and which CTEs it pulls in
    Explain {
        /// The invocation line
        line: String,

        /// Cell text following the line
        #[arg(long)]
        cell: Option<String>,
    },
    /// Interactive session
    Repl,
    /// List the snippets available at session start
    Snippets,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "sqlcell=debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let mut session = Session::new(config)?;

    match &cli.command {
        Some(Commands::Explain { line, cell }) => {
            explain(&session, line, cell.as_deref().unwrap_or(""));
            Ok(())
        }
        Some(Commands::Repl) => run_repl(&mut session),
        Some(Commands::Snippets) => {
            show_snippets(&session);
            Ok(())
        }
        None => {
            if cli.line.is_empty() && cli.cell.is_none() && cli.cell_file.is_none() {
                println!("{}", "sqlcell — ad-hoc SQL cells".cyan().bold());
                println!();
                println!("Usage: sqlcell <LINE> [--cell <CELL>] [OPTIONS]");
                println!();
                println!("Try: sqlcell --help");
                return Ok(());
            }
            compose_once(&mut session, cli)
        }
    }
}

fn compose_once(session: &mut Session, cli: &Cli) -> anyhow::Result<()> {
    let line = cli.line.join(" ");
    let cell = match (&cli.cell, &cli.cell_file) {
        (Some(cell), _) => cell.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading cell from {}", path.display()))?,
        (None, None) => String::new(),
    };

    if cli.verbose {
        println!("{} {}", "Line:".dimmed(), line.yellow());
    }

    let command = session.compose(&line, &cell)?;

    if command.args().connections || command.args().close.is_some() {
        print_outcome(session.run(&line, &cell, &mut EchoExecutor)?);
        return Ok(());
    }

    if let Some(path) = &cli.output {
        write_output(path, command.sql())?;
        println!("{} Wrote SQL to {}", "✓".green(), path.display().to_string().cyan());
        return Ok(());
    }

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&command)?),
        OutputFormat::Text => print_command(&command),
    }
    Ok(())
}

fn write_output(path: &Path, sql: &str) -> SqlCellResult<()> {
    std::fs::write(path, sql).map_err(|source| SqlCellError::OutputPath {
        path: path.to_path_buf(),
        source,
    })
}

fn print_command(command: &SqlCommand) {
    if !command.connection().is_none() {
        println!("{} {}", "Connection:".dimmed(), command.connection().to_string().cyan());
    }
    if let Some(var) = command.result_var() {
        println!("{} {}", "Result var:".dimmed(), var.yellow());
    }
    println!("{}", "Generated SQL:".green().bold());
    println!("{}", command.sql().white());
}

fn explain(session: &Session, line: &str, cell: &str) {
    println!("{}", "sqlcell Invocation Explanation".cyan().bold());
    println!();
    println!("{} {}", "Line:".dimmed(), line.yellow());
    if !cell.is_empty() {
        println!("{} {}", "Cell:".dimmed(), cell.yellow());
    }
    println!();

    match session.compose(line, cell) {
        Ok(cmd) => {
            println!("{}", "Parsed Structure:".green().bold());
            let source = match cmd.body_source() {
                BodySource::Line => "line tokens".to_string(),
                BodySource::Cell => "cell".to_string(),
                BodySource::LineAsBody => "whole line".to_string(),
                BodySource::File { path } => format!("file {}", path.display()),
            };
            println!("  {} {}", "Body from:".dimmed(), source.white());
            println!("  {} {}", "Connection:".dimmed(), cmd.connection().to_string().cyan());
            if let Some(var) = cmd.result_var() {
                println!("  {} {}", "Result var:".dimmed(), var.white());
            }
            if let Some(name) = &cmd.args().save {
                println!("  {} {}", "Saves as:".dimmed(), name.white());
            }

            if !cmd.with_list().is_empty() {
                println!("  {}", "CTEs (in order):".dimmed());
                // Same store and list as the composed command.
                if let Ok(order) = session.store().resolve(cmd.with_list()) {
                    for snippet in order {
                        println!("    • {}", snippet.name.white());
                    }
                }
            }

            println!();
            println!("{}", "Original SQL:".green().bold());
            println!("  {}", cmd.sql_original().white());
            println!("{}", "Generated SQL:".green().bold());
            println!("  {}", cmd.sql().white());
        }
        Err(e) => {
            eprintln!("{} {}", "Compose Error:".red().bold(), e);
        }
    }
}

fn show_snippets(session: &Session) {
    let snippets = session.store().list();
    if snippets.is_empty() {
        println!("{}", "(no snippets)".dimmed());
        return;
    }

    for snippet in snippets {
        let deps = if snippet.dependencies.is_empty() {
            String::new()
        } else {
            format!(" ← {}", snippet.dependencies.join(", "))
        };
        println!(
            "{}{} {}",
            snippet.name.cyan().bold(),
            deps.dimmed(),
            snippet.saved_at.format("%H:%M:%S").to_string().dimmed()
        );
        println!("    {}", snippet.body.trim().white());
    }
}

fn show_connections(connections: &[sqlcell::connection::ConnectionSummary]) {
    if connections.is_empty() {
        println!("{}", "(no connections)".dimmed());
        return;
    }
    for c in connections {
        let marker = if c.current { "*" } else { " " };
        let aliases = if c.aliases.is_empty() {
            String::new()
        } else {
            format!(" ({})", c.aliases.join(", "))
        };
        println!("{} {}{} {}", marker.green(), c.name.white(), aliases.cyan(), c.url.dimmed());
    }
}

/// Executor for the REPL: drivers are outside sqlcell, so show what would run.
struct EchoExecutor;

impl Executor for EchoExecutor {
    type Output = String;

    fn execute(&mut self, connection: &ConnectionHandle, sql: &str) -> SqlCellResult<String> {
        Ok(format!("-- on {}\n{}", connection.name, sql))
    }
}

fn run_repl(session: &mut Session) -> anyhow::Result<()> {
    use rustyline::DefaultEditor;
    use rustyline::error::ReadlineError;

    println!("{}", "sqlcell REPL — Interactive Mode".cyan().bold());
    println!("{}", "Type an invocation line, or %% <line> to start a cell (blank line ends it).".dimmed());
    println!("{}", "Commands: .snippets .connections .reset .help .exit".dimmed());
    println!();

    let mut rl = DefaultEditor::new().context("initializing line editor")?;

    let history_path = dirs::home_dir()
        .map(|p| p.join(".sqlcell_history"))
        .unwrap_or_default();
    let _ = rl.load_history(&history_path);

    let mut executor = EchoExecutor;

    loop {
        let prompt = "sql> ".cyan().bold().to_string();
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line);

        match line {
            ".exit" | ".quit" | "exit" | "quit" => break,
            ".help" | "help" => {
                println!("  {} <line>     run a line invocation", "%".yellow());
                println!("  {} <line>    start a cell, end with a blank line", "%%".yellow());
                println!("  {}      list saved snippets", ".snippets".yellow());
                println!("  {}   list connections", ".connections".yellow());
                println!("  {}         forget saved snippets", ".reset".yellow());
                continue;
            }
            ".snippets" => {
                show_snippets(session);
                continue;
            }
            ".connections" => {
                show_connections(&session.connections().list());
                continue;
            }
            ".reset" => {
                session.reset()?;
                println!("{}", "Snippets cleared.".green());
                continue;
            }
            _ => {}
        }

        let (invocation, cell) = match line.strip_prefix("%%") {
            Some(rest) => {
                let mut cell = Vec::new();
                loop {
                    match rl.readline("...> ") {
                        Ok(next) if next.trim().is_empty() => break,
                        Ok(next) => cell.push(next),
                        Err(_) => break,
                    }
                }
                (rest.to_string(), cell.join("\n"))
            }
            None => (line.trim_start_matches('%').to_string(), String::new()),
        };

        match session.run(&invocation, &cell, &mut executor) {
            Ok(outcome) => print_outcome(outcome),
            Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
        }
    }

    let _ = rl.save_history(&history_path);
    println!("{}", "Goodbye!".green());
    Ok(())
}

fn print_outcome(outcome: Outcome<String>) {
    match outcome {
        Outcome::Connections { connections } => show_connections(&connections),
        Outcome::Closed { connection } => {
            println!("{} closed {}", "✓".green(), connection.name.cyan())
        }
        Outcome::Skipped { command } => match &command.args().save {
            Some(name) => println!("{} saved {}", "✓".green(), name.cyan()),
            None => print_command(&command),
        },
        Outcome::Connected { connection } => {
            println!("{} using {}", "✓".green(), connection.name.cyan())
        }
        Outcome::Executed { command, output } => {
            if let Some(var) = command.result_var() {
                println!("{} {}", "Result var:".dimmed(), var.yellow());
            }
            println!("{}", output.white());
        }
    }
}
