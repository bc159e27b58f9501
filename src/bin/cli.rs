use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;

use rowwire::client::{format_row, format_table, FrameReader};
use rowwire::engine::SqliteEngine;
use rowwire::session::QueryDocument;
use rowwire::{
    materialize, stream_to_writer, CodecConfig, EngineHandle, QueryRequest, SessionConfig, SqliteConfig,
};

const HISTORY_FILE: &str = ".rowwire_history";

#[derive(Parser)]
#[command(author, version, about = "rowwire - stream SQLite query results as typed rows")]
struct Cli {
    /// Database file path (in-memory database when omitted)
    #[arg(short, long)]
    db_path: Option<PathBuf>,

    /// SQL script to run before anything else
    #[arg(short, long)]
    init: Option<PathBuf>,

    /// How long to wait on a locked database, in milliseconds
    #[arg(long, default_value_t = 5000)]
    busy_timeout_ms: u64,

    /// Deepest list/map nesting the encoder accepts
    #[arg(long, default_value_t = rowwire::config::DEFAULT_MAX_NESTING_DEPTH)]
    max_depth: usize,

    /// Command to execute
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive shell
    Shell,

    /// Execute a single query
    Query {
        /// SQL query to execute
        sql: String,

        /// Write the framed response stream to this file instead of printing rows
        #[arg(long)]
        frames: Option<PathBuf>,

        /// Print the result as a table
        #[arg(long)]
        table: bool,
    },
}

struct App {
    engine: EngineHandle,
    session_config: SessionConfig,
    codec_config: CodecConfig,
}

impl App {
    fn new(cli: &Cli) -> Result<Self> {
        let sqlite_config = SqliteConfig {
            path: cli.db_path.clone(),
            busy_timeout: Duration::from_millis(cli.busy_timeout_ms),
        };
        let sqlite = SqliteEngine::open(&sqlite_config).context("Failed to open database")?;

        if let Some(init) = &cli.init {
            let script = fs::read_to_string(init)
                .with_context(|| format!("Failed to read init script {}", init.display()))?;
            sqlite
                .execute_batch(&script)
                .with_context(|| format!("Failed to run init script {}", init.display()))?;
        }

        Ok(Self {
            engine: EngineHandle::new(sqlite),
            session_config: SessionConfig {
                max_nesting_depth: cli.max_depth,
                ..SessionConfig::default()
            },
            codec_config: CodecConfig {
                max_nesting_depth: cli.max_depth,
                ..CodecConfig::default()
            },
        })
    }

    fn run_query(&self, sql: &str) -> Result<QueryDocument> {
        Ok(materialize(&self.engine, &QueryRequest::new(sql), &self.session_config)?)
    }

    fn write_frames(&self, sql: &str, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        let summary = stream_to_writer(
            &self.engine,
            &QueryRequest::new(sql),
            &self.session_config,
            &self.codec_config,
            BufWriter::new(file),
        )?;
        println!("Wrote {} rows to {}", summary.rows_sent, path.display());

        // read back to make sure the stream is well formed
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let outcome = FrameReader::new(file, self.codec_config.clone()).read_to_end()?;
        println!("Stream status: {}", outcome.status);
        Ok(())
    }
}

fn display_result(doc: &QueryDocument, as_table: bool) {
    if as_table {
        println!("{}", format_table(doc.columns(), doc.rows()));
        return;
    }
    for row in doc.rows() {
        println!("{}", format_row(doc.columns(), row));
    }
    println!("({} rows)", doc.row_count());
}

fn run_shell(app: &App) -> Result<()> {
    println!("Welcome to the rowwire shell. Type 'help' for assistance or 'exit' to quit.");

    let mut rl = Editor::<(), DefaultHistory>::new()?;
    if let Err(err) = rl.load_history(HISTORY_FILE) {
        if !err.to_string().contains("No such file or directory") {
            println!("Error loading history: {}", err);
        }
    }

    loop {
        match rl.readline("rowwire> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);

                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match line.to_lowercase().as_str() {
                    "exit" | "quit" => {
                        println!("Goodbye!");
                        break;
                    }
                    "help" => print_help(),
                    _ => match app.run_query(line) {
                        Ok(doc) => display_result(&doc, true),
                        Err(err) => println!("Error: {}", err),
                    },
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {}", err);
                break;
            }
        }
    }

    if let Err(err) = rl.save_history(HISTORY_FILE) {
        println!("Error saving history: {}", err);
    }
    Ok(())
}

fn print_help() {
    println!("Enter any SQL statement that returns rows; the result is printed as a table.");
    println!();
    println!("Other commands:");
    println!("  help    - Display this help message");
    println!("  exit    - Exit the shell");
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let app = App::new(&cli)?;

    match &cli.command {
        Some(Commands::Query { sql, frames, table }) => match frames {
            Some(path) => app.write_frames(sql, path)?,
            None => display_result(&app.run_query(sql)?, *table),
        },
        Some(Commands::Shell) | None => run_shell(&app)?,
    }

    Ok(())
}
