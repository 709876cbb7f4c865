//! Command-line front-end for the AutoByte toolbox.
//!
//! `list` prints the script catalog; `run` downloads and executes one
//! script, streaming its output to the terminal and forwarding stdin lines
//! to the script as interactive input.

use std::io::{self, BufRead};
use std::process::ExitCode;
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use autobyte::catalog;
use autobyte::error::ErrorSeverity;
use autobyte::fetch::HttpFetcher;
use autobyte::interpreter::Interpreter;
use autobyte::logging;
use autobyte::session::{OutputSink, SessionController, SessionStatus};

#[derive(Parser)]
#[command(
    name = "autobyte",
    version,
    about = "Download and run PowerShell fix-it scripts with live, interactive output"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the scripts in the catalog
    List,
    /// Download and run a catalog script
    Run {
        /// Script label (case-insensitive) or 1-based catalog index
        script: String,
    },
}

/// Prints output lines as they arrive and signals the terminal status.
struct ConsoleSink {
    done: Sender<SessionStatus>,
}

impl OutputSink for ConsoleSink {
    fn on_line(&self, line: &str) {
        println!("{}", line);
    }

    fn on_terminal(&self, status: &SessionStatus) {
        match status {
            SessionStatus::Completed(code) => println!("[completed] exit code: {}", code),
            SessionStatus::Failed(reason) => println!("[failed] {}", reason),
            _ => {}
        }
        let _ = self.done.send(status.clone());
    }
}

fn main() -> ExitCode {
    let _guard = logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::List => {
            list();
            ExitCode::SUCCESS
        }
        Commands::Run { script } => run(&script),
    }
}

fn list() {
    for (index, entry) in catalog::builtin().iter().enumerate() {
        println!("{:2}. {}", index + 1, entry.label);
    }
}

fn run(query: &str) -> ExitCode {
    let entries = catalog::builtin();
    let Some(source) = catalog::find(&entries, query) else {
        eprintln!("unknown script '{}'; try `autobyte list`", query);
        return ExitCode::FAILURE;
    };

    let (done_tx, done_rx) = channel();
    let sink = Arc::new(ConsoleSink { done: done_tx });
    let controller = SessionController::new(
        Box::new(HttpFetcher::new()),
        Interpreter::powershell(),
        sink,
    );

    println!("▶ {}", source.label);
    println!("Downloading from {}", source.url);

    let handle = match controller.start(source) {
        Ok(handle) => handle,
        Err(err) => {
            // The sink has already shown the failure; the log keeps the cause.
            match err.severity() {
                ErrorSeverity::Error => error!(error = %err, "Could not start script"),
                _ => warn!(error = %err, "Could not start script"),
            }
            return ExitCode::FAILURE;
        }
    };
    println!("Saved to {}", handle.script_path.display());
    info!(pid = handle.pid, label = %source.label, "Session started");

    // Forward terminal input lines to the script for interactive prompts.
    let input = controller.clone();
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match input.send_input(&line) {
                Ok(()) => println!("> {}", line),
                Err(err) => eprintln!("[send error] {}", err),
            }
        }
    });

    match done_rx.recv() {
        Ok(SessionStatus::Completed(0)) => ExitCode::SUCCESS,
        Ok(SessionStatus::Completed(code)) => ExitCode::from(code.clamp(1, 255) as u8),
        _ => ExitCode::FAILURE,
    }
}
