//! Stream Ledger CLI
//!
//! Replays a CSV scenario against an in-memory stream ledger and prints the
//! final state of every stream.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- scenario.csv > streams.csv
//! cargo run -- scenario.csv --balances > balances.csv
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity
//! - `STREAM_LEDGER_OWNER`: Initial owner of the ledger (default `admin`)

use stream_ledger::{Address, ReplayError, Simulator};
use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::process;

const DEFAULT_OWNER: &str = "admin";

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), ReplayError> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(ReplayError::MissingArgument);
    }

    let input_path = &args[1];
    let show_balances = args[2..].iter().any(|a| a == "--balances");
    let owner = env::var("STREAM_LEDGER_OWNER").unwrap_or_else(|_| DEFAULT_OWNER.to_string());

    let file = File::open(input_path)?;
    let reader = BufReader::new(file);

    let mut simulator = Simulator::new(Address::new(owner));
    simulator.process_csv(reader)?;

    let stdout = io::stdout();
    let handle = stdout.lock();
    if show_balances {
        simulator.write_balances(handle)?;
    } else {
        simulator.write_output(handle)?;
    }

    Ok(())
}
