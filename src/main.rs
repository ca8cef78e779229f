// main.rs
pub mod cli;
pub mod db;
pub mod error;
pub mod snapshot;
pub mod utils;

fn main() {
    // Every guard inside `run` is dropped before we exit, so the temporary
    // snapshot is gone by the time the status code is set.
    if let Err(e) = cli::run() {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }
}
