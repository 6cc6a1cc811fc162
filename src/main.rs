//! `qatrack` (qt) - QA tracker
//!
//! Role-scoped listings, sequential display IDs and CSV transfer over a local
//! `SQLite` workspace.

use qatrack::format::ErrorOutput;
use qatrack::run;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", ErrorOutput::from_error(&e).message);
        std::process::exit(1);
    }
}
