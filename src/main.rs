//! remedy CLI binary
//!
//! All logic lives in the library; main only invokes cli::run() and
//! maps its result to a process exit code.

fn main() {
    if let Err(e) = remedy::cli::run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
