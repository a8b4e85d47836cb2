#![forbid(unsafe_code)]

//! snw — Snapshot Warden CLI entry point.

use clap::Parser;

mod cli_app;

fn main() {
    let args = match cli_app::Cli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // --help/--version are clean exits; everything else is a usage error.
            if e.use_stderr() {
                std::process::exit(1);
            }
            return;
        }
    };
    if let Err(e) = cli_app::run(&args) {
        eprintln!("snw: {e}");
        std::process::exit(1);
    }
}
