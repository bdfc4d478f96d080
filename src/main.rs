use log::debug;

use clap::Parser;
use env_logger::Env;
use snafu::ErrorCompat;

mod args;
mod session;

use crate::args::Args;

fn main() {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();
    debug!("arguments: {:?}", args);

    match session::run_annotation(&args) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("An error occured {}", e);
            if let Some(bt) = ErrorCompat::backtrace(e.as_ref()) {
                eprintln!("trace: {}", bt);
            }
            std::process::exit(1);
        }
    }
}
