mod args;
mod evsim;

use clap::Parser;
use log::{debug, LevelFilter};
use snafu::ErrorCompat;

use crate::args::{Args, Command};

fn run(args: &Args) -> evsim::EvsimResult<()> {
    match &args.command {
        Command::Simulate {
            config,
            polls,
            date,
            reference,
        } => {
            evsim::run_simulate(config, polls, date, reference)?;
        }
        Command::Interpolate {
            config,
            before,
            after,
            date,
        } => {
            evsim::run_interpolate(config, before, after, date)?;
        }
        Command::Animate {
            config,
            from,
            to,
            frames,
        } => {
            let written = evsim::run_animate(config, from, to, frames)?;
            println!("{} files written", written.len());
        }
        Command::Changes { config, threshold } => {
            for line in evsim::run_changes(config, threshold)? {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
    debug!("args: {:?}", args);

    if let Err(e) = run(&args) {
        eprintln!("An error occured: {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
