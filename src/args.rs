use clap::{Parser, Subcommand};

/// This is a poll aggregation and electoral vote simulation program.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Aggregates the polls of every state as of a date, and stores the polling results and
    /// the electoral vote counts.
    Simulate {
        /// (file path) The JSON configuration file.
        #[clap(short, long, value_parser)]
        config: String,
        /// (file path) The polls, as a CSV file with the columns region,date,opponent,leader,margin.
        #[clap(short, long, value_parser)]
        polls: String,
        /// (YYYY-MM-DD, default today) The date of the simulation.
        #[clap(short, long, value_parser)]
        date: Option<String>,
        /// (file path) A reference file containing the electoral vote counts in JSON format. If
        /// provided, evsim will check that the computed counts match the reference.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
    /// Reconstructs the polling results of a missing day from the days around it.
    Interpolate {
        /// (file path) The JSON configuration file.
        #[clap(short, long, value_parser)]
        config: String,
        /// (YYYY-MM-DD) The stored day before the missing one.
        #[clap(short, long, value_parser)]
        before: String,
        /// (YYYY-MM-DD) The stored day after the missing one.
        #[clap(short, long, value_parser)]
        after: String,
        /// (YYYY-MM-DD, default the middle of the two days) The day to reconstruct.
        #[clap(short, long, value_parser)]
        date: Option<String>,
    },
    /// Writes the frames of an animated transition between two stored days.
    Animate {
        /// (file path) The JSON configuration file.
        #[clap(short, long, value_parser)]
        config: String,
        /// (YYYY-MM-DD) The first day of the transition.
        #[clap(short, long, value_parser)]
        from: String,
        /// (YYYY-MM-DD) The last day of the transition.
        #[clap(short, long, value_parser)]
        to: String,
        /// (default from the configuration, or 10) The number of frames.
        #[clap(long, value_parser)]
        frames: Option<usize>,
    },
    /// Describes what changed between the two most recent stored days.
    Changes {
        /// (file path) The JSON configuration file.
        #[clap(short, long, value_parser)]
        config: String,
        /// (default from the configuration, or 0.75) The relative change of a lead above
        /// which it is reported.
        #[clap(long, value_parser)]
        threshold: Option<f64>,
    },
}
