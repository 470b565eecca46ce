use clap::Parser;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use wordgrid_core::engine::Crossword;
use wordgrid_core::search::{AutofillParams, FillOutcome, Solvability};

/// wordgrid: command-line crossword construction tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a saved puzzle file (width, height, then one comma-delimited
    /// row per line with - for barriers)
    puzzle_path: String,

    /// Path to a scored dictionary file; when given, the puzzle is
    /// autofilled before printing
    #[arg(long)]
    dictionary: Option<String>,

    /// Suppress log output
    #[arg(long, short)]
    silent: bool,

    /// Wall-clock budget for the fill search, in seconds
    #[arg(long, default_value_t = 100)]
    seconds_limit: u64,

    /// Minimum allowable word score at the start of the search
    #[arg(long, default_value_t = 100)]
    min_score: i32,

    /// Percentage of each candidate list to shuffle, 0-100
    #[arg(long, default_value_t = 100)]
    entropy: i32,

    /// Cap on fill candidates per expansion [default: none]
    #[arg(long)]
    branching_factor_limit: Option<usize>,
}

struct Error(String);

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0) // Print error unquoted
    }
}

fn main() -> Result<(), Error> {
    let args = Args::parse();

    if !args.silent {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .init();
    }

    if !(0..=100).contains(&args.entropy) {
        return Err(Error("Entropy must be between 0 and 100".into()));
    }
    if !(1..=100).contains(&args.min_score) {
        return Err(Error("Minimum score must be between 1 and 100".into()));
    }

    let mut crossword = Crossword::new();
    crossword
        .load_from_puzzle_file(Path::new(&args.puzzle_path))
        .map_err(|error| Error(format!("{error}")))?;

    if let Some(dictionary) = args.dictionary {
        crossword
            .load_dictionary(Path::new(&dictionary))
            .map_err(|error| Error(format!("{error}")))?;

        if !crossword.is_valid_pattern() {
            return Err(Error(
                "Puzzle has a length-2 slot; fix the barrier pattern first".into(),
            ));
        }
        match crossword.classify(1) {
            Solvability::Solvable => {}
            other => {
                return Err(Error(format!(
                    "Puzzle can’t be filled from this dictionary: {other:?}"
                )));
            }
        }

        let outcome = crossword.autofill(&AutofillParams {
            seconds_limit: args.seconds_limit,
            score_min: args.min_score,
            entropy: args.entropy,
            branching_factor_limit: args.branching_factor_limit,
            ..AutofillParams::default()
        });

        match outcome {
            FillOutcome::Solved => {}
            FillOutcome::Exhausted => return Err(Error("Unfillable grid".into())),
            FillOutcome::Cancelled | FillOutcome::DeadlineReached => {
                return Err(Error("Ran out of time before finding a fill".into()));
            }
        }
    }

    println!("{}", crossword.repr_string());

    Ok(())
}
