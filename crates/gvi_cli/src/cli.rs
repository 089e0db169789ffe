//! Command-line argument parsing, in the idiom of
//! `gbpplanner-rs::cli::Cli`.

use clap::Parser;

/// Which engine to run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
pub enum Engine {
    /// Gaussian Variational Inference via Gauss-Hermite cubature
    ///.
    GviGh,
    /// Proximal-gradient covariance steering.
    Pgcs,
}

/// Flags and arguments accepted by the `gvi` binary. Use
/// [`Cli::parse`][clap::Parser::parse] to read them from
/// `std::env::args`.
#[derive(Debug, Parser)]
#[clap(version, author, about)]
pub struct Cli {
    /// Specify the configuration file to use, overrides the normal
    /// configuration file resolution.
    #[arg(short, long, value_name = "CONFIG_FILE")]
    pub config: Option<std::path::PathBuf>,

    /// Which engine to run.
    #[arg(long, value_enum, default_value = "gvi-gh")]
    pub engine: Engine,

    /// Directory results are exported to.
    #[arg(short, long, value_name = "DIR", default_value = "results")]
    pub output_dir: std::path::PathBuf,

    /// Use the built-in default configuration instead of reading a
    /// config file.
    #[arg(long)]
    pub default: bool,

    /// Increase log verbosity; repeatable (`-v`, `-vv`, `-vvv`).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
