//! The `gvi` binary: loads a [`gvi_config::Config`], builds the
//! requested engine's default point-robot scenario, runs it to
//! convergence or a reported [`gvi_error::GviError`], and exports
//! per-iteration snapshots as CSV,
//!
//! Mirrors `gbpplanner-rs::main`'s `anyhow::Result` + `better_panic` +
//! colored-terminal-output shape, minus the Bevy application loop this
//! workspace has no use for.

mod cli;
mod scenarios;

use clap::Parser;
use cli::{Cli, Engine};
use colored::Colorize;
use gvi_config::Config;
use gvi_error::GviError;
use gvi_optimizer::{GviOptimizer, GviOptimizerConfig};
use pgcs::{DynamicsModel, PgcsConfig, PgcsSolver};

fn main() -> anyhow::Result<()> {
    if cfg!(debug_assertions) {
        better_panic::debug_install();
    } else {
        better_panic::install();
    }

    let cli = Cli::parse();
    install_tracing(cli.verbose);

    let config = if cli.default {
        Config::default()
    } else {
        Config::read(cli.config.as_ref())?
    };

    let result = match cli.engine {
        Engine::GviGh => run_gvi_gh(&config, &cli.output_dir),
        Engine::Pgcs => run_pgcs(&config, &cli.output_dir),
    };

    match result {
        Ok(iterations) => {
            println!("{} after {} iterations", "converged".green().bold(), iterations);
            Ok(())
        }
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err.code());
            std::process::exit(1);
        }
    }
}

fn run_gvi_gh(config: &Config, output_dir: &std::path::Path) -> Result<usize, GviError> {
    let (joint, factors) = scenarios::build_gvi_gh_scenario(config);
    let optimizer_config = GviOptimizerConfig {
        step_size: config.step_size,
        backtrack_margin: config.backtrack_margin,
        max_backtrack: config.max_backtrack,
        max_iter: config.max_iter,
        stop_err: config.stop_err,
        temperature: config.temperature,
        high_temperature: config.high_temperature,
        low_temp_iterations: config.low_temp_iterations,
        gh_degree: config.gh_degree,
        max_cubature_points: config.max_cubature_points,
    };
    let mut optimizer = GviOptimizer::new(joint, factors, optimizer_config);
    let iterations = optimizer.run()?;
    optimizer.recorder().export_csv(output_dir)?;
    Ok(iterations)
}

fn run_pgcs(config: &Config, output_dir: &std::path::Path) -> Result<usize, GviError> {
    let (dynamics, start, goal) = scenarios::build_pgcs_scenario(config);
    let pgcs_config = PgcsConfig {
        eta: config.eta,
        eps: config.eps,
        total_time: config.total_time,
        stop_err: config.stop_err,
        max_iter: config.max_iter,
        pinv_tolerance: config.pinv_tolerance,
    };
    let nx = dynamics.nx();
    let nu = dynamics.nu();
    let state_cost = trajectory::Trajectory::zeros(nx, nx, config.nt);
    let mut solver = PgcsSolver::new(
        &dynamics,
        gvi_linalg::Matrix::<gvi_linalg::Float>::zeros((nx, nx)),
        gvi_linalg::Matrix::<gvi_linalg::Float>::zeros((nx, nu)),
        gvi_linalg::Vector::<gvi_linalg::Float>::zeros(nx),
        state_cost,
        start,
        goal,
        config.nt,
        pgcs_config,
    );
    let iterations = solver.run()?;
    solver.recorder().export_csv(output_dir)?;
    Ok(iterations)
}

/// Installs a `tracing_subscriber::fmt` subscriber whose verbosity comes
/// from `-v`/`-vv`/`-vvv`, falling back to `RUST_LOG` when no `-v` flag
/// is given.
fn install_tracing(verbosity: u8) {
    use tracing_subscriber::{filter::LevelFilter, EnvFilter};

    let default_level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
    .with_default_directive(default_level.into())
    .from_env_lossy();

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
