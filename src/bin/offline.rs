//! Headless CLI entry point (spec.md §6). Mirrors
//! `original_source/offline.cpp`'s `init → run → done` shell, trading its
//! hand-rolled argv walk for `clap`'s derive parser (grounded on
//! `other_examples/a-samea-vicseksim-rs`, which has no teacher analogue
//! since the teacher builds a `cdylib`, not a binary).

use anyhow::Context;
use clap::Parser;
use tissuesim_core::nns::NnsChoice;
use tissuesim_core::step::DEFAULT_STEP_BUDGET;
use tissuesim_core::{pattern, setup_logging, Engine};

#[derive(Parser, Debug)]
#[command(name = "offline", about = "Run a tissue simulation pattern headlessly")]
struct Cli {
    /// Force use of spatial sorting.
    #[arg(long = "ss", conflicts_with = "kd")]
    ss: bool,

    /// Force use of the k-d tree.
    #[arg(long = "kd", conflicts_with = "ss")]
    kd: bool,

    /// Pattern file to load.
    pattern: String,
}

fn main() -> anyhow::Result<()> {
    setup_logging(None);

    // `Cli::parse()` would exit 2 on a bad invocation via clap's default
    // handler; spec.md requires exit 1 for argument errors, matching
    // `original_source/offline.cpp`'s own `exit(1)` on bad argv.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    let nns_choice = if cli.ss {
        NnsChoice::SpatialSorting
    } else if cli.kd {
        NnsChoice::KdTree
    } else {
        NnsChoice::Auto
    };

    let sim = pattern::load_pattern(&cli.pattern)
        .with_context(|| format!("loading pattern '{}'", cli.pattern))?;

    let stop_at = sim.stop_at;
    let detect_stability = sim.detect_stability;
    let mut engine = Engine::init(sim, nns_choice, detect_stability);

    let steps = stop_at.unwrap_or(DEFAULT_STEP_BUDGET);
    engine.run(steps);

    Ok(())
}
