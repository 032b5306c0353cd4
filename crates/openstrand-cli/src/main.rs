//! OpenStrand command line tools.
//!
//! Inspect project files, check exported undo histories and re-save
//! projects in the current format without opening an editor.

use clap::{Parser, Subcommand};
use openstrand_core::canvas::Canvas;
use openstrand_core::error::StrandResult;
use openstrand_core::persistence;
use openstrand_core::strand::StrandKind;
use openstrand_core::undo::HistoryBundle;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "openstrand", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the layer summary of a project file
    Inspect {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,
    },
    /// Validate an exported history bundle and every state in it
    History {
        #[arg(value_name = "BUNDLE")]
        bundle: PathBuf,
    },
    /// Load a project and write it back in canonical form
    Normalize {
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        #[arg(value_name = "OUTPUT")]
        output: PathBuf,
    },
}

/// Counts and names describing one loaded canvas.
#[derive(Debug, Default, PartialEq)]
struct Summary {
    regular: usize,
    attached: usize,
    masked: usize,
    order: Vec<String>,
    sets: Vec<i32>,
    masks: Vec<(String, String)>,
    groups: Vec<(String, usize)>,
    selected: Option<String>,
}

impl Summary {
    fn of(canvas: &Canvas) -> Self {
        let mut summary = Summary::default();
        for strand in canvas.strands() {
            match strand.kind {
                StrandKind::Regular => summary.regular += 1,
                StrandKind::Attached { .. } => summary.attached += 1,
                StrandKind::Masked(_) => summary.masked += 1,
            }
        }
        let state = canvas.layer_state();
        summary.order = state.order.clone();
        summary.sets = state.colors.keys().copied().collect();
        summary.masks = state.masked_layers.iter().cloned().collect();
        summary.groups = canvas
            .groups()
            .values()
            .map(|g| (g.name.clone(), g.layers.len()))
            .collect();
        summary.selected = state.selected_strand.clone();
        summary
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} strands ({} regular, {} attached, {} masked)",
            self.order.len(),
            self.regular,
            self.attached,
            self.masked
        )?;
        writeln!(f, "sets: {:?}", self.sets)?;
        writeln!(f, "order: {}", self.order.join(", "))?;
        for (a, b) in &self.masks {
            writeln!(f, "mask: {a} x {b}")?;
        }
        for (name, count) in &self.groups {
            writeln!(f, "group: {name} ({count} layers)")?;
        }
        match &self.selected {
            Some(layer) => write!(f, "selected: {layer}"),
            None => write!(f, "selected: none"),
        }
    }
}

fn inspect(path: &Path) -> StrandResult<Summary> {
    let mut canvas = Canvas::new();
    persistence::load(&mut canvas, path)?;
    Ok(Summary::of(&canvas))
}

/// Strand count per step, after loading each state into a fresh canvas.
fn check_history(path: &Path) -> StrandResult<(HistoryBundle, Vec<(usize, usize)>)> {
    let bundle = HistoryBundle::read(path)?;
    let mut steps = Vec::with_capacity(bundle.states.len());
    for state in &bundle.states {
        let mut canvas = Canvas::new();
        persistence::apply_project(&mut canvas, &state.data)?;
        steps.push((state.step, canvas.len()));
    }
    steps.sort_unstable();
    Ok((bundle, steps))
}

fn normalize(input: &Path, output: &Path) -> StrandResult<usize> {
    let mut canvas = Canvas::new();
    persistence::load(&mut canvas, input)?;
    persistence::save(&canvas, output)?;
    Ok(canvas.len())
}

fn run(cli: Cli) -> StrandResult<()> {
    match cli.command {
        Command::Inspect { project } => {
            let summary = inspect(&project)?;
            println!("{summary}");
        }
        Command::History { bundle } => {
            let (bundle, steps) = check_history(&bundle)?;
            println!(
                "history v{}: current step {}, max step {}",
                bundle.version, bundle.current_step, bundle.max_step
            );
            for (step, count) in steps {
                println!("  step {step}: {count} strands");
            }
        }
        Command::Normalize { input, output } => {
            let count = normalize(&input, &output)?;
            println!("wrote {count} strands to {}", output.display());
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    log::debug!("{cli:?}");

    if let Err(e) = run(cli) {
        log::error!("{e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
