use crate::adapter::ViewState;
use crate::architecture::Architecture;
use crate::config::load_config;
use crate::ir::C4Level;
use crate::layout_dump::{layout_dump_string, write_layout_dump};
use crate::orchestrator::{LayoutCommit, LayoutOrchestrator};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "srl", version, about = "Lay out C4 architecture diagrams")]
pub struct Args {
    /// Architecture JSON file or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file for the layout dump. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// C4 level to show
    #[arg(short = 'l', long = "level", value_enum, default_value = "l1")]
    pub level: Level,

    /// Focused system id
    #[arg(long = "focus-system")]
    pub focus_system: Option<String>,

    /// Focused container id (qualified, e.g. shop.api)
    #[arg(long = "focus-container")]
    pub focus_container: Option<String>,

    /// Expand a composite node; repeatable
    #[arg(short = 'x', long = "expand")]
    pub expand: Vec<String>,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile", visible_alias = "config")]
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum Level {
    L1,
    L2,
    L3,
}

impl From<Level> for C4Level {
    fn from(level: Level) -> Self {
        match level {
            Level::L1 => C4Level::L1,
            Level::L2 => C4Level::L2,
            Level::L3 => C4Level::L3,
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing();
    let config = load_config(args.config.as_deref())?;
    let input = read_input(args.input.as_deref())?;
    let arch = Architecture::from_json(&input)?;
    let view = view_from_args(&args);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let mut orchestrator = LayoutOrchestrator::new(config);
    let report = match runtime.block_on(orchestrator.run(&arch, &view)) {
        LayoutCommit::Ready(report) => report,
        LayoutCommit::Discarded { generation } => {
            return Err(anyhow::anyhow!("layout pass {generation} was superseded"));
        }
    };

    match args.output.as_deref() {
        Some(path) => write_layout_dump(path, &report)?,
        None => println!("{}", layout_dump_string(&report)?),
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // A subscriber may already be installed when embedded.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn view_from_args(args: &Args) -> ViewState {
    let mut view = ViewState::new(args.level.into());
    if let Some(system) = &args.focus_system {
        view = view.focus_system(system.clone());
    }
    if let Some(container) = &args.focus_container {
        view = view.focus_container(container.clone());
    }
    for id in &args.expand {
        view = view.expand(id.clone());
    }
    view
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return Ok(std::fs::read_to_string(path)?);
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
