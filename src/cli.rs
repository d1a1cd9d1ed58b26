use crate::config::{Config, load_config};
use crate::connect::{ConnectOptions, connect, reroute_all};
use crate::geometry::Point;
use crate::graph::GraphState;
use crate::model::{ConnectionDirection, ConnectionType, GraphData};
use crate::persistence::{Persistence, read_document, write_document};
use crate::render::{render_svg, write_output_svg};
use crate::routing::{Obstacle, calculate_route};
use crate::storage::{FileStore, MemoryStore};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "wirepath", version, about = "Obstacle-avoiding connection routing for node-and-pin diagrams")]
pub struct Args {
    /// Config file (JSON5)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the saved graph. Overrides the config file.
    #[arg(long = "store", global = true)]
    pub store: Option<PathBuf>,

    /// Log load and save decisions to stderr
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Route a single connection and print the path as JSON
    Route {
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        from: Point,
        #[arg(long, value_parser = parse_point, allow_hyphen_values = true)]
        to: Point,
        /// JSON array of {id, x, y, width, height}
        #[arg(long)]
        obstacles: Option<PathBuf>,
        #[arg(long)]
        margin: Option<f64>,
    },
    /// Connect two pins, written as nodeId.pinName
    Connect {
        from: String,
        to: String,
        #[arg(long, value_enum)]
        direction: Option<ConnectionDirection>,
        #[arg(long, value_enum)]
        kind: Option<ConnectionType>,
        #[arg(long)]
        label: Option<String>,
    },
    /// Recompute every connection's route
    Reroute,
    /// Render the saved graph
    Render {
        /// Output file. Defaults to stdout for SVG.
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
        #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
        output_format: OutputFormat,
    },
    /// Drop connections whose pins no longer exist
    Validate,
    /// Forget the saved graph and start from the built-in diagram
    Reset,
    /// Write the saved graph to a document file
    Export {
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
    },
    /// Replace the saved graph with a document file
    Import { input: PathBuf },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Png,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    crate::logging::init(args.verbose);
    let mut config = load_config(args.config.as_deref())?;
    if let Some(store) = args.store {
        config.storage.local_dir = store;
    }

    match args.command {
        Command::Route {
            from,
            to,
            obstacles,
            margin,
        } => {
            let obstacles = match obstacles {
                Some(path) => read_obstacles(&path)?,
                None => Vec::new(),
            };
            let margin = route_margin(margin, &config);
            let route = calculate_route(from, to, &obstacles, margin);
            println!("{}", serde_json::to_string_pretty(&route)?);
        }
        Command::Connect {
            from,
            to,
            direction,
            kind,
            label,
        } => {
            let mut state = open_state(&config);
            let options = ConnectOptions {
                direction: direction.unwrap_or_default(),
                kind: kind.unwrap_or_default(),
                label,
                margin: config.routing.margin,
            };
            let id = connect(&mut state, &from, &to, options)?;
            println!("{id}");
        }
        Command::Reroute => {
            let mut state = open_state(&config);
            let routed = reroute_all(&mut state, config.routing.margin);
            println!("{routed} of {} connections routed", state.edges().len());
        }
        Command::Render {
            output,
            output_format,
        } => {
            let state = open_state(&config);
            let svg = render_svg(state.nodes(), state.edges(), &config.theme, &config.render);
            match output_format {
                OutputFormat::Svg => write_output_svg(&svg, output.as_deref())?,
                OutputFormat::Png => {
                    let output = ensure_output(&output, "png")?;
                    write_png(&svg, &output, &config)?;
                }
            }
        }
        Command::Validate => {
            let mut state = open_state(&config);
            let report = state.validate_connection_integrity();
            println!(
                "{} connections, {} valid, {} removed",
                report.total, report.valid, report.removed
            );
        }
        Command::Reset => {
            let mut state = open_state(&config);
            state.reset_to_defaults();
            println!("reset to built-in diagram ({} nodes)", state.nodes().len());
        }
        Command::Export { output } => {
            let state = open_state(&config);
            let data = GraphData::new("Exported Graph", None, state.nodes(), state.edges());
            write_document(&output, &data)?;
        }
        Command::Import { input } => {
            let (nodes, edges) = read_document(&input)?.into_parts();
            let mut state = open_state(&config);
            state.replace_graph(nodes, edges);
            println!(
                "imported {} nodes and {} connections",
                state.nodes().len(),
                state.edges().len()
            );
        }
    }
    Ok(())
}

/// Each CLI run is its own session, so only the file store outlives it.
fn open_state(config: &Config) -> GraphState {
    let mut persistence = Persistence::new(
        Box::new(MemoryStore::new()),
        Box::new(FileStore::new(&config.storage.local_dir)),
    );
    if let Some(path) = &config.storage.default_file {
        persistence = persistence.with_default_file(path);
    }
    GraphState::open(persistence)
}

/// Negative margins are clamped to zero, as in the config file.
fn route_margin(margin: Option<f64>, config: &Config) -> f64 {
    margin.map_or(config.routing.margin, |value| value.max(0.0))
}

fn read_obstacles(path: &Path) -> Result<Vec<Obstacle>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading obstacles from {}", path.display()))?;
    Ok(serde_json::from_str(&contents)?)
}

fn parse_point(value: &str) -> Result<Point, String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got `{value}`"))?;
    let coord = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|err| format!("invalid coordinate `{s}`: {err}"))
    };
    Ok(Point::new(coord(x)?, coord(y)?))
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

#[cfg(feature = "png")]
fn write_png(svg: &str, output: &Path, config: &Config) -> Result<()> {
    crate::render::write_output_png(svg, output, &config.render)
}

#[cfg(not(feature = "png"))]
fn write_png(_svg: &str, _output: &Path, _config: &Config) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}
