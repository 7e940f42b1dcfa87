//! boardmatch CLI - locate component footprints on rasterised PCB layers.

use anyhow::Context;
use boardmatch::{
    io, BoardInput, BoardState, ComponentMatch, Intervention, MatchOptions, MatchSession, MissingPin, Side,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "boardmatch")]
#[command(about = "Footprint matching on rasterised PCB layers", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find every placement of the footprint on the board
    Match {
        #[command(flatten)]
        board: BoardArgs,

        #[command(flatten)]
        footprint: FootprintArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Also report near-misses with their solder points or trace cuts
        #[arg(long)]
        interventions: bool,
    },

    /// Find placements with a pin on a given pad
    Pad {
        #[command(flatten)]
        board: BoardArgs,

        #[command(flatten)]
        footprint: FootprintArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Board side of the pad
        #[arg(long, value_enum, default_value = "front")]
        side: SideArg,

        /// Pad id
        #[arg(long)]
        pad: usize,

        /// Restrict to these pin labels (repeatable)
        #[arg(id = "pin", long = "pin")]
        pins: Vec<String>,
    },

    /// Find placements with a pin on a given net
    Net {
        #[command(flatten)]
        board: BoardArgs,

        #[command(flatten)]
        footprint: FootprintArgs,

        #[command(flatten)]
        output: OutputArgs,

        /// Net id
        #[arg(long)]
        net: usize,

        /// Restrict to these pin labels (repeatable)
        #[arg(id = "pin", long = "pin")]
        pins: Vec<String>,
    },

    /// Print the board connectivity model
    Nets {
        #[command(flatten)]
        board: BoardArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
}

#[derive(Args)]
struct BoardArgs {
    /// Front solder-mask raster (pads dark)
    #[arg(long, value_name = "FILE")]
    front_mask: PathBuf,

    /// Front copper raster (copper dark)
    #[arg(long, value_name = "FILE")]
    front_traces: PathBuf,

    /// Back solder-mask raster
    #[arg(long, value_name = "FILE", requires = "back_traces")]
    back_mask: Option<PathBuf>,

    /// Back copper raster
    #[arg(long, value_name = "FILE", requires = "back_mask")]
    back_traces: Option<PathBuf>,

    /// Drill holes as JSON
    #[arg(long, value_name = "FILE", requires = "bounds")]
    drill: Option<PathBuf>,

    /// Board bounds as JSON
    #[arg(long, value_name = "FILE")]
    bounds: Option<PathBuf>,

    /// Match options as JSON
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct FootprintArgs {
    /// Footprint raster (pads dark)
    #[arg(long, value_name = "FILE")]
    footprint: PathBuf,

    /// Pin table as JSON; pads are numbered when omitted
    #[arg(long, value_name = "FILE")]
    pins: Option<PathBuf>,

    /// Pixels per millimetre of the footprint raster
    #[arg(long)]
    px_per_mm: Option<f64>,

    /// Directory searched for inputs that do not exist
    #[arg(long, value_name = "DIR")]
    library: Option<PathBuf>,
}

#[derive(Args)]
struct OutputArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    format: OutputFormat,

    /// Save matches as JSON
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Draw matches over the front mask as PNG
    #[arg(long, value_name = "FILE")]
    render: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum SideArg {
    Front,
    Back,
}

impl From<SideArg> for Side {
    fn from(s: SideArg) -> Side {
        match s {
            SideArg::Front => Side::Front,
            SideArg::Back => Side::Back,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands) -> anyhow::Result<i32> {
    match command {
        Commands::Match {
            board,
            footprint,
            output,
            interventions,
        } => {
            let session = open_session(&board, &footprint)?;
            let matches = if interventions {
                session.get_matches_with_interventions()
            } else {
                session.get_matches()
            };
            emit(&session, &matches, &output)
        }
        Commands::Pad {
            board,
            footprint,
            output,
            side,
            pad,
            pins,
        } => {
            let session = open_session(&board, &footprint)?;
            let side = Side::from(side);
            let known = session.board().pads(side).map(|p| p.len()).unwrap_or(0);
            if pad >= known {
                anyhow::bail!("{} side has {} pads; pad {} does not exist", side, known, pad);
            }
            let matches = session.matches_on_pad(side, pad, &pins);
            emit(&session, &matches, &output)
        }
        Commands::Net {
            board,
            footprint,
            output,
            net,
            pins,
        } => {
            let session = open_session(&board, &footprint)?;
            if session.board().nets().get(net).is_none() {
                anyhow::bail!("net {} does not exist ({} nets)", net, session.board().nets().len());
            }
            let matches = session.matches_on_net(net, &pins);
            emit(&session, &matches, &output)
        }
        Commands::Nets { board, format } => {
            let options = load_options(&board, None)?;
            let state = BoardState::ingest(load_board(&board, &options)?)?;
            print_nets(&state, format)?;
            Ok(0)
        }
    }
}

fn load_options(board: &BoardArgs, footprint: Option<&FootprintArgs>) -> anyhow::Result<MatchOptions> {
    let mut options = match &board.config {
        Some(path) => MatchOptions::from_json_file(path)
            .with_context(|| format!("loading options from {}", path.display()))?,
        None => MatchOptions::default(),
    };
    if let Some(fp) = footprint {
        if let Some(px) = fp.px_per_mm {
            options.px_per_mm = px;
        }
        if let Some(library) = &fp.library {
            options.footprint_library = Some(library.clone());
        }
    }
    options.validate()?;
    Ok(options)
}

fn load_board(board: &BoardArgs, options: &MatchOptions) -> anyhow::Result<BoardInput> {
    let library = options.footprint_library.as_deref();
    let mut input = BoardInput::single_sided(
        io::load_mask(&board.front_mask, library)?,
        io::load_mask(&board.front_traces, library)?,
    );
    if let (Some(mask), Some(traces)) = (&board.back_mask, &board.back_traces) {
        input.back_mask = Some(io::load_mask(mask, library)?);
        input.back_traces = Some(io::load_mask(traces, library)?);
    }
    if let Some(bounds) = &board.bounds {
        input.bounds = Some(io::load_board_bounds(bounds)?);
    }
    if let Some(drill) = &board.drill {
        input.drills = io::load_drill_holes(drill)?;
    }
    Ok(input)
}

fn open_session(board: &BoardArgs, footprint: &FootprintArgs) -> anyhow::Result<MatchSession> {
    let options = load_options(board, Some(footprint))?;
    let input = load_board(board, &options)?;
    let raster = io::load_footprint_raster(&footprint.footprint, options.footprint_library.as_deref())?;
    let pins = match &footprint.pins {
        Some(path) => io::load_pin_table(path)?,
        None => Vec::new(),
    };
    Ok(MatchSession::from_input(input, &raster, pins, options)?)
}

fn emit(session: &MatchSession, matches: &[ComponentMatch], output: &OutputArgs) -> anyhow::Result<i32> {
    match output.format {
        OutputFormat::Human => print_human(matches),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(matches)?),
    }
    if let Some(path) = &output.output {
        io::save_matches(path, matches)?;
    }
    if let Some(path) = &output.render {
        io::save_render(path, &session.board().current().front.mask, matches)?;
    }
    Ok(0)
}

fn join<T: ToString>(items: &[T]) -> String {
    items.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(", ")
}

fn print_human(matches: &[ComponentMatch]) {
    if matches.is_empty() {
        println!("No matches found");
        return;
    }
    for (i, m) in matches.iter().enumerate() {
        let kind = if m.incomplete { " (near-miss)" } else { "" };
        println!(
            "#{} {} side at ({}, {}), {} deg, score {:.3}{}",
            i + 1,
            m.side,
            m.coordinates.x,
            m.coordinates.y,
            m.orientation,
            m.score,
            kind
        );
        for (pin, pads) in &m.pin_to_pads {
            println!("  pin {}: pads [{}] nets [{}]", pin, join(pads), join(m.nets_of_pin(pin)));
        }
        for (pin, missing) in &m.pins_missing {
            match missing {
                MissingPin::Touched {
                    touched_pads,
                    touched_traces,
                } => println!(
                    "  pin {} missing: touches pads [{}] on nets [{}]",
                    pin,
                    join(touched_pads),
                    join(touched_traces)
                ),
                MissingPin::SolderPoint { .. } => println!("  pin {} missing: nothing to solder to", pin),
            }
        }
        for intervention in &m.interventions {
            match intervention {
                Intervention::AddSolderPoint { pin, contour } => {
                    let r = contour.bounding_rect();
                    println!("  add solder point for pin {} at ({}, {}) {}x{}", pin, r.x, r.y, r.width, r.height);
                }
                Intervention::CutTrace { pin, side, start, end, .. } => println!(
                    "  cut {} trace for pin {} from ({}, {}) to ({}, {})",
                    side, pin, start.x, start.y, end.x, end.y
                ),
            }
        }
    }
    println!("\n{} matches", matches.len());
}

fn print_nets(state: &BoardState, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state.nets)?),
        OutputFormat::Human => {
            for net in state.nets.iter() {
                println!(
                    "net {}: front pads [{}] back pads [{}] holes {}",
                    net.id,
                    join(&net.front_pads),
                    join(&net.back_pads),
                    net.holes.len()
                );
            }
            println!("\n{} nets", state.nets.len());
        }
    }
    Ok(())
}
