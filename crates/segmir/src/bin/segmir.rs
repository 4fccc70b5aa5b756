use std::error::Error;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use segmir::offline::{
    fit_measurements, lengths_for_pose, load_measurements, nominal_measurements, solve_panel,
    write_measurements, MeasuredPanel,
};
use segmir::{ControlParams, FrameEngine, MirrorGeometry, MirrorKind, PanelPosition, Pose};

/// Offline kinematics and pose fitting for segmented mirrors.
#[derive(Debug, Parser)]
#[command(author, version, about = "Segmented mirror kinematics and pose fitting")]
struct Args {
    /// Built-in mirror geometry to use.
    #[arg(long, value_enum, default_value_t = MirrorArg::Primary, global = true)]
    mirror: MirrorArg,

    /// JSON mirror geometry; overrides `--mirror`.
    #[arg(long, global = true)]
    geometry: Option<PathBuf>,

    /// JSON controller parameters. Defaults are used if omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit structured JSON logs (feature `tracing`).
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MirrorArg {
    Primary,
    Secondary,
    TestStand,
}

impl From<MirrorArg> for MirrorKind {
    fn from(arg: MirrorArg) -> Self {
        match arg {
            MirrorArg::Primary => MirrorKind::Primary,
            MirrorArg::Secondary => MirrorKind::Secondary,
            MirrorArg::TestStand => MirrorKind::TestStand,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the mirror geometry as JSON, or write it to a file.
    Geometry {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Write nominal actuator lengths for every panel as a measurement file.
    Template {
        #[arg(long)]
        out: PathBuf,
    },
    /// Forward kinematics of one panel from its six actuator lengths.
    Solve {
        #[arg(long)]
        position: u32,
        #[arg(long, value_delimiter = ',')]
        lengths: Vec<f64>,
    },
    /// Actuator lengths that move one panel away from its nominal pose.
    Lengths {
        #[arg(long)]
        position: u32,
        /// `x,y,z,rot_x,rot_y,rot_z` offset in mm and radians.
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        offset: Vec<f64>,
    },
    /// Fit the global mirror pose to a measurement file.
    Fit {
        #[arg(long)]
        measurements: PathBuf,
    },
    /// Response of one panel's pose to unit motions of another.
    Influence {
        #[arg(long)]
        source: u32,
        #[arg(long)]
        target: u32,
    },
}

fn six(values: &[f64]) -> Result<[f64; 6], Box<dyn Error>> {
    <[f64; 6]>::try_from(values).map_err(|_| format!("expected 6 values, got {}", values.len()).into())
}

fn load_geometry(args: &Args) -> Result<MirrorGeometry, Box<dyn Error>> {
    Ok(match &args.geometry {
        Some(path) => MirrorGeometry::load_json(path)?,
        None => MirrorGeometry::built_in(args.mirror.into())?,
    })
}

fn load_config(path: Option<&Path>) -> Result<ControlParams, Box<dyn Error>> {
    Ok(match path {
        Some(path) => ControlParams::load_json(path)?,
        None => ControlParams::default(),
    })
}

fn run(args: &Args) -> Result<String, Box<dyn Error>> {
    let geometry = load_geometry(args)?;
    let config = load_config(args.config.as_deref())?;
    let engine = FrameEngine::new(&geometry, &config.solver)?;

    let json = match &args.command {
        Command::Geometry { out: Some(path) } => {
            geometry.write_json(path)?;
            format!("\"{}\"", path.display())
        }
        Command::Geometry { out: None } => serde_json::to_string_pretty(&geometry)?,
        Command::Template { out } => {
            let panels = nominal_measurements(&engine)?;
            write_measurements(out, &panels)?;
            panels.len().to_string()
        }
        Command::Solve { position, lengths } => {
            let panel = MeasuredPanel {
                position: PanelPosition::new(*position)?,
                lengths: six(lengths)?,
            };
            serde_json::to_string_pretty(&solve_panel(&engine, &panel)?)?
        }
        Command::Lengths { position, offset } => {
            let position = PanelPosition::new(*position)?;
            let nominal = engine.platform(position)?.nominal_solution()?.pose;
            let pose = nominal + Pose::from_array(six(offset)?);
            serde_json::to_string_pretty(&lengths_for_pose(&engine, position, &pose)?)?
        }
        Command::Fit { measurements } => {
            let panels = load_measurements(measurements)?;
            serde_json::to_string_pretty(&fit_measurements(&engine, &panels, &config.fit)?)?
        }
        Command::Influence { source, target } => {
            let m = segmir::core::influence_matrix(
                &engine,
                PanelPosition::new(*source)?,
                PanelPosition::new(*target)?,
            )?;
            let rows: Vec<Vec<f64>> = m.row_iter().map(|r| r.iter().copied().collect()).collect();
            serde_json::to_string_pretty(&rows)?
        }
    };
    Ok(json)
}

fn init_logging(json: bool) {
    #[cfg(feature = "tracing")]
    segmir::core::init_tracing(json);
    #[cfg(not(feature = "tracing"))]
    {
        let _ = json;
        let _ = segmir::core::init_from_env(log::LevelFilter::Warn);
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.json_logs);
    match run(&args) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}
