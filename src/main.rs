//! Command line front end for the route planner.

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use log::info;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use route_planner::cluster::ClusterMethod;
use route_planner::config::Config;
use route_planner::problem::{load_points, Point};
use route_planner::store::Store;
use route_planner::task::TaskCache;
use route_planner::utils::{format_duration, print_plan_visualization, save_plan};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "route-planner", version, about = "Plans daily courier routes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate uniformly random points
    Generate(GenerateArgs),
    /// Plan one route over a point file
    Plan(PlanArgs),
    /// Assign today's route to a courier in a store snapshot
    Assign(AssignArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// Number of points
    #[arg(long)]
    count: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Coordinates are drawn from [0, range)
    #[arg(long, default_value_t = 10000.0)]
    range: f64,
    /// JSON output file; stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct PlanArgs {
    /// Point file, JSON or `id x y` lines
    #[arg(long)]
    input: PathBuf,
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    clusters: Option<usize>,
    /// Point count from which the input is clustered
    #[arg(long)]
    threshold: Option<usize>,
    /// Heuristic budget in seconds
    #[arg(long)]
    time_limit: Option<f64>,
    #[arg(long)]
    method: Option<ClusterMethod>,
    /// Report file; `.json` writes the plan as JSON
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long)]
    visualize: bool,
}

#[derive(Args)]
struct AssignArgs {
    /// Store snapshot, updated in place
    #[arg(long)]
    store: PathBuf,
    #[arg(long)]
    courier: String,
    /// Day to assign, YYYY-MM-DD; today when omitted
    #[arg(long)]
    date: Option<NaiveDate>,
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Generate(args) => generate(args),
        Command::Plan(args) => plan(args),
        Command::Assign(args) => assign(args),
    }
}

fn generate(args: GenerateArgs) -> Result<(), Box<dyn Error>> {
    if !(args.range.is_finite() && args.range > 0.0) {
        return Err(format!("range must be a positive number, got {}", args.range).into());
    }

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let points: Vec<Point> = (0..args.count)
        .map(|i| {
            Point::new(
                format!("P{}", i),
                rng.gen_range(0.0..args.range),
                rng.gen_range(0.0..args.range),
            )
        })
        .collect();

    match args.output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(&path)?);
            serde_json::to_writer_pretty(&mut writer, &points)?;
            writer.flush()?;
            info!("wrote {} points to {}", points.len(), path.display());
        }
        None => {
            let stdout = io::stdout();
            serde_json::to_writer_pretty(stdout.lock(), &points)?;
            println!();
        }
    }
    Ok(())
}

fn plan(args: PlanArgs) -> Result<(), Box<dyn Error>> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(k) = args.clusters {
        config = config.with_cluster_count(k);
    }
    if let Some(threshold) = args.threshold {
        config = config.with_direct_threshold(threshold);
    }
    if let Some(seconds) = args.time_limit {
        config = config.with_time_limit(Duration::try_from_secs_f64(seconds)?);
    }
    if let Some(method) = args.method {
        config = config.with_cluster_method(method);
    }

    let points = load_points(&args.input)?;
    info!("loaded {} points from {}", points.len(), args.input.display());

    let start_time = Instant::now();
    let plan = route_planner::plan_route(&points, &config)?;
    println!("Planned in {}", format_duration(start_time.elapsed()));
    println!("{:?}", plan);

    if let Some(path) = args.output {
        if path.extension().map_or(false, |ext| ext == "json") {
            let mut writer = BufWriter::new(File::create(&path)?);
            serde_json::to_writer_pretty(&mut writer, &plan)?;
            writer.flush()?;
        } else {
            save_plan(&plan, &path)?;
        }
        info!("saved plan to {}", path.display());
    }

    if args.visualize {
        print_plan_visualization(&plan, &points);
    }
    Ok(())
}

fn assign(args: AssignArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(args.config.as_deref())?;
    let store = Store::load(&args.store)?.with_lock_timeout(config.lock_timeout);
    let cache = TaskCache::new();
    let today = args.date.unwrap_or_else(|| Utc::now().date_naive());

    let record = route_planner::assign_daily_task(&cache, &store, &args.courier, today, &config)?;
    store.flush(&args.store)?;

    serde_json::to_writer_pretty(io::stdout().lock(), record.as_ref())?;
    println!();
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn Error>> {
    match path {
        Some(path) => Ok(Config::from_file(path)?),
        None => Ok(Config::default()),
    }
}
