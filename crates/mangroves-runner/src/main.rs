use clap::{Args, Parser, Subcommand};
use mangroves_grid::TileIndex;
use mangroves_runner::run_task::finish;
use mangroves_runner::tasks::{parse_regions, parse_years, plan_tasks, TaskQuery};
use mangroves_runner::{
    clip_gmw, load_gmw_index, open_store, run_task, ClusterSettings, Config, Result, RunTaskArgs,
    RunnerError, StacItemSource,
};
use mangroves_stac::StacClient;
use mangroves_vector::{load_layer, SourceFetcher};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mangroves")]
#[command(about = "Mangrove extent classification over the Pacific grid")]
struct Cli {
    /// YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reproject GMW polygons and clip them to grid cells
    ClipGmw {
        /// GMW polygons (defaults to the config's gmw_raw_source)
        #[arg(long)]
        gmw: Option<String>,

        /// Grid cells (defaults to the config's grid_source)
        #[arg(long)]
        grid: Option<String>,

        /// Output GeoJSON (defaults to the config's gmw_source)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print pending tasks as JSON
    PrintTasks(PrintTasksArgs),
    /// Classify one tile
    RunTask(RunTaskCli),
}

#[derive(Args)]
struct PrintTasksArgs {
    /// `YYYY` or `YYYY-YYYY`
    #[arg(long)]
    years: String,

    #[arg(long)]
    version: String,

    /// `ALL` or comma-separated country codes
    #[arg(long, default_value = "ALL")]
    regions: String,

    #[arg(long)]
    limit: Option<usize>,

    #[arg(long)]
    output_bucket: Option<String>,

    #[arg(long)]
    output_prefix: Option<String>,

    /// List tasks even when their outputs exist
    #[arg(long)]
    overwrite: bool,
}

#[derive(Args)]
struct RunTaskCli {
    /// Tile id as `x,y`
    #[arg(long)]
    tile_id: Option<String>,

    #[arg(long, requires = "region_index", conflicts_with = "tile_id")]
    region_code: Option<String>,

    #[arg(long, requires = "region_code")]
    region_index: Option<String>,

    #[arg(long)]
    datetime: String,

    #[arg(long)]
    version: String,

    #[arg(long)]
    output_bucket: Option<String>,

    #[arg(long)]
    output_prefix: Option<String>,

    #[arg(long, default_value = "s2")]
    base_product: String,

    #[arg(long, default_value = "50GB")]
    memory_limit: String,

    #[arg(long, default_value_t = 2)]
    n_workers: usize,

    #[arg(long, default_value_t = 32)]
    threads_per_worker: usize,

    /// JSON object overriding the cluster settings
    #[arg(long)]
    local_cluster_kwargs: Option<String>,

    #[arg(long, default_value_t = 10000.0)]
    scale: f32,

    #[arg(long, default_value_t = 0.0)]
    offset: f32,

    /// Process at 1/10th resolution
    #[arg(long)]
    decimated: bool,

    #[arg(long)]
    overwrite: bool,

    /// Append the result to the dataset's CSV run log
    #[arg(long)]
    run_log: bool,
}

impl RunTaskCli {
    fn tile(&self) -> Result<TileIndex> {
        match (&self.tile_id, &self.region_code, &self.region_index) {
            (Some(id), _, _) => Ok(id.parse()?),
            (None, Some(code), Some(index)) => Ok(TileIndex::from_region(code, index)?),
            _ => Err(RunnerError::MissingTileId),
        }
    }

    fn cluster(&self) -> Result<ClusterSettings> {
        let settings = ClusterSettings {
            n_workers: self.n_workers,
            threads_per_worker: self.threads_per_worker,
            memory_limit: self.memory_limit.clone(),
        };
        match &self.local_cluster_kwargs {
            Some(json) => settings.apply_json(json),
            None => Ok(settings),
        }
    }

    fn to_args(&self, config: &Config) -> Result<RunTaskArgs> {
        Ok(RunTaskArgs {
            tile: self.tile()?,
            datetime: self.datetime.clone(),
            version: self.version.clone(),
            output_prefix: self.output_prefix.clone(),
            base_product: self.base_product.clone(),
            region: config.region.clone(),
            scale: self.scale,
            offset: self.offset,
            decimated: self.decimated,
            overwrite: self.overwrite,
            cluster: self.cluster()?,
        })
    }
}

/// Logs go to stderr so `print-tasks` output on stdout stays clean JSON.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| {
            "mangroves=info,mangroves_runner=info,mangroves_raster=info,mangroves_stac=info,\
             mangroves_store=info,mangroves_vector=info"
                .into()
        }),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn clip(config: &Config, gmw: Option<String>, grid: Option<String>, output: Option<PathBuf>) -> Result<()> {
    let fetcher = SourceFetcher::new(&config.cache_dir)?;
    let gmw = gmw.unwrap_or_else(|| config.gmw_raw_source.clone());
    let grid = grid.unwrap_or_else(|| config.grid_source.clone());
    let output = output.unwrap_or_else(|| PathBuf::from(&config.gmw_source));
    clip_gmw(&fetcher, &gmw, &grid, &output)?;
    Ok(())
}

fn print_tasks(config: &Config, args: PrintTasksArgs) -> Result<()> {
    let query = TaskQuery {
        years: parse_years(&args.years)?,
        version: args.version,
        regions: parse_regions(&args.regions),
        limit: args.limit,
        output_prefix: args.output_prefix,
        overwrite: args.overwrite,
    };

    let fetcher = SourceFetcher::new(&config.cache_dir)?;
    let gmw = load_gmw_index(&fetcher, config)?;
    let countries = load_layer(&fetcher, &config.countries_source)?;
    let store = open_store(args.output_bucket.as_deref(), config)?;

    let tasks = plan_tasks(&query, &gmw, &countries, store.as_deref())?;
    println!("{}", serde_json::to_string(&tasks)?);
    Ok(())
}

fn execute_task(config: &Config, cli: &RunTaskCli) -> Result<i32> {
    let args = cli.to_args(config)?;
    let store = open_store(cli.output_bucket.as_deref(), config)?.ok_or(RunnerError::NoOutputStore)?;
    let fetcher = SourceFetcher::new(&config.cache_dir)?;
    let gmw = load_gmw_index(&fetcher, config)?;
    let source = StacItemSource::new(
        StacClient::new(&config.catalog)?,
        &config.collection,
        SourceFetcher::new(config.cache_dir.join("assets"))?,
        &config.region,
    );

    let result = run_task(&args, &gmw, store.as_ref(), &source);
    Ok(finish(&args, &result, Some(store.as_ref()), cli.run_log))
}

fn run(cli: Cli) -> Result<i32> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::ClipGmw { gmw, grid, output } => clip(&config, gmw, grid, output).map(|_| 0),
        Commands::PrintTasks(args) => print_tasks(&config, args).map(|_| 0),
        Commands::RunTask(args) => execute_task(&config, &args),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
