//! policy-lens CLI: inventory and query policy statements across a tenancy.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use miette::Result;

use policy_lens::analyzer::{AnalyzeOptions, Analyzer};
use policy_lens::audit::{fetch_dynamic_groups, unused_dynamic_groups};
use policy_lens::cache::{BackendKind, CacheStore};
use policy_lens::collector::Progress;
use policy_lens::config::LensConfig;
use policy_lens::paths::LensPaths;
use policy_lens::query::{BucketToggles, StatementFilter, filter};
use policy_lens::report::QueryReport;
use policy_lens::source::SnapshotSource;
use policy_lens::statement::{BucketKind, ResultSet};

#[derive(Parser)]
#[command(
    name = "policy-lens",
    version,
    about = "Inventory and query access-control policy statements across a compartment tree"
)]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/policy-lens/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cache directory (defaults to $XDG_CACHE_HOME/policy-lens/).
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Cache backend: file, redb or memory.
    #[arg(long, global = true)]
    cache_backend: Option<BackendKind>,

    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect (or load from cache) and filter policy statements.
    Analyze(AnalyzeArgs),

    /// List dynamic groups that no policy statement references.
    UnusedDynamicGroups {
        #[command(flatten)]
        target: TargetArgs,

        /// Read the dynamic-group statements from the cache instead of collecting.
        #[arg(long)]
        usecache: bool,

        /// Walk every compartment below the tenancy.
        #[arg(long)]
        recurse: bool,
    },

    /// Manage the config file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Manage cached results.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Tenancy snapshot (JSON) to read from.
    #[arg(long)]
    source: Option<PathBuf>,

    /// Tenancy OCID (defaults to the snapshot's tenancy).
    #[arg(long)]
    tenancy: Option<String>,
}

#[derive(Args)]
struct AnalyzeArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Walk every compartment below the tenancy.
    #[arg(long)]
    recurse: bool,

    /// Load results from the cache; make no data source calls.
    #[arg(long)]
    usecache: bool,

    /// Collector worker threads.
    #[arg(long)]
    threads: Option<usize>,

    /// Keep statements whose subject contains this text.
    #[arg(long)]
    subjectfilter: Option<String>,

    /// Keep statements whose verb (inspect, read, use, manage) contains this text.
    #[arg(long)]
    verbfilter: Option<String>,

    /// Keep statements whose resource contains this text.
    #[arg(long)]
    resourcefilter: Option<String>,

    /// Keep statements whose location contains this text.
    #[arg(long)]
    locationfilter: Option<String>,

    /// Keep statements whose condition contains this text.
    #[arg(long)]
    conditionfilter: Option<String>,

    /// Keep statements whose policy lives under a matching compartment path.
    #[arg(long)]
    hierarchyfilter: Option<String>,

    /// Leave endorse/admit/define statements out of the output.
    #[arg(long)]
    hide_special: bool,

    /// Print every matching statement, not just the counts.
    #[arg(long)]
    list: bool,

    /// Write the filtered result as JSON.
    #[arg(long)]
    writejson: bool,

    /// JSON output path (defaults to policyoutput-{tenancy}.json).
    #[arg(long, requires = "writejson")]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration.
    Show,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Delete the cached buckets for a tenancy.
    Clear {
        /// Tenancy OCID.
        #[arg(long)]
        tenancy: String,
    },
}

/// Settings after merging CLI flags, config file and defaults.
struct Settings {
    config: LensConfig,
    config_path: Option<PathBuf>,
    cache_dir: PathBuf,
    /// Set when the config path is the XDG default rather than `--config`.
    xdg: Option<LensPaths>,
}

impl Settings {
    fn resolve(cli: &Cli) -> Result<Self> {
        let paths = LensPaths::resolve();
        let xdg = match &cli.config {
            Some(_) => None,
            None => paths.as_ref().ok().cloned(),
        };
        let config_path = cli
            .config
            .clone()
            .or_else(|| paths.as_ref().ok().map(LensPaths::config_file));
        let mut config = match &config_path {
            Some(path) => LensConfig::load_or_default(path)?,
            None => LensConfig::default(),
        };
        if let Some(kind) = cli.cache_backend {
            config.cache_backend = kind;
        }
        let cache_dir = match cli.cache_dir.clone().or_else(|| config.cache_dir.clone()) {
            Some(dir) => dir,
            None => paths?.cache_dir,
        };
        Ok(Self {
            config,
            config_path,
            cache_dir,
            xdg,
        })
    }

    fn open_cache(&self) -> Result<CacheStore> {
        Ok(CacheStore::open(self.config.cache_backend, &self.cache_dir)?)
    }
}

/// Open the snapshot (if any) and pick the tenancy to analyze.
fn open_target(
    target: &TargetArgs,
    config: &LensConfig,
) -> Result<(Option<SnapshotSource>, String)> {
    let source = match target.source.as_ref().or(config.source.as_ref()) {
        Some(path) => Some(SnapshotSource::open(path)?),
        None => None,
    };
    let tenancy = target
        .tenancy
        .clone()
        .or_else(|| config.tenancy.clone())
        .or_else(|| source.as_ref().map(|s| s.tenancy_id().to_string()));
    match tenancy {
        Some(tenancy) => Ok((source, tenancy)),
        None => miette::bail!(
            help = "pass --tenancy, set `tenancy` in the config file, or point --source at a snapshot",
            "no tenancy to analyze"
        ),
    }
}

/// Logs collection progress at every tenth of the run.
fn progress_logger() -> impl FnMut(&Progress) {
    let mut last_decile = 0;
    move |p: &Progress| {
        if p.failed {
            tracing::warn!(compartment = %p.compartment_name, "compartment skipped after retrieval failure");
        }
        let decile = p.percent() / 10;
        if decile > last_decile || p.completed == p.total {
            last_decile = decile;
            tracing::info!(
                completed = p.completed,
                total = p.total,
                "collected {}%",
                p.percent()
            );
        }
    }
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(if cli.verbose { "debug" } else { "info" })
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::resolve(&cli)?;

    match cli.command {
        Commands::Analyze(args) => run_analyze(&settings, args),

        Commands::UnusedDynamicGroups {
            target,
            usecache,
            recurse,
        } => {
            let (source, tenancy) = open_target(&target, &settings.config)?;
            let Some(source) = source else {
                miette::bail!(
                    help = "dynamic groups are listed from the data source; pass --source",
                    "no data source configured"
                );
            };
            let cache = settings.open_cache()?;
            let mut options = AnalyzeOptions::from_config(&settings.config, &tenancy);
            options.use_cache |= usecache;
            options.recursive |= recurse;
            let analysis = Analyzer::new(options, Some(&source), &cache).analyze(progress_logger())?;
            analysis.require_bucket(BucketKind::DynamicGroup)?;

            let groups = fetch_dynamic_groups(&source, &tenancy)?;
            let unused = unused_dynamic_groups(&groups, &analysis.results.dynamic_group);
            println!(
                "{} of {} dynamic groups are not referenced by any policy statement",
                unused.len(),
                groups.len()
            );
            for group in &unused {
                println!("  {}  {}", group.name, group.id);
            }
            Ok(())
        }

        Commands::Config { action } => match action {
            ConfigAction::Init { force } => {
                let Some(path) = settings.config_path.as_deref() else {
                    miette::bail!(
                        help = "pass --config <path>",
                        "cannot determine where to write the config file"
                    );
                };
                if let Some(paths) = &settings.xdg {
                    paths.ensure_dirs()?;
                }
                LensConfig::init(path, force)?;
                println!("Wrote default config to {}", path.display());
                Ok(())
            }
            ConfigAction::Show => {
                if let Some(path) = &settings.config_path {
                    println!("# {}", path.display());
                }
                println!("# cache_dir = {}", settings.cache_dir.display());
                let toml = toml::to_string_pretty(&settings.config)
                    .map_err(|e| miette::miette!("failed to render config: {e}"))?;
                print!("{toml}");
                Ok(())
            }
        },

        Commands::Cache { action } => match action {
            CacheAction::Clear { tenancy } => {
                let cache = settings.open_cache()?;
                let removed = cache.clear(&tenancy)?;
                println!("Removed {removed} cached bucket(s) for {tenancy}");
                Ok(())
            }
        },
    }
}

fn run_analyze(settings: &Settings, args: AnalyzeArgs) -> Result<()> {
    let (source, tenancy) = open_target(&args.target, &settings.config)?;
    let cache = settings.open_cache()?;

    let mut options = AnalyzeOptions::from_config(&settings.config, &tenancy);
    options.recursive |= args.recurse;
    options.use_cache |= args.usecache;
    if let Some(threads) = args.threads {
        options.workers = threads;
    }

    let analysis = Analyzer::new(options, source.as_ref(), &cache).analyze(progress_logger())?;
    if let Some(report) = &analysis.collect {
        tracing::info!(
            compartments = report.total,
            failed = report.failed,
            malformed = report.malformed,
            "collection finished"
        );
    }

    let statement_filter = StatementFilter {
        subject: args.subjectfilter,
        verb: args.verbfilter,
        resource: args.resourcefilter,
        location: args.locationfilter,
        condition: args.conditionfilter,
        hierarchy: args.hierarchyfilter,
        show: BucketToggles {
            special: !args.hide_special,
            ..BucketToggles::default()
        },
    };
    let view = filter(&analysis.results, &statement_filter);

    println!("Tenancy:  {} ({} results)", analysis.tenancy_id, analysis.mode);
    println!("Loaded:   {}", analysis.results.counts());
    println!("Filtered: {}", view.counts());
    if args.list {
        print_statements(&view);
    }

    if args.writejson {
        let path = args
            .output
            .unwrap_or_else(|| QueryReport::default_file_name(&analysis.tenancy_id));
        QueryReport::new(&analysis.tenancy_id, &statement_filter, &view).write(&path)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn print_statements(view: &ResultSet) {
    for s in &view.special {
        println!("{:<14} {}  [{}]", "special", s.statement, s.lineage.policy_name);
    }
    for kind in [BucketKind::DynamicGroup, BucketKind::Service, BucketKind::Regular] {
        for s in view.statements(kind) {
            let mut line = format!(
                "{:<14} {} | {} | {} | {}",
                kind.to_string(),
                s.subject,
                s.verb,
                s.resource,
                s.location
            );
            if !s.condition.is_empty() {
                line.push_str(&format!(" | where {}", s.condition));
            }
            println!("{line}  [{}:{}]", s.lineage.compartment_path, s.lineage.policy_name);
        }
    }
}
