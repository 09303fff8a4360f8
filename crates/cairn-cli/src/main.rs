//! Cairn CLI - knowledge-graph engine

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use cairn_core::config::Config;
use cairn_core::domain::cache::{CacheWarmer, CachedGraphQueries, QueryCache, WarmupPlan};
use cairn_core::domain::graph::{GraphStore, Node, NodeQuery, NodeType, Page};
use cairn_core::domain::import::{AdapterRegistry, ImportAnalysis, ImportPipeline, ImportReport};
use cairn_core::domain::query::{DiameterOptions, GraphQueryEngine, PathStep};
use cairn_core::infrastructure::{SqliteCacheBackend, SqliteGraphRepository};
use cairn_core::storage::Database;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;

#[derive(Parser)]
#[command(name = "cairn")]
#[command(author, version, about = "Embeddable knowledge-graph engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Graph database file (overrides store.database_path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Import an external collection (e.g. an Obsidian vault)
    Import {
        /// Collection root
        path: PathBuf,
        /// Adapter to use (auto-detected when omitted)
        #[arg(short, long)]
        adapter: Option<String>,
        /// Analyze only; nothing is written
        #[arg(long)]
        dry_run: bool,
        /// Documents transformed in parallel
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Browse nodes
    Nodes {
        #[command(subcommand)]
        action: NodeAction,
    },

    /// Extract the neighbourhood of a node
    Subgraph {
        /// Seed node ID
        id: String,
        #[arg(short, long)]
        depth: Option<usize>,
        #[arg(long)]
        max_nodes: Option<usize>,
        /// Skip relationships lighter than this
        #[arg(long)]
        min_weight: Option<f64>,
    },

    /// Find a path between two nodes
    Path {
        from: String,
        to: String,
        #[arg(long)]
        max_depth: Option<usize>,
        /// Follow the heaviest edge first (depth-first) instead of the fewest hops
        #[arg(long)]
        weighted: bool,
    },

    /// Show whole-graph metrics
    Metrics,

    /// Estimate the graph diameter
    Diameter {
        /// Stop each search after this many hops
        #[arg(long)]
        max_depth: Option<usize>,
        /// Stop examining new sources after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Suggest relationships for a node
    Suggest {
        id: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Query cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum NodeAction {
    /// List nodes
    List {
        /// Node type (document, concept, folder, ...)
        #[arg(short = 't', long = "type")]
        node_type: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(short, long, default_value = "50")]
        limit: usize,
        #[arg(long, default_value = "0")]
        offset: usize,
    },
    /// Show node details
    Show { id: String },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Pre-populate popular and recent queries
    Warm {
        #[arg(long, default_value = "10")]
        popular: usize,
        #[arg(long, default_value = "10")]
        recent: usize,
    },
    /// Drop every cached entry
    Clear,
    /// Show cache statistics
    Stats,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show the configuration file path
    Path,
}

/// Everything a graph command needs, opened once per invocation
struct Graph {
    db: Database,
    store: Arc<GraphStore<SqliteGraphRepository>>,
    queries: CachedGraphQueries<SqliteGraphRepository>,
}

impl Graph {
    async fn open(db_override: Option<&Path>, config: &Config) -> anyhow::Result<Self> {
        let path = db_override
            .map(Path::to_path_buf)
            .unwrap_or_else(|| config.store.database_path());
        debug!(path = %path.display(), "Opening graph database");

        let db = Database::open(path).await?;
        let repository = Arc::new(SqliteGraphRepository::new(db.pool().clone()));
        let store = Arc::new(GraphStore::new(repository.clone()).with_options(config.store.store_options()));

        let mut cache = QueryCache::new(config.cache.cache_config());
        if config.cache.persist {
            cache = cache.with_backend(Arc::new(SqliteCacheBackend::new(db.pool().clone())));
            cache.restore().await?;
        }
        let queries = CachedGraphQueries::new(repository, cache);

        Ok(Self { db, store, queries })
    }

    fn engine(&self) -> &GraphQueryEngine<SqliteGraphRepository> {
        self.queries.engine()
    }

    async fn require_node(&self, id: &str) -> anyhow::Result<Node> {
        self.store
            .get_node(id)
            .await?
            .ok_or_else(|| cairn_core::Error::NodeNotFound(id.to_string()).into())
    }

    async fn title_of(&self, id: &str) -> String {
        match self.store.get_node(id).await {
            Ok(Some(node)) => node.title,
            _ => id.to_string(),
        }
    }

    async fn close(self) {
        self.db.close().await;
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.quiet) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(quiet: bool) -> anyhow::Result<()> {
    let level = if quiet { "cairn=warn" } else { "cairn=info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn report_error(e: &anyhow::Error) {
    match e.downcast_ref::<cairn_core::Error>() {
        Some(core) => {
            eprintln!("Error [{}]: {}", core.code(), core);
            if let Some(hint) = core.suggestion() {
                eprintln!("  Try: {}", hint);
            }
        }
        None => eprintln!("Error: {:#}", e),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    let quiet = cli.quiet;

    if let Commands::Config { action } = cli.command {
        return cmd_config(action, format, quiet);
    }

    let config = Config::load()?;
    let graph = Graph::open(cli.db.as_deref(), &config).await?;

    let result = match cli.command {
        Commands::Import {
            path,
            adapter,
            dry_run,
            concurrency,
        } => cmd_import(&graph, &config, &path, adapter.as_deref(), dry_run, concurrency, format, quiet).await,

        Commands::Nodes { action } => cmd_nodes(&graph, action, format).await,

        Commands::Subgraph {
            id,
            depth,
            max_nodes,
            min_weight,
        } => cmd_subgraph(&graph, &config, &id, depth, max_nodes, min_weight, format).await,

        Commands::Path {
            from,
            to,
            max_depth,
            weighted,
        } => cmd_path(&graph, &config, &from, &to, max_depth, weighted, format).await,

        Commands::Metrics => cmd_metrics(&graph, format).await,

        Commands::Diameter {
            max_depth,
            timeout_secs,
        } => cmd_diameter(&graph, max_depth, timeout_secs, format).await,

        Commands::Suggest { id, limit } => {
            let limit = limit.unwrap_or(config.query.suggestion_limit);
            cmd_suggest(&graph, &id, limit, format).await
        }

        Commands::Cache { action } => cmd_cache(&graph, action, format, quiet).await,

        Commands::Config { .. } => Ok(()),
    };

    graph.close().await;
    result
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Command Implementations
// ============================================================================

#[allow(clippy::too_many_arguments)]
async fn cmd_import(
    graph: &Graph,
    config: &Config,
    path: &Path,
    adapter: Option<&str>,
    dry_run: bool,
    concurrency: Option<usize>,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let mut options = config.import.import_options();
    if let Some(n) = concurrency {
        options = options.with_concurrency(n);
    }
    let pipeline = ImportPipeline::new(graph.store.clone(), AdapterRegistry::with_defaults()).with_options(options);

    if dry_run {
        let analysis = pipeline.analyze(path, adapter).await?;
        return match format {
            OutputFormat::Json => print_json(&analysis),
            OutputFormat::Text => {
                print_analysis(path, &analysis);
                Ok(())
            }
        };
    }

    let report = pipeline.import(path, adapter).await?;

    // Cached answers predate the import
    graph.queries.cache().clear().await;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text if quiet => println!("{}", report.succeeded()),
        OutputFormat::Text => print_import_report(&report),
    }
    Ok(())
}

fn print_analysis(path: &Path, analysis: &ImportAnalysis) {
    println!("Dry run: {} source at {}", analysis.source_type, path.display());
    println!();
    println!("  Documents:    {}", analysis.document_count);
    println!("  Links:        {}", analysis.link_count);
    println!("  Attachments:  {}", analysis.attachment_count);
    println!("  Tags:         {}", analysis.tag_count);
    println!("  Folders:      {}", analysis.folders.len());
    println!("  Estimated:    {} ms", analysis.estimated_duration_ms);

    if !analysis.warnings.is_empty() {
        println!();
        println!("Warnings ({}):", analysis.warnings.len());
        for warning in &analysis.warnings {
            println!("  [{}] {}: {}", warning.severity, warning.path, warning.message);
        }
    }

    for preview in &analysis.previews {
        println!();
        println!("--- {} ---", preview.path);
        println!("{}", preview.after);
    }
}

fn print_import_report(report: &ImportReport) {
    println!("Imported {} source from {}", report.source_type, report.source);
    println!();
    println!("  Documents:              {}", report.documents);
    println!("  Nodes created:          {}", report.nodes_created);
    println!("  Nodes updated:          {}", report.nodes_updated);
    println!("  Folders:                {}", report.folders_committed);
    println!("  Relationships created:  {}", report.relationships_created);
    println!("  Relationships skipped:  {}", report.relationships_skipped);
    println!("  Unresolved links:       {}", report.unresolved_links);
    println!("  Duration:               {} ms", report.duration_ms);

    if !report.warnings.is_empty() {
        println!();
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [{}] {}: {}", warning.severity, warning.path, warning.message);
        }
    }

    if !report.failures.is_empty() {
        println!();
        println!("Failures ({}):", report.failures.len());
        for failure in &report.failures {
            println!("  [{}] {}: {}", failure.stage, failure.item, failure.error);
        }
    }
}

async fn cmd_nodes(graph: &Graph, action: NodeAction, format: OutputFormat) -> anyhow::Result<()> {
    match action {
        NodeAction::List {
            node_type,
            tag,
            limit,
            offset,
        } => {
            let mut query = NodeQuery {
                tag,
                page: Page::new(limit, offset),
                ..Default::default()
            };
            if let Some(name) = node_type {
                let parsed =
                    NodeType::parse(&name).ok_or_else(|| anyhow::anyhow!("Unknown node type: {}", name))?;
                query.node_types = vec![parsed];
            }

            let nodes = graph.store.list_nodes(&query).await?;
            match format {
                OutputFormat::Json => print_json(&nodes)?,
                OutputFormat::Text => {
                    if nodes.is_empty() {
                        println!("No nodes found.");
                    }
                    for node in &nodes {
                        println!("{}  {:<10} {}", node.id, node.node_type, node.title);
                    }
                }
            }
        }
        NodeAction::Show { id } => {
            let node = graph.require_node(&id).await?;
            match format {
                OutputFormat::Json => print_json(&node)?,
                OutputFormat::Text => {
                    println!("{}", node.title);
                    println!("  ID:        {}", node.id);
                    println!("  Type:      {}", node.node_type);
                    if !node.tags.is_empty() {
                        let tags: Vec<&str> = node.tags.iter().map(String::as_str).collect();
                        println!("  Tags:      {}", tags.join(", "));
                    }
                    println!("  Created:   {}", node.created_at.to_rfc3339());
                    println!("  Modified:  {}", node.modified_at.to_rfc3339());
                    if !node.content.is_empty() {
                        println!();
                        println!("{}", node.content);
                    }
                }
            }
        }
    }
    Ok(())
}

async fn cmd_subgraph(
    graph: &Graph,
    config: &Config,
    id: &str,
    depth: Option<usize>,
    max_nodes: Option<usize>,
    min_weight: Option<f64>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut options = config.query.subgraph_options();
    if let Some(depth) = depth {
        options.depth = depth;
    }
    if let Some(max_nodes) = max_nodes {
        options.max_nodes = max_nodes;
    }
    if let Some(weight) = min_weight {
        options.weight_floor = weight;
    }

    let subgraph = graph.queries.subgraph(id, &options).await?;
    match format {
        OutputFormat::Json => print_json(&subgraph)?,
        OutputFormat::Text => {
            if subgraph.nodes.is_empty() {
                println!("No node with ID {}", id);
                return Ok(());
            }
            println!(
                "{} nodes, {} relationships{}",
                subgraph.nodes.len(),
                subgraph.relationships.len(),
                if subgraph.truncated { " (truncated)" } else { "" }
            );
            for entry in &subgraph.nodes {
                println!(
                    "  [{}] {}  {} (degree {})",
                    entry.depth, entry.node.id, entry.node.title, entry.degree
                );
            }
        }
    }
    Ok(())
}

async fn cmd_path(
    graph: &Graph,
    config: &Config,
    from: &str,
    to: &str,
    max_depth: Option<usize>,
    weighted: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let mut options = config.query.path_options(weighted);
    if let Some(depth) = max_depth {
        options.max_depth = depth;
    }

    let steps = graph.queries.find_path(from, to, &options).await?;
    match format {
        OutputFormat::Json => print_json(&steps)?,
        OutputFormat::Text => {
            if steps.is_empty() {
                println!("No path found.");
                return Ok(());
            }
            println!("Path ({} hops):", steps.len() - 1);
            for step in &steps {
                println!("  {}", describe_step(graph, step).await);
            }
        }
    }
    Ok(())
}

async fn describe_step(graph: &Graph, step: &PathStep) -> String {
    let title = graph.title_of(&step.node_id).await;
    match &step.via {
        Some(rel) => format!("-[{} {:.2}]-> {}", rel.relationship_type, rel.weight, title),
        None => title,
    }
}

async fn cmd_metrics(graph: &Graph, format: OutputFormat) -> anyhow::Result<()> {
    let metrics = graph.queries.network_metrics().await?;
    match format {
        OutputFormat::Json => print_json(&metrics)?,
        OutputFormat::Text => {
            println!("Graph Metrics");
            println!("=============");
            println!("  Nodes:           {}", metrics.node_count);
            println!("  Relationships:   {}", metrics.edge_count);
            println!("  Density:         {:.4}", metrics.density);
            println!("  Average degree:  {:.2}", metrics.average_degree);
            println!("  Max degree:      {}", metrics.max_degree);
            println!(
                "  Weight:          min {:.2} / avg {:.2} / max {:.2}",
                metrics.weights.min, metrics.weights.average, metrics.weights.max
            );

            if !metrics.relationship_types.is_empty() {
                println!();
                println!("Relationship types:");
                for (name, count) in &metrics.relationship_types {
                    println!("  {:<16} {}", name, count);
                }
            }

            if !metrics.top_nodes.is_empty() {
                println!();
                println!("Most connected:");
                for entry in &metrics.top_nodes {
                    println!("  {:>4}  {}", entry.degree, entry.title);
                }
            }
        }
    }
    Ok(())
}

async fn cmd_diameter(
    graph: &Graph,
    max_depth: Option<usize>,
    timeout_secs: Option<u64>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let options = DiameterOptions {
        max_depth,
        deadline: timeout_secs.map(Duration::from_secs),
    };

    let report = graph.engine().diameter(options).await?;
    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => {
            let bound = if report.is_lower_bound { " (lower bound)" } else { "" };
            println!("Diameter: {}{}", report.diameter, bound);
            println!("  Nodes:       {}", report.node_count);
            println!("  Components:  {}", report.components);
            println!("  Sources:     {}", report.sources_examined);
        }
    }
    Ok(())
}

async fn cmd_suggest(graph: &Graph, id: &str, limit: usize, format: OutputFormat) -> anyhow::Result<()> {
    let outcome = graph.engine().suggest_relationships(id, limit).await?;
    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Text => {
            if outcome.suggestions.is_empty() {
                println!("No suggestions ({} candidates considered).", outcome.candidates_considered);
            }
            for suggestion in &outcome.suggestions {
                println!(
                    "  {:.2}  {} {}  ({})",
                    suggestion.score, suggestion.relationship_type, suggestion.target_title, suggestion.reason
                );
            }
            for warning in &outcome.warnings {
                println!("  warning: {}", warning);
            }
        }
    }
    Ok(())
}

async fn cmd_cache(graph: &Graph, action: CacheAction, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    let cache = graph.queries.cache();
    match action {
        CacheAction::Warm { popular, recent } => {
            let plan = WarmupPlan {
                popular_limit: popular,
                recent_limit: recent,
                ..Default::default()
            };
            let report = CacheWarmer::new(graph.queries.clone()).warm(&plan).await;
            match format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Text if !quiet => {
                    println!(
                        "Warmed {} keys in {} ms ({} failed)",
                        report.warmed.len(),
                        report.duration_ms,
                        report.failures.len()
                    );
                    if !cache.is_persistent() {
                        println!("Note: cache.persist is off; entries last for this process only.");
                    }
                }
                OutputFormat::Text => {}
            }
        }
        CacheAction::Clear => {
            cache.clear().await;
            if !quiet {
                println!("Cache cleared.");
            }
        }
        CacheAction::Stats => {
            let stats = cache.stats().await;
            match format {
                OutputFormat::Json => print_json(&stats)?,
                OutputFormat::Text => {
                    println!("  Entries:      {}", stats.entries);
                    println!("  Memory:       {} bytes", stats.memory_bytes);
                    println!("  Persistent:   {}", cache.is_persistent());
                    for (prefix, op) in &stats.operations {
                        println!("  {:<12}  {} hits / {} misses", prefix, op.hits, op.misses);
                    }
                }
            }
        }
    }
    Ok(())
}

fn cmd_config(action: ConfigAction, format: OutputFormat, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            match format {
                OutputFormat::Json => print_json(&config)?,
                OutputFormat::Text => {
                    for (key, value) in config.list()? {
                        println!("{} = {}", key, value);
                    }
                }
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
