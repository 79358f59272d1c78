use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "promshare",
    about = "promshare: metrics shared across processes, rendered for Prometheus",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to promshare.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use this redb file in shared mode, overriding [store] from the config
    #[arg(short, long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Increment a counter
    Inc {
        namespace: String,
        name: String,
        /// Amount to add (must be non-negative)
        #[arg(long, default_value = "1")]
        by: f64,
        /// Help text; defaults to the published one
        #[arg(long)]
        help_text: Option<String>,
        /// Label as name=value; repeat for several, order is significant
        #[arg(short, long = "label")]
        labels: Vec<String>,
    },
    /// Set or adjust a gauge
    Gauge {
        namespace: String,
        name: String,
        #[command(subcommand)]
        action: GaugeAction,
        /// Help text; defaults to the published one
        #[arg(long, global = true)]
        help_text: Option<String>,
        #[arg(short, long = "label", global = true)]
        labels: Vec<String>,
    },
    /// Record a histogram observation
    Observe {
        namespace: String,
        name: String,
        value: f64,
        /// Comma-separated finite bucket bounds (default: latency buckets)
        #[arg(long, value_delimiter = ',')]
        buckets: Option<Vec<f64>>,
        /// Help text; defaults to the published one
        #[arg(long)]
        help_text: Option<String>,
        #[arg(short, long = "label")]
        labels: Vec<String>,
    },
    /// Print the current metrics
    Render {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Re-render the metrics periodically until Ctrl-C
    Watch {
        /// Seconds between renders
        #[arg(short, long, default_value = "5")]
        interval: u64,
    },
    /// Remove every stored value under the configured prefix
    Wipe,
    /// Run a sample workload against an in-memory store and print the result
    Demo,
}

#[derive(Subcommand, Clone, Copy)]
enum GaugeAction {
    /// Overwrite the value
    Set { value: f64 },
    /// Add to the value (negative to subtract)
    Add {
        #[arg(allow_hyphen_values = true)]
        delta: f64,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("promshare=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref(), cli.store.as_deref())?;

    match cli.command {
        Commands::Inc {
            namespace,
            name,
            by,
            help_text,
            labels,
        } => commands::record::inc(&config, &namespace, &name, help_text.as_deref(), &labels, by),
        Commands::Gauge {
            namespace,
            name,
            action,
            help_text,
            labels,
        } => {
            let op = match action {
                GaugeAction::Set { value } => commands::record::GaugeOp::Set(value),
                GaugeAction::Add { delta } => commands::record::GaugeOp::Add(delta),
            };
            commands::record::gauge(&config, &namespace, &name, help_text.as_deref(), &labels, op)
        }
        Commands::Observe {
            namespace,
            name,
            value,
            buckets,
            help_text,
            labels,
        } => commands::record::observe(&config, &namespace, &name, help_text.as_deref(), &labels, buckets, value),
        Commands::Render { format } => commands::render::render(&config, &format),
        Commands::Watch { interval } => commands::render::watch(&config, interval),
        Commands::Wipe => commands::render::wipe(&config),
        Commands::Demo => commands::demo::run(),
    }
}
