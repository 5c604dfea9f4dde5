use clap::{Parser, ValueEnum};
use mirage_server::config::ServerConfig;
use mirage_server::MirageBuilder;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Mirage - mock HTTP APIs from REST resource definitions or OpenAPI documents
#[derive(Parser, Debug)]
#[command(name = "mirage")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing *-config.{json,yaml,yml} files (repeatable)
    #[arg(short, long = "config-dir", env = "MIRAGE_CONFIG_DIR", value_delimiter = ',')]
    config_dir: Vec<PathBuf>,

    /// OpenAPI document to serve without a config file (repeatable)
    #[arg(short, long)]
    spec: Vec<PathBuf>,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Script execution time limit in milliseconds
    #[arg(long, default_value = "5000")]
    script_timeout_ms: u64,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.with_target(false).init(),
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    if args.config_dir.is_empty() && args.spec.is_empty() {
        anyhow::bail!("Nothing to serve: pass --config-dir or --spec");
    }

    let mut builder = MirageBuilder::new().with_server_config(ServerConfig {
        host: args.host,
        port: args.port,
        script_timeout: Duration::from_millis(args.script_timeout_ms),
        ..Default::default()
    });
    for dir in args.config_dir {
        builder = builder.with_config_dir(dir);
    }
    for spec in args.spec {
        builder = builder.with_specification_file(spec);
    }

    let server = builder.start().await?;
    info!("Mirage {} ready at {}", env!("CARGO_PKG_VERSION"), server.base_url());

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl-C");
    server.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.log_format);

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
