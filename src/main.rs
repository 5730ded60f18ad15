//! pvcscaler
//!
//! Scale down Deployments and StatefulSets that mount PVCs of a storage class,
//! record their replica counts, and restore them later.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pvcscaler::{
    connect, render, ClusterConfig, KubeCluster, NamespaceSelector, OutputFormat, PvcScaler,
    Report, ScalerConfig,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// pvcscaler - scale down & up workloads with PVCs of a storage class
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to kubeconfig (defaults to $KUBECONFIG, in-cluster config or ~/.kube/config)
    #[arg(short = 'k', long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, env = "KUBECONTEXT", global = true)]
    context: Option<String>,

    /// Dry run mode: the API server validates writes without persisting them
    #[arg(short = 'd', long, global = true)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scale down workloads with a PVC of the storage class
    Down {
        #[command(flatten)]
        target: TargetArgs,

        /// pvcscaler state file to write
        #[arg(short = 'o', long = "output-file")]
        output_file: PathBuf,

        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },

    /// Scale workloads back up from a state file
    Up {
        /// pvcscaler state file to read
        #[arg(short = 'i', long = "input-file")]
        input_file: PathBuf,
    },

    /// List workloads with a PVC of the storage class
    List {
        #[command(flatten)]
        target: TargetArgs,

        /// Output format (table, json, yaml)
        #[arg(short = 'o', long, default_value = "table", value_parser = parse_format)]
        output: OutputFormat,
    },

    /// Show version, git commit and build date
    Version,
}

#[derive(clap::Args, Debug)]
struct TargetArgs {
    /// Namespace to use, repeatable; `all` scans every namespace
    #[arg(short = 'n', long = "namespace", default_value = "all")]
    namespaces: Vec<String>,

    /// Storage class to target
    #[arg(
        short = 's',
        long = "storage-class",
        env = "PVCSCALER_STORAGE_CLASS",
        default_value = "default"
    )]
    storage_class: String,

    /// Maximum namespaces scanned concurrently
    #[arg(long, env = "PVCSCALER_CONCURRENCY", default_value_t = 10)]
    concurrency: usize,
}

fn parse_format(value: &str) -> Result<OutputFormat, String> {
    value.parse().map_err(|e: pvcscaler::Error| e.to_string())
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    init_logging(&args);

    if let Command::Version = args.command {
        println!(
            "version: {}, git commit: {}, date: {}",
            pvcscaler::VERSION,
            pvcscaler::GIT_COMMIT,
            pvcscaler::BUILD_DATE
        );
        return Ok(ExitCode::SUCCESS);
    }

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let client = connect(&ClusterConfig {
        kubeconfig: args.kubeconfig.clone(),
        context: args.context.clone(),
    })
    .await
    .context("failed to create Kubernetes client")?;
    let api = Arc::new(KubeCluster::new(client));

    if args.dry_run {
        info!("Dry run mode: no changes will be persisted");
    }

    let success = match args.command {
        Command::Down {
            target,
            output_file,
            force,
        } => {
            let pvcscaler = PvcScaler::new(api, scaler_config(&target, args.dry_run)?);
            let report = pvcscaler
                .down(&output_file, force, &cancel)
                .await
                .context("scale down failed")?;
            summarize("scaled down", &report)
        }
        Command::Up { input_file } => {
            let config = ScalerConfig {
                dry_run: args.dry_run,
                ..ScalerConfig::default()
            };
            let report = PvcScaler::new(api, config)
                .up(&input_file, &cancel)
                .await
                .with_context(|| format!("scale up from {} failed", input_file.display()))?;
            summarize("scaled up", &report)
        }
        Command::List { target, output } => {
            let pvcscaler = PvcScaler::new(api, scaler_config(&target, args.dry_run)?);
            let discovery = pvcscaler.list(&cancel).await.context("discovery failed")?;
            print!("{}", render(&discovery.workloads, output)?);
            for failure in &discovery.failures {
                error!("{}: {}", failure.target, failure.error);
            }
            discovery.failures.is_empty()
        }
        Command::Version => true,
    };

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn scaler_config(target: &TargetArgs, dry_run: bool) -> anyhow::Result<ScalerConfig> {
    Ok(ScalerConfig {
        namespaces: NamespaceSelector::from_args(&target.namespaces)?,
        storage_class: target.storage_class.clone(),
        dry_run,
        concurrency: target.concurrency,
        ..ScalerConfig::default()
    })
}

fn summarize(action: &str, report: &Report) -> bool {
    info!("{} {} workloads", action, report.succeeded.len());
    for failure in &report.failures {
        error!("{}: {}", failure.target, failure.error);
    }
    for workload in &report.pending {
        warn!("not processed (cancelled): {}", workload.reference());
    }
    report.is_success()
}

// =============================================================================
// Signals
// =============================================================================

async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for interrupt: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    warn!("Received interrupt, cancelling...");
    cancel.cancel();
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => args.log_level.to_lowercase(),
        _ => "info".to_string(),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{level},hyper=warn,kube=info,tower=warn"))
    });

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
