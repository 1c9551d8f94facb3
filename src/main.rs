use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use modloc::batch::{ModFiles, missing_report, translate_mods};
use modloc::config::{self, Config};
use modloc::engine::{RunOptions, RunSummary, Scheduler, translate_file};
use modloc::mt::{MachineTranslator, MockMode, MockTranslator, OpenAiTranslator, TranslationRequest};
use modloc::AsciiRatioDetector;

#[derive(Parser)]
#[command(
    name = "modloc",
    version,
    about = "Incremental machine translation for mod configuration files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "modloc.toml", global = true)]
    config: PathBuf,

    /// Log debug output (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate one source file into a result file, resuming previous work.
    Translate {
        source: PathBuf,
        result: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Translate every mod below a mods folder.
    Batch {
        root: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Report untranslated entries of every mod as JSON, without translating.
    Missing {
        root: PathBuf,
        /// Write the report here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Maximum concurrent translation requests.
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Model to request from the provider.
    #[arg(short, long)]
    model: Option<String>,

    /// Target language, as named in the prompt.
    #[arg(short, long)]
    target: Option<String>,

    /// Use the offline mock translator instead of the API.
    #[arg(long)]
    mock: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let mut cfg = config::load(&cli.config)?;
    cfg.translator.apply_env();
    let files = ModFiles::from(&cfg.run);

    match cli.command {
        Commands::Translate {
            source,
            result,
            run,
        } => {
            let scheduler = build_scheduler(&mut cfg, &run)?;
            let cancel = cancel_on_ctrl_c();
            let report = translate_file(&source, &result, &scheduler, &cancel).await?;
            print_summary(&result, &report.summary);
        }
        Commands::Batch { root, run } => {
            let scheduler = build_scheduler(&mut cfg, &run)?;
            let cancel = cancel_on_ctrl_c();
            let report = translate_mods(&root, &files, &scheduler, &cancel).await?;

            println!(
                "{} mods, {} entries translated",
                report.mods.len(),
                report.translated()
            );
            for failed in report.failed() {
                if let Err(e) = &failed.result {
                    eprintln!("  {}: {}", failed.name, e);
                }
            }
            if report.cancelled {
                println!("cancelled; re-run to continue");
            }
        }
        Commands::Missing { root, output } => {
            let report = missing_report(&root, &files, &AsciiRatioDetector::default()).await?;
            let json = serde_json::to_string_pretty(&report)?;
            match output {
                Some(path) => {
                    write_report(&path, &json).await?;
                    println!("{} mods with missing entries -> {}", report.len(), path.display());
                }
                None => println!("{}", json),
            }
        }
    }

    Ok(())
}

fn build_scheduler(cfg: &mut Config, run: &RunArgs) -> anyhow::Result<Scheduler> {
    if let Some(model) = &run.model {
        cfg.translator.model = model.clone();
    }
    if let Some(target) = &run.target {
        cfg.translator.target_language = target.clone();
    }
    if let Some(concurrency) = run.concurrency {
        cfg.run.concurrency = concurrency;
    }

    let translator: Arc<dyn MachineTranslator> = if run.mock {
        Arc::new(MockTranslator::new(MockMode::Suffix))
    } else {
        let provider = OpenAiTranslator::from_config(&cfg.translator).context(
            "cannot set up the translator (set MODLOC_API_KEY or TOKEN, or pass --mock)",
        )?;
        Arc::new(provider)
    };

    let request = TranslationRequest::new(cfg.translator.target_language.clone())
        .with_model(cfg.translator.model.clone());
    let options = RunOptions::new(request).with_concurrency(cfg.run.concurrency_limit()?);
    Ok(Scheduler::new(translator, options))
}

/// Cancels the returned token on the first Ctrl-C. In-flight requests finish
/// and are saved before the run returns. A second Ctrl-C exits immediately.
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if token.is_cancelled() {
                tracing::warn!("interrupted again, exiting without waiting");
                std::process::exit(130);
            }
            tracing::warn!("interrupted, finishing in-flight requests (Ctrl-C again to exit)");
            token.cancel();
        }
    });
    cancel
}

fn print_summary(result: &Path, summary: &RunSummary) {
    println!(
        "{}: {} translated, {} failed, {} remaining",
        result.display(),
        summary.translated,
        summary.failed,
        summary.remaining()
    );
    if summary.cancelled {
        println!("cancelled; re-run to continue");
    }
}

async fn write_report(path: &Path, json: &str) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, format!("{json}\n"))
        .await
        .with_context(|| format!("cannot write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["modloc", "missing", "Mods", "-c", "other.toml", "-v"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Missing { .. }));
    }

    #[test]
    fn test_config_flag_before_subcommand() {
        let cli = Cli::try_parse_from(["modloc", "--config", "other.toml", "batch", "Mods"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("other.toml"));
    }
}
