//! clarity: terminal chat client with long-term memory
//!
//! Usage:
//!   clarity                          → chat using ./config/config.json
//!   clarity --root ~/clarity         → resolve config, boot doc, logs and memory under a root
//!   clarity --config other.toml      → alternate config file (JSON or TOML)
//!   clarity --trace-file trace.log   → write diagnostics to a file

use anyhow::Context;
use clap::Parser;
use clarity_chat::{ChatSession, Notice};
use clarity_core::{ChatConfig, Error, ProviderKind};
use clarity_llm::{provider_for, LlmProvider};
use clarity_memory::MemoryEngine;
use crossterm::style::Stylize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "clarity",
    about = "Terminal chat client with a boot document and long-term memory",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Project root; relative paths in the config resolve against it
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Config file (default: <root>/config/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write diagnostics to this file instead of stderr
    #[arg(long)]
    trace_file: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.trace_file.as_deref())?;

    let root = cli.root.clone();
    if dotenv::from_path(root.join(".env")).is_ok() {
        tracing::info!("Loaded environment from {}", root.join(".env").display());
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| root.join("config").join("config.json"));
    let config = ChatConfig::load(&config_path, &root)?;

    let chat = build_provider(config.chat_provider(), config.base_url.as_deref())?;
    if !chat.supports_model(&config.model) {
        tracing::warn!(
            "Model {} is not in the {} model list; sending it anyway",
            config.model,
            chat.name()
        );
    }
    let memory = if config.memory_enabled() {
        let kind = config.memory_provider();
        let base_url = if kind == config.chat_provider() {
            config.base_url.as_deref()
        } else {
            None
        };
        let extraction = build_provider(kind, base_url)?;
        Some(MemoryEngine::from_config(&config, extraction))
    } else {
        None
    };

    let mut session = ChatSession::new(config, chat, memory)
        .context("failed to start chat session")?;
    show(&session.banner());
    println!();

    repl(&mut session).await?;
    Ok(())
}

/// Read lines until `/exit`, end of input, or Ctrl-C.
async fn repl(session: &mut ChatSession) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{}", "Clarity OS > ".blue());
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                None
            }
        };

        let Some(line) = line else {
            show(&session.shutdown().await);
            println!("Goodbye!");
            return Ok(());
        };

        let turn = session.handle_input(&line).await;
        show(&turn.notices);
        if turn.exit {
            return Ok(());
        }
    }
}

fn build_provider(kind: ProviderKind, base_url: Option<&str>) -> Result<Arc<dyn LlmProvider>, Error> {
    let api_key = std::env::var(kind.api_key_var())
        .map_err(|_| Error::config(format!("{} not set", kind.api_key_var())))?;
    Ok(provider_for(kind, api_key, base_url))
}

fn show(notices: &[Notice]) {
    for notice in notices {
        match notice {
            Notice::Info(text) => println!("{}", text),
            Notice::Success(text) => println!("{}", format!("✓ {}", text).green()),
            Notice::Warning(text) => println!("{}", format!("! {}", text).yellow()),
            Notice::Error(text) => println!("{}", text.as_str().red()),
            Notice::Reply(text) => println!("{} {}\n", "Assistant:".green(), text),
        }
    }
}

/// Diagnostics go to stderr at `warn` so the REPL stays readable, or to
/// `trace_file` at `info`. `RUST_LOG` overrides either default.
fn init_tracing(trace_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let default = if trace_file.is_some() { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());

    let Some(path) = trace_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
        return Ok(None);
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .with_context(|| format!("invalid trace file path: {}", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create trace directory {}", dir.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();
    Ok(Some(guard))
}
