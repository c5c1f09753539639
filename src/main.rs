//! Helpdesk IT 命令行入口
//!
//! 子命令：ask（默认，单次提问，带工具）、classify（工单分类）、rag（仅知识库问答）、chat（交互式会话）。
//! 日志输出到 stderr，默认 warn，可通过 RUST_LOG 覆盖。

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use helpdesk::agent::{create_agent_components, create_augmenter, create_llm_from_config};
use helpdesk::config::{load_config, AppConfig};
use helpdesk::react::ReactEvent;
use helpdesk::routing::{classify_ticket, next_step};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "helpdesk", version, about = "IT helpdesk assistant: tool calling + grounded FAQ answers")]
struct Cli {
    /// Extra configuration file (overrides config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print tool calls and observations to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask one question (tools and knowledge base available)
    Ask {
        #[arg(short, long)]
        question: Option<String>,
    },
    /// Classify a ticket (category, urgency, products)
    Classify {
        #[arg(short, long)]
        ticket: Option<String>,
    },
    /// Answer strictly from the FAQ knowledge base
    Rag {
        #[arg(short, long)]
        question: Option<String>,
    },
    /// Interactive session (/exit or /quit to leave, /reset to clear history)
    Chat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.clone()).context("Failed to load configuration")?;

    match cli.command.unwrap_or(Commands::Ask { question: None }) {
        Commands::Ask { question } => {
            let question = arg_or_stdin(question, "Question: ").await?;
            ask(&cfg, &question, cli.verbose).await
        }
        Commands::Classify { ticket } => {
            let ticket = arg_or_stdin(ticket, "Ticket: ").await?;
            classify(&cfg, &ticket).await
        }
        Commands::Rag { question } => {
            let question = arg_or_stdin(question, "Question: ").await?;
            rag(&cfg, &question).await
        }
        Commands::Chat => chat(&cfg, cli.verbose).await,
    }
}

/// 参数缺省时从 stdin 读一行
async fn arg_or_stdin(value: Option<String>, prompt: &str) -> anyhow::Result<String> {
    if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
        return Ok(v);
    }
    let mut stderr = tokio::io::stderr();
    stderr.write_all(prompt.as_bytes()).await?;
    stderr.flush().await?;
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read stdin")?;
    let line = line.trim().to_string();
    anyhow::ensure!(!line.is_empty(), "empty input");
    Ok(line)
}

/// verbose 时把过程事件打印到 stderr
fn spawn_event_printer(verbose: bool) -> Option<tokio::sync::mpsc::UnboundedSender<ReactEvent>> {
    if !verbose {
        return None;
    }
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ReactEvent>();
    tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            match ev {
                ReactEvent::ToolCall { tool, args, .. } => eprintln!("[tool] {tool} {args}"),
                ReactEvent::Observation { tool, preview } => eprintln!("[ok] {tool}: {preview}"),
                ReactEvent::ToolFailure { tool, reason } => eprintln!("[fail] {tool}: {reason}"),
                _ => {}
            }
        }
    });
    Some(tx)
}

async fn ask(cfg: &AppConfig, question: &str, verbose: bool) -> anyhow::Result<()> {
    let components = create_agent_components(cfg, spawn_event_printer(verbose))
        .await
        .context("Failed to create agent")?;
    let mut session = components.new_session();
    let answer = session.send(question).await?;
    println!("{answer}");
    Ok(())
}

async fn classify(cfg: &AppConfig, ticket: &str) -> anyhow::Result<()> {
    let llm = create_llm_from_config(cfg).context("Failed to create LLM client")?;
    let classification = classify_ticket(llm.as_ref(), ticket).await?;
    println!("{}", serde_json::to_string_pretty(&classification)?);
    println!("Next step: {}", next_step(&classification));
    Ok(())
}

async fn rag(cfg: &AppConfig, question: &str) -> anyhow::Result<()> {
    let llm = create_llm_from_config(cfg).context("Failed to create LLM client")?;
    let augmenter = create_augmenter(cfg).await.context("Knowledge base unavailable")?;
    let out = augmenter.answer(llm.as_ref(), question).await?;
    println!("{}", out.answer);
    Ok(())
}

async fn chat(cfg: &AppConfig, verbose: bool) -> anyhow::Result<()> {
    let components = create_agent_components(cfg, spawn_event_printer(verbose))
        .await
        .context("Failed to create agent")?;
    let mut session = components.new_session();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{} (type /exit to quit, /reset to clear)", cfg.app.name);
    loop {
        print!("> ");
        std::io::Write::flush(&mut std::io::stdout())?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/exit" | "/quit" => break,
            "/reset" => {
                session.reset();
                println!("(history cleared)");
                continue;
            }
            _ => {}
        }

        // Ctrl+C 只取消当前这一轮
        let cancel = CancellationToken::new();
        let guard = cancel.clone();
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                guard.cancel();
            }
        });
        let result = session.send_with_cancel(line, cancel).await;
        watcher.abort();

        match result {
            Ok(answer) => println!("{answer}\n"),
            Err(e) if e.is_recoverable() => eprintln!("error: {e}\n"),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
