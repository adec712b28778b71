//! Adventure - play a rule set in the terminal with an AI Game Master.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use narrative_core::llm::{OllamaClient, ResilientLlmClient};
use narrative_core::persist::Transcript;
use narrative_core::{Config, Reply, Session, DEFAULT_SAVE_PATH};

#[derive(Parser)]
#[command(
    name = "adventure",
    about = "A text adventure narrated by a language model and refereed by its rules",
    version
)]
struct Args {
    /// Rule set to play (JSON or TOML)
    #[arg(short, long)]
    rules: PathBuf,

    /// Model to ask (overrides OLLAMA_MODEL)
    #[arg(short, long)]
    model: Option<String>,

    /// Ollama server address (overrides OLLAMA_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Where `save` and `load` keep the game
    #[arg(short, long, default_value = DEFAULT_SAVE_PATH)]
    save: PathBuf,

    /// Append every turn to this JSON Lines file
    #[arg(short, long)]
    transcript: Option<PathBuf>,

    /// Skip the second narration pass
    #[arg(long)]
    no_embellish: bool,

    /// Start over even if a save file exists
    #[arg(long)]
    new_game: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so they never interleave with the story.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "narrative_core=info,game_rules=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = Config::from_env().context("invalid configuration")?;
    if let Some(model) = args.model {
        config.llm.model = model;
    }
    if let Some(base_url) = args.base_url {
        config.llm.base_url = base_url;
    }
    if args.no_embellish {
        config.session.embellish = false;
    }
    tracing::info!(model = %config.llm.model, base_url = %config.llm.base_url, "Configuration loaded");

    let llm = Arc::new(ResilientLlmClient::new(
        Arc::new(OllamaClient::from_config(&config.llm)),
        config.retry.clone(),
    ));

    let mut session = Session::from_rules_file(&args.rules, llm, &config)
        .with_context(|| format!("could not load rules from {}", args.rules.display()))?
        .with_save_path(args.save);
    if let Some(path) = args.transcript {
        session = session.with_transcript(Transcript::new(path));
    }

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    write_out(&mut stdout, &format!("{}\n\nType 'help' for commands.\n", session.intro())).await?;

    if !args.new_game {
        if let Some(reply) = session.resume().await {
            write_out(&mut stdout, &format!("\n{}\n", reply.text())).await?;
        }
    }

    loop {
        if session.is_finished() {
            break;
        }
        write_out(&mut stdout, &format!("\n{}\n> ", session.header())).await?;

        let Some(line) = lines.next_line().await.context("failed to read input")? else {
            write_out(&mut stdout, "\n").await?;
            break;
        };

        let reply = session.handle_input(&line).await?;
        if !matches!(reply, Reply::Empty) {
            write_out(&mut stdout, &format!("\n{}\n", reply.text())).await?;
        }
        if reply.is_finished() {
            break;
        }
    }

    tracing::info!(turns = session.turns_taken(), "Session closed");
    Ok(())
}

async fn write_out(stdout: &mut tokio::io::Stdout, text: &str) -> anyhow::Result<()> {
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}
