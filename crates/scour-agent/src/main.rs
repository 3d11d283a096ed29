use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;

use scour_core::SearchProvider;
use scour_local::arxiv::ArxivProvider;
use scour_local::ddg::DdgLiteProvider;
use scour_local::openai_compat::OpenAiCompatClient;
use scour_local::reader::LocalPageReader;
use scour_local::searxng::SearxngSearchProvider;

mod agent;
mod dispatch;
mod prompt;
mod session;

use agent::{AgentLoop, LoopConfig, LoopOutcome, StdinOperator};
use dispatch::ToolSet;
use session::Session;

#[derive(Parser, Debug)]
#[command(name = "scour")]
#[command(about = "Conversational web-research agent (search/click/open over a local LLM)", long_about = None)]
struct Cli {
    /// Initial research query. Read interactively when omitted.
    query: Option<String>,

    /// Maximum number of model turns before the conversation is cut off.
    #[arg(long, default_value_t = 10)]
    max_turns: u32,

    /// Web search provider. Allowed: ddg, searxng
    #[arg(long, default_value = "ddg")]
    provider: String,

    /// Model identifier passed to the completion endpoint.
    #[arg(long, env = "SCOUR_OPENAI_MODEL")]
    model: Option<String>,

    /// Sampling temperature.
    #[arg(long, default_value_t = 0.95)]
    temperature: f64,

    /// Nucleus-sampling threshold.
    #[arg(long, default_value_t = 0.7)]
    top_p: f64,
}

fn read_query_from_stdin() -> Result<String> {
    print!("Query: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let line = line.trim().to_string();
    anyhow::ensure!(!line.is_empty(), "no query given");
    Ok(line)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("scour=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let query = match cli.query {
        Some(q) => q,
        None => read_query_from_stdin()?,
    };

    let client = scour_local::default_client().context("building HTTP client")?;
    let web: Box<dyn SearchProvider> = match cli.provider.as_str() {
        "ddg" => Box::new(DdgLiteProvider::new(client.clone())),
        "searxng" => Box::new(SearxngSearchProvider::from_env(client.clone())?),
        other => anyhow::bail!("unknown provider {other:?} (allowed: ddg, searxng)"),
    };
    let tools = ToolSet {
        web,
        academic: Box::new(ArxivProvider::new(client.clone())),
        reader: Box::new(LocalPageReader::new(client)),
    };
    let backend = OpenAiCompatClient::from_env(cli.model)
        .context("configuring the completion client")?
        .with_sampling(cli.temperature, cli.top_p);

    let mut session = Session::new(prompt::SYSTEM_PROMPT, &query);
    let mut operator = StdinOperator;
    let agent = AgentLoop::new(
        backend,
        tools,
        LoopConfig {
            max_turns: cli.max_turns,
        },
    );

    // Display is an observer over the stream; the loop itself never prints.
    let on_fragment = |frag: &str| {
        print!("{frag}");
        let _ = std::io::stdout().flush();
    };

    let outcome = agent
        .run(&mut session, &mut operator, &on_fragment)
        .await
        .context("conversation aborted")?;

    match outcome {
        LoopOutcome::Finished => println!("\n\nAgent finished the conversation."),
        LoopOutcome::OperatorEnded => println!("\nEnding conversation."),
        LoopOutcome::TurnBudgetExhausted => println!(
            "\nStopping after {} turns (--max-turns).",
            session.turns()
        ),
    }
    Ok(())
}
