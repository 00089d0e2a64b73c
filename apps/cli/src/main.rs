mod config;
mod credentials;
mod main_lib;

use clap::{Parser, Subcommand};
use serde::Serialize;

use appgenius_portal_client::{PortalApiClient, PromptFilters};
use config::Config;
use main_lib::{build_client, init_tracing};

#[derive(Parser)]
#[command(name = "portal")]
#[command(author, version, about = "Command-line client for the AppGenius prompt portal")]
#[command(after_help = "Configuration is read from the environment (or a .env file):
  PORTAL_API_URL, PORTAL_API_KEY, PORTAL_ACCESS_TOKEN, PORTAL_REFRESH_TOKEN,
  PORTAL_REQUEST_TIMEOUT_MS, PORTAL_LOG_FORMAT (text|json)")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List prompts
    Prompts {
        #[arg(short, long)]
        category: Option<String>,
        /// Comma-separated tags
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// Show one prompt
    Prompt { id: String },
    /// Show the version history of a prompt
    Versions { id: String },
    /// Fetch prompts changed since a timestamp (ms)
    Sync {
        #[arg(long)]
        since: Option<i64>,
    },
    /// Fetch a shared prompt by its public URL
    Public { url: String },
    /// Check that the configured credentials are accepted
    Check,
    /// Record usage of a prompt version
    RecordUsage {
        prompt_id: String,
        version_id: String,
        #[arg(long)]
        context: Option<String>,
    },
    /// Record model token usage
    RecordTokens {
        count: u64,
        model_id: String,
        #[arg(long)]
        context: Option<String>,
    },
    /// Increment the launch counter of a user
    Launch { user_id: String },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(client: &PortalApiClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Prompts { category, tags } => {
            let prompts = client.get_prompts(&PromptFilters { category, tags }).await?;
            print_json(&prompts)
        }
        Command::Prompt { id } => print_json(&client.get_prompt_detail(&id).await?),
        Command::Versions { id } => print_json(&client.get_prompt_versions(&id).await?),
        Command::Sync { since } => print_json(&client.get_sync_updates(since).await?),
        Command::Public { url } => print_json(&client.get_prompt_from_public_url(&url).await?),
        Command::Check => {
            let ok = client.test_api_connection().await;
            print_json(&serde_json::json!({ "connected": ok }))
        }
        Command::RecordUsage {
            prompt_id,
            version_id,
            context,
        } => {
            let recorded = client
                .record_prompt_usage(&prompt_id, &version_id, context.as_deref())
                .await;
            print_json(&serde_json::json!({ "recorded": recorded }))
        }
        Command::RecordTokens {
            count,
            model_id,
            context,
        } => {
            let recorded = client
                .record_token_usage(count, &model_id, context.as_deref())
                .await;
            print_json(&serde_json::json!({ "recorded": recorded }))
        }
        Command::Launch { user_id } => print_json(&client.increment_launch_count(&user_id).await?),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();
    init_tracing();
    let client = build_client(&config)?;

    let shutdown = client.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling pending calls");
            shutdown.shutdown();
        }
    });

    run(&client, cli.command).await
}
