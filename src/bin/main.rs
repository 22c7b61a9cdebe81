use clap::Parser;
use multi_agent_chat::{
    agent::AgentRegistry, config::Settings, controller, storage::AgentStore, SessionHandle,
    SessionState,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Ask one of the preconfigured agents a single question.
#[derive(Debug, Parser)]
#[command(name = "ask", version)]
struct Cli {
    /// Agent key (web, finance, research, simple) or display label
    #[arg(short, long, default_value = "simple")]
    agent: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Print the chat_history.txt export instead of the bare response
    #[arg(long)]
    transcript: bool,

    /// The query to send
    query: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables before clap reads OPENAI_API_KEY
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_env()?;
    let store = AgentStore::sqlite(&settings.database_url)?;

    let registry = match AgentRegistry::build(cli.api_key.as_deref(), &settings, &store) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("⚠️  {}", e);
            eprintln!("📌 Pass --api-key or set OPENAI_API_KEY in .env");
            return Err(e.into());
        }
    };

    let Some(agent) = registry.get(&cli.agent) else {
        eprintln!("Unknown agent '{}'. Available agents:", cli.agent);
        for agent in registry.agents() {
            eprintln!("  {:<10} {}", agent.profile().key, agent.profile().label);
        }
        std::process::exit(2);
    };

    let session = SessionHandle::new(SessionState::new(Uuid::new_v4()));
    info!(agent = agent.profile().name, "Running query");

    match controller::run(&session, agent.as_ref(), &cli.query).await {
        Ok(turn) => {
            if cli.transcript {
                println!("{}", session.lock().export_text());
            } else {
                println!("{}", turn.response);
            }
            Ok(())
        }
        Err(e) if e.is_warning() => {
            eprintln!("⚠️  {}", e);
            std::process::exit(2);
        }
        Err(e) => {
            error!("{} failed: {}", agent.profile().name, e);
            Err(e.into())
        }
    }
}
