use anyhow::Context;
use clap::{Parser, Subcommand};
use colloquy_rs::colloquy::server::{self, AppState};
use colloquy_rs::colloquy::state::{InboundMessage, Role};
use colloquy_rs::colloquy::store::InMemorySessionStore;
use colloquy_rs::colloquy::workflow::graph::WorkflowRunner;
use colloquy_rs::colloquy::workflow::loader::WorkflowLoader;
use dotenv::dotenv;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the chat endpoints over HTTP
    Serve {
        /// Path to the orchestrator definition
        #[arg(short, long, default_value = "config/interview.yaml")]
        config: String,

        /// Port to listen on
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
    /// Run a single interview turn against an in-memory session
    Chat {
        /// Path to the orchestrator definition
        #[arg(short, long, default_value = "config/interview.yaml")]
        config: String,

        /// The user's message
        #[arg(short, long)]
        message: String,

        /// Session identifier
        #[arg(short, long, default_value = "local")]
        session: String,

        /// User identifier
        #[arg(short, long, default_value = "local-user")]
        user: String,
    },
}

fn load_runner(config: &str) -> anyhow::Result<WorkflowRunner> {
    let definition = WorkflowLoader::new()
        .load(config)
        .with_context(|| format!("failed to load orchestrator definition from {}", config))?;
    log::info!("Loaded orchestrator: {}", definition.name);
    WorkflowRunner::from_definition(&definition).context("failed to build workflow runner")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Serve { config, port } => {
            let runner = load_runner(&config)?;
            let state = AppState::new(runner, InMemorySessionStore::new());
            server::serve(state, port).await?;
        }
        Commands::Chat {
            config,
            message,
            session,
            user,
        } => {
            let runner = load_runner(&config)?;
            let store = InMemorySessionStore::new();
            let stored = store.append_message(&session, Role::User, message).await;
            let inbound = InboundMessage {
                session_id: session,
                message_id: stored.id,
            };

            match runner.respond(&store, &user, &inbound).await {
                Ok(record) => {
                    println!("{}", record.reply.unwrap_or_default());
                    for fact in &record.facts {
                        log::info!("Extracted {} fact: {}", fact.category.as_str(), fact.raw_text);
                    }
                    if record.finished {
                        println!("(session finished)");
                    }
                }
                Err(e) => {
                    log::error!("Run failed: {}", e);
                    println!("{}", e.user_message());
                }
            }
        }
    }

    Ok(())
}
