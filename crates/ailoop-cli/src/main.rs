//! ailoop: command-line client for ailoop servers.
//!
//! Every command prints its result as JSON on stdout. Errors go to stderr and
//! the process exits with status 1.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use ailoop_sdk::{
    AiloopClient, ClientConfig, DependencyType, NotificationPriority, ResponseType, TaskState,
};

mod commands;

/// Talk to an ailoop server from the shell
#[derive(Parser)]
#[command(name = "ailoop")]
#[command(about = "Send messages and manage tasks on an ailoop server", long_about = None)]
#[command(version)]
struct Cli {
    /// Server base URL (overrides config file and AILOOP_SERVER_URL)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Default channel (overrides config file and AILOOP_CHANNEL)
    #[arg(long, global = true)]
    channel: Option<String>,

    /// TOML configuration file
    #[arg(long, global = true, env = "AILOOP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a notification
    Say {
        /// Notification text
        text: String,

        /// Priority: urgent, high, normal, low
        #[arg(long, default_value = "normal")]
        priority: NotificationPriority,
    },

    /// Ask a question
    Ask {
        /// Question text
        question: String,

        /// Seconds to wait for an answer (default 60)
        #[arg(long)]
        timeout: Option<u32>,

        /// Allowed answer; repeat for multiple choices
        #[arg(long = "choice")]
        choices: Vec<String>,
    },

    /// Request authorization for an action
    Authorize {
        /// Action needing approval
        action: String,

        /// Seconds to wait for a decision (default 300)
        #[arg(long)]
        timeout: Option<u32>,

        /// Extra context as a JSON object
        #[arg(long, value_parser = commands::parse_object)]
        context: Option<serde_json::Map<String, serde_json::Value>>,
    },

    /// Ask viewers to open a URL
    Navigate {
        /// Target URL
        url: String,
    },

    /// Answer a question or authorization
    Respond {
        /// Id of the message being answered
        message_id: uuid::Uuid,

        /// Answer text (required for text responses)
        #[arg(long)]
        answer: Option<String>,

        /// text, authorization_approved, authorization_denied, timeout, cancelled
        #[arg(long = "type", default_value = "text")]
        response_type: ResponseType,
    },

    /// Show server health and version compatibility
    Health,

    /// Print pushed messages as they arrive
    Watch {
        /// Channels to subscribe to (default: the configured channel)
        channels: Vec<String>,
    },

    /// Manage tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Create a task
    Create {
        /// Task title
        title: String,

        /// Task description
        #[arg(long, default_value = "")]
        description: String,

        /// Assignee
        #[arg(long)]
        assignee: Option<String>,

        /// Metadata as a JSON object
        #[arg(long, value_parser = commands::parse_object)]
        metadata: Option<serde_json::Map<String, serde_json::Value>>,
    },

    /// List tasks in the channel
    List {
        /// Only tasks in this state
        #[arg(long)]
        state: Option<TaskState>,
    },

    /// Show one task
    Show {
        /// Task id
        id: String,
    },

    /// Change a task's state
    Update {
        /// Task id
        id: String,

        /// pending, done, abandoned
        state: TaskState,
    },

    /// List tasks that are ready to start
    Ready,

    /// List tasks waiting on a blocker
    Blocked,

    /// Show a task with its parents and children
    Graph {
        /// Task id
        id: String,
    },

    /// Make a task depend on another
    Depend {
        /// Dependent task id
        id: String,

        /// Task it depends on
        depends_on: String,

        /// blocks, related, parent
        #[arg(long = "type", default_value = "blocks")]
        dependency_type: DependencyType,
    },

    /// Remove a dependency
    Undepend {
        /// Dependent task id
        id: String,

        /// Task it no longer depends on
        depends_on: String,
    },
}

impl Cli {
    /// Config file (or defaults), then `AILOOP_*` variables, then flags.
    fn client_config(&self) -> Result<ClientConfig> {
        let base = match &self.config {
            Some(path) => ClientConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ClientConfig::default(),
        };
        let mut config = base.merge_env(std::env::vars())?;
        if let Some(server) = &self.server {
            config = config.with_server_url(server.clone());
        }
        if let Some(channel) = &self.channel {
            config = config.with_channel(channel.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    ailoop_sdk::init_logging_with("warn");
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        },
    };
    match runtime.block_on(execute_command(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

async fn execute_command(cli: Cli) -> Result<()> {
    let client = AiloopClient::new(cli.client_config()?)?;

    match cli.command {
        Commands::Say { text, priority } => {
            commands::print(&client.say(&text, None, priority).await?)?;
        },
        Commands::Ask {
            question,
            timeout,
            choices,
        } => {
            let choices = (!choices.is_empty()).then_some(choices);
            commands::print(&client.ask(&question, None, timeout, choices).await?)?;
        },
        Commands::Authorize {
            action,
            timeout,
            context,
        } => {
            commands::print(&client.authorize(&action, None, timeout, context).await?)?;
        },
        Commands::Navigate { url } => {
            commands::print(&client.navigate(&url, None).await?)?;
        },
        Commands::Respond {
            message_id,
            answer,
            response_type,
        } => {
            commands::print(&client.respond(message_id, answer, response_type).await?)?;
        },
        Commands::Health => {
            commands::print(&client.connect().await?)?;
        },
        Commands::Watch { channels } => {
            commands::watch(client, channels).await?;
        },
        Commands::Task { command } => commands::task(&client, command).await?,
    }
    Ok(())
}
