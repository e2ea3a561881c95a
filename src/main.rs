use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tasknest::config::ClientConfig;
use tasknest::gateway::{HttpGateway, SyncGateway};
use tasknest::models::{Credentials, ListId, TaskId};
use tasknest::registry::ListRegistry;
use tasknest::tree::{render::render_forest, TaskTreeManager};

#[derive(Parser)]
#[command(name = "tnest")]
#[command(about = "Nested task lists from the command line")]
struct Cli {
    /// API base URL (overrides config and TASKNEST_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Login name (overrides config and TASKNEST_USERNAME)
    #[arg(short, long, global = true)]
    username: Option<String>,

    /// Password
    #[arg(long, global = true, env = "TASKNEST_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and log in
    Register,
    /// Show all lists
    Lists,
    /// Create a list
    ListAdd { name: String },
    /// Rename a list
    ListRename { list: ListId, name: String },
    /// Delete a list and all of its tasks
    ListRm { list: ListId },
    /// Show the task tree of a list
    Tree { list: ListId },
    /// Add a task, optionally under a parent task
    Add {
        list: ListId,
        name: String,
        #[arg(short, long)]
        parent: Option<TaskId>,
    },
    /// Rename a task
    Rename {
        list: ListId,
        task: TaskId,
        name: String,
    },
    /// Set or clear (omit DATE) a task's date, as YYYY-MM-DD
    Date {
        list: ListId,
        task: TaskId,
        date: Option<NaiveDate>,
    },
    /// Toggle a task's completion
    Toggle { list: ListId, task: TaskId },
    /// Delete a task and its subtasks
    Rm { list: ListId, task: TaskId },
    /// Move a root task to another list
    Mv {
        list: ListId,
        task: TaskId,
        #[arg(long)]
        to: ListId,
    },
    /// Move a task to a new position among its siblings
    Reorder {
        list: ListId,
        task: TaskId,
        index: usize,
    },
}

/// Initialize tracing on stderr so stdout carries only command output.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "tasknest=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = ClientConfig::load();
    if let Some(url) = cli.url {
        config.base_url = url;
    }
    if let Some(username) = cli.username {
        config.username = Some(username);
    }

    let credentials = Credentials {
        username: config
            .username
            .clone()
            .context("No username given (use --username or TASKNEST_USERNAME)")?,
        password: cli
            .password
            .context("No password given (use --password or TASKNEST_PASSWORD)")?,
    };

    let http = HttpGateway::from_config(&config)?;
    let identity = match cli.command {
        Commands::Register => http.register(&credentials).await?,
        _ => http.login(&credentials).await?,
    };
    tracing::info!("Signed in as {}", identity.username);

    let gateway: Arc<dyn SyncGateway> = Arc::new(http.clone());
    let timeout = config.request_timeout();
    let tree = Arc::new(
        TaskTreeManager::new(gateway.clone(), Some(identity.clone())).with_timeout(timeout),
    );
    let registry =
        ListRegistry::new(gateway, Some(identity), tree.clone()).with_timeout(timeout);

    match cli.command {
        Commands::Register => {
            println!("Registered {}", credentials.username);
        }
        Commands::Lists => {
            for list in registry.fetch_all().await? {
                println!("{:>5}  {} ({} tasks)", list.id, list.name, list.task_count);
            }
        }
        Commands::ListAdd { name } => {
            let list = registry.create(&name).await?;
            println!("Created list {} ({})", list.id, list.name);
        }
        Commands::ListRename { list, name } => {
            registry.fetch_all().await?;
            let renamed = registry.rename(list, &name).await?;
            println!("Renamed list {} to {}", renamed.id, renamed.name);
        }
        Commands::ListRm { list } => {
            registry.remove(list).await?;
            println!("Deleted list {}", list);
        }
        Commands::Tree { list } => {
            registry.set_current(list).await?;
            print!("{}", render_forest(&tree.snapshot()));
        }
        Commands::Add { list, name, parent } => {
            registry.set_current(list).await?;
            let task = tree.create_task(parent, &name).await?;
            println!("Created task {} ({})", task.id, task.name);
        }
        Commands::Rename { list, task, name } => {
            registry.set_current(list).await?;
            let task = tree.rename_task(task, &name).await?;
            println!("Renamed task {} to {}", task.id, task.name);
        }
        Commands::Date { list, task, date } => {
            registry.set_current(list).await?;
            let task = tree.set_date(task, date).await?;
            match task.date {
                Some(date) => println!("Task {} dated {}", task.id, date),
                None => println!("Task {} has no date", task.id),
            }
        }
        Commands::Toggle { list, task } => {
            registry.set_current(list).await?;
            let task = tree.toggle_completion(task).await?;
            let state = if task.is_completed { "done" } else { "open" };
            println!("Task {} is {}", task.id, state);
        }
        Commands::Rm { list, task } => {
            registry.set_current(list).await?;
            tree.delete_task(task).await?;
            println!("Deleted task {}", task);
        }
        Commands::Mv { list, task, to } => {
            registry.set_current(list).await?;
            tree.move_task(task, to).await?;
            println!("Moved task {} to list {}", task, to);
        }
        Commands::Reorder { list, task, index } => {
            registry.set_current(list).await?;
            let applied = tree.reorder_sibling(task, index).await?;
            println!("Task {} is now at position {}", task, applied);
        }
    }

    if let Err(e) = http.logout().await {
        tracing::warn!("Logout failed: {}", e);
    }
    Ok(())
}
