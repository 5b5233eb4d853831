mod api;
mod todo;

use clap::{Parser, Subcommand};
use recap_api::v1::{NewTodo, Priority, TodoPatch};

use crate::api::Client;

#[derive(Debug, Parser)]
#[command(version, about = "Manage todos and send summaries from the terminal")]
struct Cli {
    #[arg(long, env = "RECAP_API_URL", default_value = "http://localhost:3005/api")]
    api_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List active todos, then completed ones.
    List,
    Add {
        title: String,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        priority: Option<Priority>,
        #[arg(short, long)]
        category: Option<String>,
    },
    Edit {
        id: String,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        priority: Option<Priority>,
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Mark a todo as completed.
    Done { id: String },
    /// Mark a todo as active again.
    Undo { id: String },
    #[command(alias = "delete")]
    Rm { id: String },
    /// Generate a summary of pending todos.
    Summary {
        /// Also post the summary to the configured webhook.
        #[arg(long)]
        send: bool,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let client = Client::new(cli.api_url);

    match cli.command {
        Command::List => {
            let todos = client.get_todos().await?;
            let (active, completed) = todo::partition(&todos);

            println!("Active ({})", active.len());
            for todo in active {
                println!("{}", todo::view(todo));
            }

            println!();
            println!("Completed ({})", completed.len());
            for todo in completed {
                println!("{}", todo::view(todo));
            }
        }
        Command::Add {
            title,
            description,
            priority,
            category,
        } => {
            let todo = client
                .add_todo(&NewTodo {
                    title,
                    description,
                    priority,
                    category,
                })
                .await?;

            println!("Todo added successfully");
            println!("{}", todo::view(&todo));
        }
        Command::Edit {
            id,
            title,
            description,
            priority,
            category,
        } => {
            let patch = TodoPatch {
                title,
                description,
                priority,
                category,
                ..Default::default()
            };
            if patch.is_empty() {
                eyre::bail!("nothing to change");
            }

            update(&client, &id, patch).await?;
        }
        Command::Done { id } => update(&client, &id, TodoPatch::completed(true)).await?,
        Command::Undo { id } => update(&client, &id, TodoPatch::completed(false)).await?,
        Command::Rm { id } => {
            let id = resolve(&client, &id).await?;
            client.delete_todo(id).await?;

            println!("Todo deleted successfully");
        }
        Command::Summary { send } => {
            let summary = client.generate_summary().await?;
            println!("{summary}");

            if send {
                let message = client.send_summary(summary).await?;
                println!();
                println!("{message}");
            }
        }
    }

    Ok(())
}

async fn resolve(client: &Client, id: &str) -> eyre::Result<uuid::Uuid> {
    let todos = client.get_todos().await?;
    todo::resolve(&todos, id)
}

async fn update(client: &Client, id: &str, patch: TodoPatch) -> eyre::Result<()> {
    let id = resolve(client, id).await?;
    let todo = client.update_todo(id, &patch).await?;

    println!("Todo updated successfully");
    println!("{}", todo::view(&todo));

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn add_parses_priority() {
        let cli = Cli::try_parse_from(["recap", "add", "Write report", "-p", "high"]).unwrap();

        match cli.command {
            Command::Add {
                title, priority, ..
            } => {
                assert_eq!(title, "Write report");
                assert_eq!(priority, Some(Priority::High));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
