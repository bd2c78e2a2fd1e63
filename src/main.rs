use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{error, info};
use serde::Serialize;
use tokio::sync::watch;

use dspace_data::{
    config::Config,
    core::{traits::Identifiable, DataResult, ErrorContext, RemoteData, ServiceContainer},
    data::FindListOptions,
    eperson::{EPerson, Group},
    logging::Logger,
};

#[derive(Parser)]
#[command(name = "dspace-data", version, about = "Repository REST data-access client")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, short, global = true, default_value = "conf/dspace-data.yaml")]
    conf: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Group administration
    #[command(subcommand)]
    Groups(GroupCommand),
    /// E-person administration
    #[command(subcommand)]
    Epersons(EPersonCommand),
}

#[derive(Args)]
struct Paging {
    /// 1-based page number
    #[arg(long)]
    page: Option<u32>,
    /// Elements per page
    #[arg(long)]
    size: Option<u32>,
}

impl Paging {
    fn options(&self) -> FindListOptions {
        FindListOptions {
            current_page: self.page,
            element_count_per_page: self.size,
            ..Default::default()
        }
    }
}

#[derive(Subcommand)]
enum GroupCommand {
    List {
        #[command(flatten)]
        paging: Paging,
    },
    /// Groups whose name or uuid matches the query
    Search {
        query: String,
        #[command(flatten)]
        paging: Paging,
    },
    /// Check membership of the current user in each named group
    MemberOf { names: Vec<String> },
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    Delete { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum Scope {
    Email,
    Metadata,
}

#[derive(Subcommand)]
enum EPersonCommand {
    List {
        #[command(flatten)]
        paging: Paging,
    },
    Search {
        query: String,
        #[arg(long, value_enum, default_value = "metadata")]
        scope: Scope,
        #[command(flatten)]
        paging: Paging,
    },
    Delete { id: String },
}

/// Print the payload as JSON, or the failure on stderr. Returns whether the
/// call succeeded.
fn emit<T: Serialize>(rd: RemoteData<T>) -> DataResult<bool> {
    if let Some(message) = rd.error_message() {
        error!("Request failed: {message}");
        eprintln!("{message}");
        return Ok(false);
    }
    match rd.payload() {
        Some(payload) => {
            let out = serde_json::to_string_pretty(payload).with_context("Unable to render result")?;
            println!("{out}");
            Ok(true)
        }
        None => Ok(false),
    }
}

fn print_json(value: &serde_json::Value) -> DataResult<bool> {
    let out = serde_json::to_string_pretty(value).with_context("Unable to render result")?;
    println!("{out}");
    Ok(true)
}

async fn run_groups(container: &ServiceContainer, command: GroupCommand) -> DataResult<bool> {
    let groups = container.group_service();
    match command {
        GroupCommand::List { paging } => emit(groups.get_groups(paging.options(), &[]).terminal().await),
        GroupCommand::Search { query, paging } => emit(
            groups
                .search_groups(&query, Some(paging.options()), &[])
                .terminal()
                .await,
        ),
        GroupCommand::MemberOf { names } => {
            let answers =
                futures::future::join_all(names.iter().map(|name| groups.is_member_of(name))).await;
            let result: serde_json::Map<String, serde_json::Value> = names
                .into_iter()
                .zip(answers)
                .map(|(name, member)| (name, serde_json::Value::Bool(member)))
                .collect();
            print_json(&serde_json::Value::Object(result))
        }
        GroupCommand::Create { name, description } => {
            let mut group = Group::new(name);
            if let Some(description) = description {
                group = group.with_description(description);
            }
            emit(groups.create_or_update_group(group).terminal().await)
        }
        GroupCommand::Delete { id } => {
            let mut group = Group::new(id.clone());
            group.set_id(id);
            let deleted = groups.delete_group(&group).await;
            print_json(&serde_json::json!({ "deleted": deleted }))?;
            Ok(deleted)
        }
    }
}

async fn run_epersons(container: &ServiceContainer, command: EPersonCommand) -> DataResult<bool> {
    let epersons = container.eperson_service();
    match command {
        EPersonCommand::List { paging } => {
            emit(epersons.get_epeople(paging.options(), &[]).terminal().await)
        }
        EPersonCommand::Search {
            query,
            scope,
            paging,
        } => {
            let scope = match scope {
                Scope::Email => "email",
                Scope::Metadata => "metadata",
            };
            emit(
                epersons
                    .search_by_scope(scope, &query, Some(paging.options()), &[])
                    .terminal()
                    .await,
            )
        }
        EPersonCommand::Delete { id } => {
            let mut eperson = EPerson::new(String::new());
            eperson.set_id(id);
            let deleted = epersons.delete_eperson(&eperson).await;
            print_json(&serde_json::json!({ "deleted": deleted }))?;
            Ok(deleted)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load_from_yaml(&cli.conf) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let logger = Logger::new(config.log.clone());
    logger.init_env_logger();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let log_task = tokio::spawn(logger.run(shutdown_rx));

    info!("Using REST API at {}", config.rest.base_url);
    let result = match ServiceContainer::from_config(&config) {
        Ok(container) => match cli.command {
            Command::Groups(command) => run_groups(&container, command).await,
            Command::Epersons(command) => run_epersons(&container, command).await,
        },
        Err(e) => Err(e),
    };

    let _ = shutdown_tx.send(true);
    match log_task.await {
        Ok(Err(e)) => eprintln!("{e}"),
        Err(e) => eprintln!("Log writer task failed: {e}"),
        Ok(Ok(())) => {}
    }

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
