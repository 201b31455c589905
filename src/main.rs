mod chat;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use repolens_core::Exchange;
use repolens_core::bootstrap::{AppBuilder, resolve_config_path};
use repolens_core::registry::capture_snapshot;

#[derive(Parser)]
#[command(
    name = "repolens",
    version,
    about = "Chat with a cloned repository through retrieval over its indexed source"
)]
struct Cli {
    /// Path to the TOML configuration file.
    ///
    /// Falls back to `REPOLENS_CONFIG`, then `config/repolens.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the repository registry.
    Repos {
        #[command(subcommand)]
        action: ReposAction,
    },
    /// Chunk, embed and persist the index of a registered repository.
    Index { repo: String },
    /// Ask a single question and print the answer.
    Ask {
        repo: String,
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Interactive conversation. `/clear` starts over, `/history` replays it.
    Chat { repo: String },
}

#[derive(Subcommand)]
enum ReposAction {
    List,
    Show {
        id: String,
    },
    /// Record a local checkout and its directory structure.
    Register {
        #[arg(long)]
        url: String,
        #[arg(long)]
        path: PathBuf,
        #[arg(long)]
        commit: String,
    },
    /// Delete the registry record and the persisted index.
    Remove {
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber();

    let config_path = resolve_config_path(cli.config.as_deref());
    let app = AppBuilder::from_env(config_path)
        .await
        .context("failed to load configuration")?;

    match cli.command {
        Command::Repos { action } => run_repos(&app, action).await,
        Command::Index { repo } => run_index(&app, &repo).await,
        Command::Ask { repo, question } => {
            let orchestrator = app.build_orchestrator().await?;
            let mut session = app.open_session(&repo).await?;
            let outcome = orchestrator
                .submit(&mut session, &question.join(" "))
                .await?;
            print_exchange(&outcome);
            Ok(())
        }
        Command::Chat { repo } => {
            let orchestrator = app.build_orchestrator().await?;
            let mut session = app.open_session(&repo).await?;
            chat::run(&orchestrator, &mut session).await
        }
    }
}

async fn run_repos(app: &AppBuilder, action: ReposAction) -> anyhow::Result<()> {
    let registry = app.registry();
    match action {
        ReposAction::List => {
            let repos = registry.list_all()?;
            if repos.is_empty() {
                println!("no repositories registered in {}", registry.path().display());
            }
            for repo in repos {
                println!("{}\t{}\t{}", repo.id, repo.commit_hash, repo.last_updated);
            }
        }
        ReposAction::Show { id } => {
            let repo = registry.get(&id)?;
            println!("id:           {}", repo.id);
            println!("url:          {}", repo.url);
            println!("path:         {}", repo.path.display());
            println!("commit:       {}", repo.commit_hash);
            println!("last updated: {}", repo.last_updated);
            println!("\n{}", repo.structure);
        }
        ReposAction::Register { url, path, commit } => {
            let snapshot = capture_snapshot(&url, &path, &commit)?;
            registry.upsert(&snapshot)?;
            println!("registered {}", snapshot.id);
        }
        ReposAction::Remove { id, yes } => {
            let confirmed = yes
                || Confirm::new()
                    .with_prompt(format!("Remove {id} and its index?"))
                    .default(false)
                    .interact()?;
            if !confirmed {
                println!("aborted");
                return Ok(());
            }
            let removed = registry.remove(&id, &app.config().index.root).await?;
            println!("removed {}", removed.id);
        }
    }
    Ok(())
}

async fn run_index(app: &AppBuilder, repo: &str) -> anyhow::Result<()> {
    let snapshot = app.registry().get(repo)?;
    let indexer = app.build_indexer()?;
    let report = indexer
        .build(&snapshot)
        .await
        .with_context(|| format!("indexing {repo} failed"))?;

    println!(
        "indexed {}/{} files into {} chunks in {} ms ({})",
        report.files_indexed,
        report.files_scanned,
        report.chunks_created,
        report.duration_ms,
        report.index_dir.display()
    );
    for error in &report.errors {
        eprintln!("  skipped {error}");
    }
    Ok(())
}

pub(crate) fn print_exchange(exchange: &Exchange) {
    if let Some(step) = &exchange.retrieval {
        println!("{}", exchange.reply.answer);
        println!("[searched: {}]\n", step.query);
    }
    let reply = exchange.final_reply();
    println!("{}", reply.answer);
    if let Some(sources) = reply.sources.as_ref().filter(|s| !s.is_empty()) {
        println!("\nSources:");
        for source in sources {
            println!("  - {} ({}) {}", source.file_name, source.last_updated, source.url);
        }
    }
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_register() {
        let cli = Cli::try_parse_from([
            "repolens",
            "--config",
            "custom.toml",
            "repos",
            "register",
            "--url",
            "https://github.com/acme/widgets",
            "--path",
            "repos/widgets",
            "--commit",
            "abc123",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(
            cli.command,
            Command::Repos {
                action: ReposAction::Register { ref commit, .. }
            } if commit == "abc123"
        ));
    }

    #[test]
    fn ask_joins_question_words() {
        let cli = Cli::try_parse_from(["repolens", "ask", "acme/widgets", "what", "is", "main?"])
            .unwrap();
        let Command::Ask { repo, question } = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(repo, "acme/widgets");
        assert_eq!(question.join(" "), "what is main?");
    }

    #[test]
    fn ask_requires_question() {
        assert!(Cli::try_parse_from(["repolens", "ask", "acme/widgets"]).is_err());
    }

    #[test]
    fn global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["repolens", "chat", "acme/widgets", "--config", "x.toml"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
    }
}
