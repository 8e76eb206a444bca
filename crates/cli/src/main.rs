//! Threadline CLI: the main entry point.
//!
//! Commands:
//! - `prompt`: Ask the model, chaining onto earlier prompts
//! - `log`: List stored prompts, newest first
//! - `topic`: List topics by latest activity
//! - `delete`: Delete a prompt nothing depends on
//! - `hide`: Hide or unhide a topic

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "threadline",
    about = "Threadline: chained prompts with a navigable history",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a request to the model
    Prompt {
        /// Hash of the prompt to continue from
        #[arg(short, long)]
        parent: Option<String>,

        /// Hash of a prompt to pull in as a reference (repeatable)
        #[arg(short, long = "reference")]
        references: Vec<String>,

        /// File with instructions (repeatable)
        #[arg(short, long = "instruct")]
        instruct: Vec<std::path::PathBuf>,

        /// File with context (repeatable)
        #[arg(short, long = "context")]
        context: Vec<std::path::PathBuf>,

        /// Send the request as the output of this function
        #[arg(long = "function")]
        function_name: Option<String>,

        /// The request text
        text: String,
    },

    /// List stored prompts, newest first
    Log {
        /// Number of prompts to skip
        #[arg(long, default_value_t = 0)]
        skip: usize,

        /// Maximum number of prompts to show
        #[arg(short = 'n', long, default_value_t = 10)]
        max_count: usize,

        /// Restrict to the topic rooted at this hash
        #[arg(short, long)]
        topic: Option<String>,
    },

    /// List topics by latest activity
    Topic {
        /// Number of topics to skip
        #[arg(long, default_value_t = 0)]
        skip: usize,

        /// Maximum number of topics to show
        #[arg(short = 'n', long, default_value_t = 10)]
        max_count: usize,

        /// Include hidden topics
        #[arg(short, long)]
        all: bool,
    },

    /// Delete a prompt that has no children and is not referenced
    Delete {
        /// Hash of the prompt
        hash: String,
    },

    /// Hide a topic from `topic` listings
    Hide {
        /// Hash of the topic root
        hash: String,

        /// Show the topic again
        #[arg(long)]
        unhide: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing; stdout carries command output, logs go to stderr
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Prompt {
            parent,
            references,
            instruct,
            context,
            function_name,
            text,
        } => {
            commands::prompt::run(commands::prompt::PromptArgs {
                text,
                parent,
                references,
                instruct,
                context,
                function_name,
            })
            .await?
        }
        Commands::Log {
            skip,
            max_count,
            topic,
        } => commands::history::log(skip, max_count, topic.as_deref()).await?,
        Commands::Topic {
            skip,
            max_count,
            all,
        } => commands::history::topics(skip, max_count, all).await?,
        Commands::Delete { hash } => commands::graph::delete(&hash).await?,
        Commands::Hide { hash, unhide } => commands::graph::hide(&hash, !unhide).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prompt_with_links() {
        let cli = Cli::try_parse_from([
            "threadline",
            "prompt",
            "-p",
            "abc",
            "-r",
            "r1",
            "--reference",
            "r2",
            "-c",
            "notes.md",
            "what next?",
        ])
        .unwrap();
        match cli.command {
            Commands::Prompt {
                parent,
                references,
                context,
                text,
                ..
            } => {
                assert_eq!(parent.as_deref(), Some("abc"));
                assert_eq!(references, vec!["r1", "r2"]);
                assert_eq!(context.len(), 1);
                assert_eq!(text, "what next?");
            }
            _ => panic!("expected prompt command"),
        }
    }

    #[test]
    fn log_defaults() {
        let cli = Cli::try_parse_from(["threadline", "log"]).unwrap();
        match cli.command {
            Commands::Log {
                skip,
                max_count,
                topic,
            } => {
                assert_eq!(skip, 0);
                assert_eq!(max_count, 10);
                assert!(topic.is_none());
            }
            _ => panic!("expected log command"),
        }
    }

    #[test]
    fn hide_with_unhide_flag() {
        let cli = Cli::try_parse_from(["threadline", "hide", "abc", "--unhide", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Hide { unhide: true, .. }));
    }
}
