mod config;
mod new_topic;

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    AnonymousSession, ArgumentBundle, DebateClient, SessionProvider, StaticSession, VoteLedger,
};
use shared::{
    domain::{ArgumentId, Side, SideFilter, TopicId, VoteDirection},
    protocol::ArgumentView,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{load_settings, prepare_api_url};

#[derive(Parser, Debug)]
#[command(name = "debate", about = "Command-line client for the debate backend")]
struct Args {
    /// Overrides `api_url` from settings.
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Overrides `author` from settings.
    #[arg(long, global = true)]
    author: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all topics.
    Topics,
    /// Show one topic with its arguments.
    Topic {
        topic_id: TopicId,
        #[arg(long, value_enum)]
        side: Option<SideArg>,
        /// Only arguments that passed fact checking.
        #[arg(long)]
        verified: bool,
    },
    /// Validate a proposition, confirm it and create the topic with its arguments.
    New {
        #[arg(long)]
        proposition: String,
        /// `title::content[::sources]`, repeatable.
        #[arg(long = "pro")]
        pro: Vec<String>,
        /// `title::content[::sources]`, repeatable.
        #[arg(long = "con")]
        con: Vec<String>,
    },
    Vote {
        argument_id: i64,
        #[arg(value_enum)]
        direction: DirectionArg,
    },
    Comments {
        argument_id: i64,
    },
    Comment {
        argument_id: i64,
        text: String,
    },
    /// Generate the topic summary.
    Summary {
        topic_id: TopicId,
    },
    /// Fact-check a single argument.
    Verify {
        argument_id: i64,
    },
    /// Fact-check every argument in a topic.
    VerifyAll {
        topic_id: TopicId,
    },
    Logout,
    DeleteAccount,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SideArg {
    Pro,
    Con,
    Both,
}

impl From<SideArg> for SideFilter {
    fn from(value: SideArg) -> Self {
        match value {
            SideArg::Pro => SideFilter::Pro,
            SideArg::Con => SideFilter::Con,
            SideArg::Both => SideFilter::Both,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DirectionArg {
    Up,
    Down,
}

impl From<DirectionArg> for VoteDirection {
    fn from(value: DirectionArg) -> Self {
        match value {
            DirectionArg::Up => VoteDirection::Upvote,
            DirectionArg::Down => VoteDirection::Downvote,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(api_url) = args.api_url {
        settings.api_url = api_url;
    }
    if let Some(author) = args.author {
        settings.author = author;
    }
    let api_url = prepare_api_url(&settings.api_url)?;

    let session: Arc<dyn SessionProvider> = match settings.access_token.clone() {
        Some(token) => Arc::new(StaticSession::new(token)),
        None => Arc::new(AnonymousSession),
    };
    let client = Arc::new(DebateClient::with_timeout(
        &api_url,
        session,
        settings.request_timeout(),
    )?);
    info!("cli: using backend api_url={api_url}");

    match args.command {
        Command::Topics => {
            for topic in client.list_topics().await? {
                println!(
                    "{}  {}  (pro {}, con {})",
                    topic.id, topic.proposition, topic.pro_count, topic.con_count
                );
            }
        }
        Command::Topic {
            topic_id,
            side,
            verified,
        } => {
            let side = side.map(SideFilter::from);
            if verified {
                print_arguments(&client.arguments_by_validity(topic_id, side).await?);
            } else if side.is_some() {
                print_arguments(&client.list_arguments(topic_id, side).await?);
            } else {
                let topic = client.get_topic(topic_id).await?;
                println!("{}", topic.proposition);
                if let Some(summary) = &topic.overall_summary {
                    println!("\n{summary}");
                }
                println!("\nPro:");
                print_arguments(&topic.pro_arguments);
                println!("\nCon:");
                print_arguments(&topic.con_arguments);
            }
        }
        Command::New {
            proposition,
            pro,
            con,
        } => {
            let mut bundle = ArgumentBundle::default();
            for raw in &pro {
                bundle.push(Side::Pro, new_topic::parse_draft(raw)?);
            }
            for raw in &con {
                bundle.push(Side::Con, new_topic::parse_draft(raw)?);
            }
            new_topic::run(client.clone(), &settings.author, &proposition, bundle).await?;
        }
        Command::Vote {
            argument_id,
            direction,
        } => {
            let argument_id = ArgumentId(argument_id);
            let ledger = VoteLedger::new(client.clone());
            let tally = ledger.cast(argument_id, direction.into()).await?;
            println!("Argument {argument_id}: {} vote(s)", tally.votes);
        }
        Command::Comments { argument_id } => {
            for comment in client.list_comments(ArgumentId(argument_id)).await? {
                match comment.created_at {
                    Some(at) => println!("[{}] {}", at.format("%Y-%m-%d %H:%M"), comment.comment),
                    None => println!("{}", comment.comment),
                }
            }
        }
        Command::Comment { argument_id, text } => {
            let created = client.add_comment(ArgumentId(argument_id), &text).await?;
            println!("Added comment {}", created.comment_id);
        }
        Command::Summary { topic_id } => {
            let summary = client.generate_summary(topic_id).await?;
            println!("{}\n", summary.overall_summary);
            println!("Consensus: {}", summary.consensus_view);
            for entry in &summary.timeline_view {
                println!("  {}: {}", entry.period, entry.description);
            }
        }
        Command::Verify { argument_id } => {
            let verdict = client.verify_argument(ArgumentId(argument_id)).await?;
            println!(
                "Validity {}/5 from {} source(s)",
                verdict.validity_score, verdict.source_count
            );
            println!("{}", verdict.reasoning);
            for url in &verdict.key_urls {
                println!("  {url}");
            }
        }
        Command::VerifyAll { topic_id } => {
            let report = client.verify_all(topic_id).await?;
            println!(
                "Verified {}/{} argument(s), {} failed",
                report.verified, report.total_arguments, report.failed
            );
            for entry in &report.results {
                let score = entry
                    .validity_score
                    .map_or_else(|| "-".to_string(), |score| score.to_string());
                println!(
                    "  {} {} [{}] {}",
                    entry.argument_id,
                    entry.title,
                    entry.status,
                    entry.error.as_deref().unwrap_or(&score)
                );
            }
        }
        Command::Logout => {
            let response = client.logout().await?;
            println!("{}", response.message);
        }
        Command::DeleteAccount => {
            let response = client.delete_account().await?;
            println!("{}", response.message);
        }
    }

    Ok(())
}

fn print_arguments(arguments: &[ArgumentView]) {
    for argument in arguments {
        let score = argument
            .validity_score
            .map(|score| format!(" validity {score}/5"))
            .unwrap_or_default();
        println!(
            "  #{} [{}] {} ({} votes{score})",
            argument.id,
            argument.side,
            argument.title,
            argument.votes.unwrap_or(0)
        );
        println!("      {}", argument.content);
        if let Some(sources) = &argument.sources {
            println!("      sources: {sources}");
        }
    }
}
