//! Interactive topic creation on top of the proposition workflow.

use std::sync::Arc;

use anyhow::{bail, Result};
use client_core::{
    ArgumentBundle, DebateBackend, DraftArgument, PropositionWorkflow, SubmitOutcome,
    WorkflowError,
};
use shared::protocol::ValidationResult;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Select(usize),
    Original,
    Retry(String),
    Cancel,
    Unknown,
}

/// `<n>` picks suggestion n, `o` keeps the original, `r <text>` revalidates,
/// `c` cancels.
pub fn parse_decision(line: &str) -> Decision {
    let line = line.trim();
    if let Ok(n) = line.parse::<usize>() {
        return if n == 0 {
            Decision::Unknown
        } else {
            Decision::Select(n - 1)
        };
    }
    match line {
        "o" | "original" => Decision::Original,
        "c" | "cancel" => Decision::Cancel,
        _ => match line.split_once(char::is_whitespace) {
            Some(("r" | "retry", text)) => Decision::Retry(text.trim().to_string()),
            _ => Decision::Unknown,
        },
    }
}

/// Parses `title::content[::sources]`.
pub fn parse_draft(raw: &str) -> Result<DraftArgument> {
    let mut parts = raw.splitn(3, "::");
    let title = parts.next().unwrap_or_default().trim();
    let Some(content) = parts.next().map(str::trim) else {
        bail!("argument '{raw}' must look like 'title::content[::sources]'");
    };
    let mut draft = DraftArgument::new(title, content);
    if let Some(sources) = parts.next().map(str::trim).filter(|s| !s.is_empty()) {
        draft = draft.with_sources(sources);
    }
    Ok(draft)
}

pub async fn run(
    backend: Arc<dyn DebateBackend>,
    author: &str,
    proposition: &str,
    bundle: ArgumentBundle,
) -> Result<()> {
    if !bundle.has_submittable() {
        return Err(WorkflowError::NoArguments.into());
    }

    let workflow = PropositionWorkflow::new(backend);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut result = match workflow.submit(proposition, &bundle, author).await? {
        SubmitOutcome::Validated(result) => result,
        SubmitOutcome::Committed(receipt) => {
            println!("Created topic {}", receipt.topic_id);
            return Ok(());
        }
    };

    loop {
        let remaining = workflow.snapshot().await.attempts_remaining();
        print_validation(&result, remaining);
        let Some(line) = lines.next_line().await? else {
            workflow.cancel().await;
            bail!("input closed before a proposition was confirmed");
        };

        match parse_decision(&line) {
            Decision::Select(index) => {
                let Some(suggestion) = result.suggestions.get(index) else {
                    eprintln!("No suggestion #{}", index + 1);
                    continue;
                };
                workflow.select_suggestion(suggestion).await?;
                break;
            }
            Decision::Original => match workflow.continue_with_original().await {
                Ok(_) => break,
                Err(err) => eprintln!("{err}"),
            },
            Decision::Retry(text) => match workflow.retry(&text).await {
                Ok(next) => result = next,
                Err(err @ WorkflowError::Backend(_)) | Err(err @ WorkflowError::EmptyInput) => {
                    eprintln!("{err}")
                }
                Err(err @ WorkflowError::MaxAttemptsExceeded { .. }) => eprintln!("{err}"),
                Err(err) => return Err(err.into()),
            },
            Decision::Cancel => {
                workflow.cancel().await;
                println!("Cancelled.");
                return Ok(());
            }
            Decision::Unknown => eprintln!("Enter a suggestion number, 'o', 'r <text>' or 'c'."),
        }
    }

    let confirmed = workflow.snapshot().await.confirmed.unwrap_or_default();
    println!("Confirmed proposition: {confirmed}");
    commit_with_retry(&workflow, &bundle, author, &mut lines).await
}

async fn commit_with_retry(
    workflow: &PropositionWorkflow,
    bundle: &ArgumentBundle,
    author: &str,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<()> {
    loop {
        let report = match workflow.commit(bundle, author).await {
            Ok(receipt) => {
                println!(
                    "Created topic {} with {} argument(s)",
                    receipt.topic_id,
                    receipt.argument_ids.len()
                );
                return Ok(());
            }
            Err(WorkflowError::Commit(report)) => report,
            Err(err) => return Err(err.into()),
        };

        eprintln!("{report}");
        for rejection in &report.rejections {
            eprintln!(
                "  {} #{} '{}': {}",
                rejection.side,
                rejection.index + 1,
                rejection.title,
                rejection.message
            );
            if let Some(reasoning) = &rejection.reasoning {
                eprintln!("    {reasoning}");
            }
        }
        if report
            .halted_by
            .as_ref()
            .is_some_and(|err| err.requires_reauth())
        {
            bail!("session expired; sign in again");
        }

        println!("Retry commit? [y/N]");
        let answer = lines.next_line().await?.unwrap_or_default();
        if !matches!(answer.trim(), "y" | "Y" | "yes") {
            workflow.cancel().await;
            return Ok(());
        }
    }
}

fn print_validation(result: &ValidationResult, attempts_remaining: u8) {
    if result.is_valid {
        println!("'{}' is a valid proposition.", result.original_input);
    } else {
        println!(
            "'{}' was not accepted: {}",
            result.original_input,
            result.rejection_reason.as_deref().unwrap_or("no reason given")
        );
    }
    if let Some(interpretation) = &result.interpretation {
        println!("Interpretation: {interpretation}");
    }
    for (i, suggestion) in result.suggestions.iter().enumerate() {
        println!("  {}. [{:?}] {}", i + 1, suggestion.kind, suggestion.proposition);
    }
    let original_hint = if result.is_valid { ", 'o' keep original" } else { "" };
    println!(
        "Choose: number{original_hint}, 'r <text>' retry ({attempts_remaining} left), 'c' cancel"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decisions_parse() {
        assert_eq!(parse_decision("2"), Decision::Select(1));
        assert_eq!(parse_decision("0"), Decision::Unknown);
        assert_eq!(parse_decision(" o "), Decision::Original);
        assert_eq!(parse_decision("c"), Decision::Cancel);
        assert_eq!(
            parse_decision("r Pizza should be cheaper"),
            Decision::Retry("Pizza should be cheaper".into())
        );
        assert_eq!(parse_decision("r"), Decision::Unknown);
        assert_eq!(parse_decision("maybe"), Decision::Unknown);
    }

    #[test]
    fn drafts_parse_with_optional_sources() {
        let draft = parse_draft("Productivity::Output rose 13%::https://example.org").expect("draft");
        assert_eq!(draft.title, "Productivity");
        assert_eq!(draft.content, "Output rose 13%");
        assert_eq!(draft.sources.as_deref(), Some("https://example.org"));

        let bare = parse_draft("Isolation::Teams lose cohesion").expect("draft");
        assert_eq!(bare.sources, None);

        assert!(parse_draft("title only").is_err());
    }
}
