use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use layout::{check_invariants, render::render_layout, LayoutStore};
use shared::{
    error::ApiError,
    protocol::{ActionOutcome, LayoutAction, PreferenceSubmission, SubmissionReceipt},
};
use storage::{FsObjectStore, PREFERENCES_PREFIX};

#[derive(Parser, Debug)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Post one seating preference record to a running server.
    Submit {
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        server_url: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        period: String,
        #[arg(long, default_value = "")]
        preferred_partner: String,
        #[arg(long, default_value = "")]
        non_preferred_partner: String,
        #[arg(long, default_value = "")]
        preferred_location: String,
    },
    /// Apply a JSON array of layout actions to a fresh layout and print the result.
    Replay {
        actions: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List preference records stored in a filesystem bucket.
    ListSubmissions {
        #[arg(long, default_value = "./data/objects")]
        root: PathBuf,
        #[arg(long, default_value = "seating-preferences")]
        bucket: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Submit {
            server_url,
            name,
            period,
            preferred_partner,
            non_preferred_partner,
            preferred_location,
        } => {
            let submission = PreferenceSubmission {
                name,
                period,
                preferred_partner,
                non_preferred_partner,
                preferred_location,
            };
            let receipt = submit(&server_url, &submission).await?;
            println!("{} (key={})", receipt.message, receipt.key);
        }
        Command::Replay { actions, json } => {
            let raw = fs::read_to_string(&actions)
                .with_context(|| format!("failed to read '{}'", actions.display()))?;
            let (store, outcomes) = replay(&raw)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&store.snapshot())?);
            } else {
                for (i, (action, outcome)) in outcomes.iter().enumerate() {
                    match outcome {
                        ActionOutcome::Accepted => println!("#{i} {} ok", action.kind()),
                        ActionOutcome::Rejected { reason } => {
                            println!("#{i} {} rejected: {reason:?}", action.kind())
                        }
                    }
                }
                print!("{}", render_layout(store.state()));
            }
        }
        Command::ListSubmissions { root, bucket } => {
            for key in list_submissions(&root, &bucket).await? {
                println!("{key}");
            }
        }
    }

    Ok(())
}

async fn submit(server_url: &str, submission: &PreferenceSubmission) -> Result<SubmissionReceipt> {
    let url = format!("{}/api/preferences", server_url.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .post(&url)
        .json(submission)
        .send()
        .await
        .with_context(|| format!("failed to reach {url}"))?;
    let status = response.status();
    if !status.is_success() {
        let err: ApiError = response
            .json()
            .await
            .with_context(|| format!("server returned {status}"))?;
        return Err(err.into());
    }
    Ok(response.json().await?)
}

async fn list_submissions(root: &Path, bucket: &str) -> Result<Vec<String>> {
    FsObjectStore::new(root.join(bucket))
        .list_keys(PREFERENCES_PREFIX)
        .await
}

fn replay(raw: &str) -> Result<(LayoutStore, Vec<(LayoutAction, ActionOutcome)>)> {
    let actions: Vec<LayoutAction> =
        serde_json::from_str(raw).context("actions file must be a JSON array of layout actions")?;
    let mut store = LayoutStore::default();
    let outcomes = actions
        .into_iter()
        .map(|action| {
            let outcome = store.dispatch(&action);
            (action, outcome)
        })
        .collect();
    check_invariants(store.state())?;
    Ok((store, outcomes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::RejectReason;

    #[test]
    fn replay_applies_actions_in_order() {
        let raw = r#"[
            { "type": "add_student", "payload": { "name": "Alice" } },
            { "type": "add_student", "payload": { "name": "Bob" } },
            { "type": "add_row" },
            { "type": "assign_student", "payload": { "rowIndex": 1, "podIndex": 0, "studentId": 2 } },
            { "type": "select_period", "payload": { "index": 5 } }
        ]"#;
        let (store, outcomes) = replay(raw).expect("replay");
        assert_eq!(outcomes.len(), 5);
        assert!(outcomes[..4].iter().all(|(_, o)| o.is_accepted()));
        assert_eq!(
            outcomes[4].1,
            ActionOutcome::Rejected {
                reason: RejectReason::InvalidIndex
            }
        );

        let chart = render_layout(store.state());
        assert!(chart.contains("Row 2"));
        assert!(chart.contains("[Bob"));
        assert!(chart.ends_with("Unassigned: Alice\n"));
    }

    #[test]
    fn replay_rejects_non_array_input() {
        assert!(replay(r#"{ "type": "add_row" }"#).is_err());
    }

    #[tokio::test]
    async fn list_submissions_reads_fs_bucket() {
        use storage::{ObjectStore, JSON_CONTENT_TYPE};

        let temp = tempfile::tempdir().expect("tempdir");
        let store = FsObjectStore::new(temp.path().join("seating-preferences"));
        store
            .put_object("preferences/preferences-Ada-1.json", b"{}".to_vec(), JSON_CONTENT_TYPE)
            .await
            .expect("put");
        let keys = list_submissions(temp.path(), "seating-preferences")
            .await
            .expect("list");
        assert_eq!(keys, vec!["preferences/preferences-Ada-1.json".to_string()]);
    }
}
