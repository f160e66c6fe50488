//! Demo that walks a synthetic change sequence through the deduplicator
//! (stdout/log only unless Twilio credentials are present in the env).

use std::collections::BTreeSet;

use sector_watch::dedup::{evaluate, AlertDecision};
use sector_watch::notify::sms::SmsTransport;
use sector_watch::notify::AlertTransport;
use sector_watch::{AlertRecord, ChangeResult};

fn change(new: &[&str]) -> ChangeResult {
    let new_sectors: BTreeSet<String> = new.iter().map(|s| s.to_string()).collect();
    ChangeResult {
        has_changes: !new_sectors.is_empty(),
        previous_count: 0,
        current_count: new_sectors.len(),
        new_sectors,
        removed_sectors: BTreeSet::new(),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();
    let transport = SmsTransport::from_env();

    let mut history: Vec<AlertRecord> = Vec::new();
    let seq = [
        change(&["sector_105"]),
        change(&["sector_105"]), // repeat: must suppress
        change(&["sector_105", "sector_301"]),
    ];

    for c in seq {
        match evaluate("Demo - PQ23", &c, &history) {
            AlertDecision::Suppress(reason) => println!("suppressed: {reason:?}"),
            AlertDecision::Send { message, sectors } => {
                println!("send: {message}");
                if transport.is_configured() {
                    if let Err(e) = transport.send("+573001234567", &message).await {
                        eprintln!("send failed: {e}");
                    }
                }
                history.push(AlertRecord {
                    event_id: "pq23".into(),
                    sent_at: chrono::Utc::now(),
                    sectors,
                    recipient_count: 1,
                });
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    }

    println!("sms-demo done");
}
