use std::sync::Arc;

use anyhow::Result;

use crate::api::ApiClient;
use nutrack_core::models::{ActionType, validate_payload};
use nutrack_core::queue::DrainOutcome;
use nutrack_core::service::NutrackService;

use super::helpers::{describe_outcome, parse_payload, print_queue_table};
use super::with_replayer;

fn print_outcome(outcome: &DrainOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        println!("{}", describe_outcome(outcome));
    }
    Ok(())
}

pub(crate) fn cmd_queue_list(svc: &NutrackService, json: bool) -> Result<()> {
    let actions = svc.queued_actions();
    let mode = if svc.is_online() { "online" } else { "offline" };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "network": mode,
                "actions": actions,
            }))?
        );
    } else if actions.is_empty() {
        eprintln!("Queue is empty ({mode})");
    } else {
        println!("{} queued action(s), network {mode}", actions.len());
        print_queue_table(&actions);
    }
    Ok(())
}

/// Queue a raw action without trying to send it.
pub(crate) fn cmd_queue_add(
    svc: &NutrackService,
    action_type: &str,
    payload: &str,
    json: bool,
) -> Result<()> {
    let action_type = ActionType::parse(action_type)?;
    let payload = parse_payload(payload)?;
    validate_payload(action_type, &payload)?;
    let action = svc.enqueue(action_type, payload);

    if json {
        println!("{}", serde_json::to_string_pretty(&action)?);
    } else {
        println!("Queued {} ({})", action.action_type, action.id);
    }
    Ok(())
}

pub(crate) async fn cmd_queue_drain(
    svc: &Arc<NutrackService>,
    api: &Arc<ApiClient>,
    json: bool,
) -> Result<()> {
    let outcome = with_replayer(svc, api, |svc, router| Ok(svc.drain(router))).await?;
    print_outcome(&outcome, json)
}

pub(crate) async fn cmd_queue_retry(
    svc: &Arc<NutrackService>,
    api: &Arc<ApiClient>,
    json: bool,
) -> Result<()> {
    let outcome = with_replayer(svc, api, |svc, router| Ok(svc.retry_queue(router))).await?;
    if !json && outcome == DrainOutcome::Offline {
        eprintln!("Still offline. Run `nutrack queue online` once the connection is back.");
        return Ok(());
    }
    print_outcome(&outcome, json)
}

pub(crate) async fn cmd_queue_online(
    svc: &Arc<NutrackService>,
    api: &Arc<ApiClient>,
    json: bool,
) -> Result<()> {
    let outcome = with_replayer(svc, api, |svc, router| {
        Ok(svc.set_connected(true, router))
    })
    .await?;
    match outcome {
        Some(outcome) => print_outcome(&outcome, json),
        None => {
            if json {
                println!("{}", serde_json::json!({ "network": "online", "drained": false }));
            } else {
                println!("Already online");
            }
            Ok(())
        }
    }
}

pub(crate) async fn cmd_queue_offline(
    svc: &Arc<NutrackService>,
    api: &Arc<ApiClient>,
    json: bool,
) -> Result<()> {
    with_replayer(svc, api, |svc, router| {
        svc.set_connected(false, router);
        Ok(())
    })
    .await?;
    if json {
        println!("{}", serde_json::json!({ "network": "offline" }));
    } else {
        println!("Offline: new logs will be queued");
    }
    Ok(())
}

pub(crate) fn cmd_queue_clear(svc: &NutrackService, json: bool) -> Result<()> {
    let removed = svc.clear_queue();
    if json {
        println!("{}", serde_json::json!({ "removed": removed }));
    } else if removed > 0 {
        println!("Removed {removed} queued action(s)");
    } else {
        eprintln!("Queue was already empty");
    }
    Ok(())
}
