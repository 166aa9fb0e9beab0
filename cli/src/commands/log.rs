use std::sync::Arc;

use anyhow::{Result, bail};
use serde_json::{Value, json};

use crate::api::ApiClient;
use nutrack_core::models::{ActionType, validate_meal_type, validate_payload};
use nutrack_core::service::{NutrackService, Submission};

use super::helpers::{parse_date, parse_serving, weight_to_kg};
use super::with_replayer;

async fn submit(
    svc: &Arc<NutrackService>,
    api: &Arc<ApiClient>,
    action_type: ActionType,
    payload: Value,
    json: bool,
) -> Result<()> {
    validate_payload(action_type, &payload)?;
    let submission = with_replayer(svc, api, move |svc, router| {
        Ok(svc.submit(action_type, payload, router))
    })
    .await?;

    match submission {
        Submission::Sent => {
            if json {
                println!("{}", json!({ "status": "sent", "type": action_type }));
            } else {
                println!("Sent {action_type}");
            }
        }
        Submission::Queued(action) => {
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&json!({ "status": "queued", "action": action }))?
                );
            } else {
                println!(
                    "Saved {action_type} offline ({}); it will be sent when the connection is back",
                    action.id
                );
            }
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn cmd_log_food(
    svc: &Arc<NutrackService>,
    api: &Arc<ApiClient>,
    food_id: i64,
    serving: &str,
    meal: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let serving_g = parse_serving(serving)?;
    let meal_type = validate_meal_type(meal)?;
    let date = parse_date(date)?;
    let payload = json!({
        "food_id": food_id,
        "serving_g": serving_g,
        "meal_type": meal_type,
        "date": date.format("%Y-%m-%d").to_string(),
    });
    submit(svc, api, ActionType::FoodLog, payload, json).await
}

pub(crate) async fn cmd_log_water(
    svc: &Arc<NutrackService>,
    api: &Arc<ApiClient>,
    amount_ml: f64,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let payload = json!({
        "amount_ml": amount_ml,
        "date": date.format("%Y-%m-%d").to_string(),
    });
    submit(svc, api, ActionType::WaterLog, payload, json).await
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn cmd_log_exercise(
    svc: &Arc<NutrackService>,
    api: &Arc<ApiClient>,
    name: &str,
    duration_min: f64,
    calories: Option<f64>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    if calories.is_some_and(|c| c < 0.0) {
        bail!("Calories burned must not be negative");
    }
    let date = parse_date(date)?;
    let mut payload = json!({
        "name": name.trim(),
        "duration_min": duration_min,
        "date": date.format("%Y-%m-%d").to_string(),
    });
    if let Some(kcal) = calories {
        payload["calories_burned"] = json!(kcal);
    }
    submit(svc, api, ActionType::ExerciseLog, payload, json).await
}

#[allow(clippy::too_many_arguments)]
pub(crate) async fn cmd_log_weight(
    svc: &Arc<NutrackService>,
    api: &Arc<ApiClient>,
    value: f64,
    unit: &str,
    date: Option<String>,
    notes: Option<String>,
    json: bool,
) -> Result<()> {
    let weight_kg = weight_to_kg(value, unit)?;
    let date = parse_date(date)?;
    let mut payload = json!({
        "weight_kg": weight_kg,
        "date": date.format("%Y-%m-%d").to_string(),
    });
    if let Some(notes) = notes {
        payload["notes"] = json!(notes);
    }
    submit(svc, api, ActionType::WeightLog, payload, json).await
}

pub(crate) async fn cmd_post(
    svc: &Arc<NutrackService>,
    api: &Arc<ApiClient>,
    content: &str,
    json: bool,
) -> Result<()> {
    let payload = json!({ "content": content.trim() });
    submit(svc, api, ActionType::Post, payload, json).await
}
