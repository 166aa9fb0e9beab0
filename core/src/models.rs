use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metrics::{ActivityLevel, BiometricInput, Gender, Goal};

/// Kind of user mutation that can wait in the offline queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    FoodLog,
    WaterLog,
    ExerciseLog,
    WeightLog,
    Post,
}

impl ActionType {
    pub const ALL: [ActionType; 5] = [
        Self::FoodLog,
        Self::WaterLog,
        Self::ExerciseLog,
        Self::WeightLog,
        Self::Post,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FoodLog => "food_log",
            Self::WaterLog => "water_log",
            Self::ExerciseLog => "exercise_log",
            Self::WeightLog => "weight_log",
            Self::Post => "post",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let lower = s.to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
                anyhow::anyhow!(
                    "Invalid action type '{s}'. Must be one of: {}",
                    names.join(", ")
                )
            })
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    pub id: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
}

impl QueuedAction {
    #[must_use]
    pub fn new(action_type: ActionType, payload: Value) -> Self {
        let now = Utc::now();
        Self {
            id: generate_action_id(now),
            action_type,
            payload,
            enqueued_at: now,
            retry_count: 0,
        }
    }
}

/// `<unix-millis>-<random>`; the random half keeps ids unique within a millisecond.
fn generate_action_id(now: DateTime<Utc>) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", now.timestamp_millis(), &random[..9])
}

/// Stored biometrics for the current user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiometricProfile {
    pub weight_kg: f64,
    pub height_cm: f64,
    pub age_years: u32,
    pub gender: Gender,
    pub activity_level: ActivityLevel,
    pub goal: Goal,
    #[serde(default)]
    pub updated_at: String,
}

impl BiometricProfile {
    #[must_use]
    pub fn to_input(&self) -> BiometricInput {
        BiometricInput {
            weight_kg: self.weight_kg,
            height_cm: self.height_cm,
            age_years: self.age_years,
            gender: self.gender,
            activity_level: self.activity_level,
            goal: self.goal,
        }
    }
}

pub const MEAL_TYPES: &[&str] = &["breakfast", "lunch", "dinner", "snack"];

pub fn validate_meal_type(meal: &str) -> Result<String> {
    let lower = meal.to_lowercase();
    if MEAL_TYPES.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        bail!(
            "Invalid meal type '{meal}'. Must be one of: {}",
            MEAL_TYPES.join(", ")
        )
    }
}

pub fn validate_profile(profile: &BiometricProfile) -> Result<()> {
    if !profile.weight_kg.is_finite() || profile.weight_kg <= 0.0 {
        bail!("weight_kg must be a number greater than 0");
    }
    if !profile.height_cm.is_finite() || profile.height_cm <= 0.0 {
        bail!("height_cm must be a number greater than 0");
    }
    if profile.age_years == 0 {
        bail!("age_years must be greater than 0");
    }
    Ok(())
}

fn positive_field(payload: &Value, field: &str) -> Result<f64> {
    match payload.get(field).and_then(Value::as_f64) {
        Some(v) if v > 0.0 => Ok(v),
        Some(_) => bail!("{field} must be greater than 0"),
        None => bail!("{field} is required and must be a number"),
    }
}

fn non_empty_field<'a>(payload: &'a Value, field: &str) -> Result<&'a str> {
    match payload.get(field).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => bail!("{field} must not be empty"),
    }
}

/// Check a payload before it is queued. The queue itself never inspects payloads.
pub fn validate_payload(action_type: ActionType, payload: &Value) -> Result<()> {
    if !payload.is_object() {
        bail!("{action_type} payload must be a JSON object");
    }
    match action_type {
        ActionType::FoodLog => {
            if payload.get("food_id").and_then(Value::as_i64).is_none() {
                bail!("food_id is required and must be an integer");
            }
            positive_field(payload, "serving_g")?;
            validate_meal_type(non_empty_field(payload, "meal_type")?)?;
        }
        ActionType::WaterLog => {
            positive_field(payload, "amount_ml")?;
        }
        ActionType::ExerciseLog => {
            non_empty_field(payload, "name")?;
            positive_field(payload, "duration_min")?;
        }
        ActionType::WeightLog => {
            positive_field(payload, "weight_kg")?;
        }
        ActionType::Post => {
            non_empty_field(payload, "content")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_meal_types() {
        assert_eq!(validate_meal_type("breakfast").unwrap(), "breakfast");
        assert_eq!(validate_meal_type("Lunch").unwrap(), "lunch");
        assert!(validate_meal_type("brunch").is_err());
        assert!(validate_meal_type("").is_err());
    }

    #[test]
    fn test_action_type_parse() {
        assert_eq!(ActionType::parse("food_log").unwrap(), ActionType::FoodLog);
        assert_eq!(ActionType::parse("Water-Log").unwrap(), ActionType::WaterLog);
        assert_eq!(ActionType::parse("post").unwrap(), ActionType::Post);
        assert!(ActionType::parse("sleep_log").is_err());
    }

    #[test]
    fn test_queued_action_serializes_type_field() {
        let action = QueuedAction::new(ActionType::WaterLog, json!({ "amount_ml": 250 }));
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["type"], "water_log");
        assert_eq!(value["retry_count"], 0);
        assert_eq!(value["payload"]["amount_ml"], 250);
    }

    #[test]
    fn test_action_ids_unique() {
        let a = QueuedAction::new(ActionType::Post, json!({}));
        let b = QueuedAction::new(ActionType::Post, json!({}));
        assert_ne!(a.id, b.id);
        let (millis, random) = a.id.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(random.len(), 9);
    }

    #[test]
    fn test_retry_count_defaults_when_missing() {
        let raw = r#"{"id":"1-abc","type":"post","payload":{"content":"hi"},"enqueued_at":"2024-06-15T12:00:00Z"}"#;
        let action: QueuedAction = serde_json::from_str(raw).unwrap();
        assert_eq!(action.retry_count, 0);
        assert_eq!(action.action_type, ActionType::Post);
    }

    #[test]
    fn test_validate_food_log_payload() {
        let ok = json!({ "food_id": 12, "serving_g": 150.0, "meal_type": "lunch" });
        assert!(validate_payload(ActionType::FoodLog, &ok).is_ok());

        let bad_meal = json!({ "food_id": 12, "serving_g": 150.0, "meal_type": "brunch" });
        assert!(validate_payload(ActionType::FoodLog, &bad_meal).is_err());

        let zero_serving = json!({ "food_id": 12, "serving_g": 0, "meal_type": "lunch" });
        assert!(validate_payload(ActionType::FoodLog, &zero_serving).is_err());

        let missing_food = json!({ "serving_g": 100, "meal_type": "lunch" });
        assert!(validate_payload(ActionType::FoodLog, &missing_food).is_err());
    }

    #[test]
    fn test_validate_other_payloads() {
        assert!(validate_payload(ActionType::WaterLog, &json!({ "amount_ml": 250 })).is_ok());
        assert!(validate_payload(ActionType::WaterLog, &json!({ "amount_ml": -1 })).is_err());

        let run = json!({ "name": "Running", "duration_min": 30 });
        assert!(validate_payload(ActionType::ExerciseLog, &run).is_ok());
        let unnamed = json!({ "name": " ", "duration_min": 30 });
        assert!(validate_payload(ActionType::ExerciseLog, &unnamed).is_err());

        assert!(validate_payload(ActionType::WeightLog, &json!({ "weight_kg": 72.4 })).is_ok());
        assert!(validate_payload(ActionType::WeightLog, &json!({ "weight_kg": 0 })).is_err());

        assert!(validate_payload(ActionType::Post, &json!({ "content": "Day 3!" })).is_ok());
        assert!(validate_payload(ActionType::Post, &json!({ "content": "" })).is_err());
    }

    #[test]
    fn test_validate_payload_rejects_non_objects() {
        assert!(validate_payload(ActionType::Post, &json!("hello")).is_err());
        assert!(validate_payload(ActionType::WaterLog, &json!([250])).is_err());
    }

    #[test]
    fn test_validate_profile() {
        let mut profile = BiometricProfile {
            weight_kg: 70.0,
            height_cm: 175.0,
            age_years: 25,
            gender: Gender::Male,
            activity_level: ActivityLevel::Light,
            goal: Goal::Maintain,
            updated_at: String::new(),
        };
        assert!(validate_profile(&profile).is_ok());

        profile.height_cm = 0.0;
        assert!(validate_profile(&profile).is_err());

        profile.height_cm = f64::INFINITY;
        assert!(validate_profile(&profile).is_err());

        profile.height_cm = 175.0;
        profile.weight_kg = f64::NAN;
        assert!(validate_profile(&profile).is_err());

        profile.weight_kg = 70.0;
        profile.age_years = 0;
        assert!(validate_profile(&profile).is_err());
    }
}
