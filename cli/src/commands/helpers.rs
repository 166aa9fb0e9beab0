use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde_json::Value;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrack_core::metrics::{inches_to_cm, lbs_to_kg};
use nutrack_core::models::QueuedAction;
use nutrack_core::queue::{DrainOutcome, MAX_RETRIES};

pub(crate) fn parse_serving(s: &str) -> Result<f64> {
    let trimmed = s.trim_end_matches('g').trim();
    let value: f64 = trimmed.parse().with_context(|| {
        format!("Invalid serving size: '{s}'. Use a number like '200' or '200g'")
    })?;
    if value <= 0.0 {
        bail!("Serving size must be greater than 0");
    }
    Ok(value)
}

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Convert a body weight to kilograms. Accepts `kg` or `lbs`/`lb`.
pub(crate) fn weight_to_kg(value: f64, unit: &str) -> Result<f64> {
    if !value.is_finite() || value <= 0.0 {
        bail!("Weight must be a number greater than 0");
    }
    match unit.to_lowercase().as_str() {
        "kg" => Ok(value),
        "lbs" | "lb" => {
            let kg = no_neg_zero(lbs_to_kg(value));
            eprintln!("Converting {value:.1} lbs → {kg:.2} kg");
            Ok(kg)
        }
        _ => bail!("Invalid unit '{unit}'. Use 'kg' or 'lbs'"),
    }
}

/// Convert a height to centimetres. Accepts `cm` or `in`/`inches`.
pub(crate) fn height_to_cm(value: f64, unit: &str) -> Result<f64> {
    if !value.is_finite() || value <= 0.0 {
        bail!("Height must be a number greater than 0");
    }
    match unit.to_lowercase().as_str() {
        "cm" => Ok(value),
        "in" | "inch" | "inches" => Ok(inches_to_cm(value)),
        _ => bail!("Invalid height unit '{unit}'. Use 'cm' or 'in'"),
    }
}

/// Parse a raw JSON payload given on the command line.
pub(crate) fn parse_payload(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw)
        .with_context(|| format!("Invalid JSON payload: '{}'", truncate(raw, 40)))?;
    if !value.is_object() {
        bail!("Payload must be a JSON object");
    }
    Ok(value)
}

pub(crate) fn describe_outcome(outcome: &DrainOutcome) -> String {
    match outcome {
        DrainOutcome::Offline => "Offline: queue left untouched".to_string(),
        DrainOutcome::AlreadyDraining => "A drain is already running".to_string(),
        DrainOutcome::Completed(report) if report.attempted == 0 => {
            "Queue is empty, nothing to send".to_string()
        }
        DrainOutcome::Completed(report) => {
            let mut line = format!(
                "Sent {} of {} queued action(s)",
                report.succeeded, report.attempted
            );
            if report.retained > 0 {
                line.push_str(&format!(", {} will be retried", report.retained));
            }
            if report.dropped > 0 {
                line.push_str(&format!(
                    ", {} dropped after {MAX_RETRIES} failed attempts",
                    report.dropped
                ));
            }
            line
        }
    }
}

pub(crate) fn print_queue_table(actions: &[QueuedAction]) {
    #[derive(Tabled)]
    struct QueueRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Type")]
        action_type: String,
        #[tabled(rename = "Queued at")]
        enqueued_at: String,
        #[tabled(rename = "Retries")]
        retries: String,
        #[tabled(rename = "Payload")]
        payload: String,
    }

    let rows: Vec<QueueRow> = actions
        .iter()
        .enumerate()
        .map(|(i, a)| QueueRow {
            idx: i + 1,
            id: a.id.clone(),
            action_type: a.action_type.to_string(),
            enqueued_at: a
                .enqueued_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string(),
            retries: format!("{}/{MAX_RETRIES}", a.retry_count),
            payload: truncate(&a.payload.to_string(), 40),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(4..5)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
