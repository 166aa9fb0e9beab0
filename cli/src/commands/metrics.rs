use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use nutrack_core::metrics::{HealthTargets, bmi};
use nutrack_core::service::NutrackService;

use super::helpers::{height_to_cm, weight_to_kg};
use super::profile::{ProfileArgs, merge_profile};

pub(crate) fn cmd_bmi(
    weight: f64,
    weight_unit: &str,
    height: f64,
    height_unit: &str,
    json: bool,
) -> Result<()> {
    let weight_kg = weight_to_kg(weight, weight_unit)?;
    let height_cm = height_to_cm(height, height_unit)?;
    let result = bmi(weight_kg, height_cm);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("BMI {:.1} ({})", result.value, result.category);
    }
    Ok(())
}

/// Daily targets from the stored profile, with any flags overriding it for
/// this calculation only.
pub(crate) fn cmd_targets(svc: &NutrackService, args: &ProfileArgs, json: bool) -> Result<()> {
    let profile = merge_profile(svc.get_profile()?, args)?;
    let targets = HealthTargets::from_input(&profile.to_input());

    if json {
        println!("{}", serde_json::to_string_pretty(&targets)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct TargetRow {
        #[tabled(rename = "Metric")]
        metric: &'static str,
        #[tabled(rename = "Value")]
        value: String,
    }

    let rows = vec![
        TargetRow {
            metric: "BMI",
            value: format!("{:.1} ({})", targets.bmi.value, targets.bmi.category),
        },
        TargetRow {
            metric: "BMR",
            value: format!("{} kcal", targets.bmr),
        },
        TargetRow {
            metric: "TDEE",
            value: format!("{} kcal", targets.tdee),
        },
        TargetRow {
            metric: "Calorie target",
            value: format!("{} kcal", targets.calorie_target),
        },
        TargetRow {
            metric: "Carbs",
            value: format!("{} g", targets.macros.carbs_g),
        },
        TargetRow {
            metric: "Protein",
            value: format!("{} g", targets.macros.protein_g),
        },
        TargetRow {
            metric: "Fat",
            value: format!("{} g", targets.macros.fat_g),
        },
        TargetRow {
            metric: "Water",
            value: format!("{} ml", targets.water_ml),
        },
    ];

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}
