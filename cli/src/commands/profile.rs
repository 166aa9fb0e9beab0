use anyhow::{Context, Result};
use clap::Args;

use nutrack_core::metrics::{ActivityLevel, Gender, Goal};
use nutrack_core::models::BiometricProfile;
use nutrack_core::service::NutrackService;

use super::helpers::{height_to_cm, weight_to_kg};

/// Biometric fields shared by `profile set` and `targets`. Anything left out
/// falls back to the stored profile.
#[derive(Args, Debug, Default, Clone)]
pub(crate) struct ProfileArgs {
    /// Body weight
    #[arg(long)]
    pub weight: Option<f64>,
    /// Unit for --weight: kg or lbs
    #[arg(long, default_value = "kg")]
    pub weight_unit: String,
    /// Height
    #[arg(long)]
    pub height: Option<f64>,
    /// Unit for --height: cm or in
    #[arg(long, default_value = "cm")]
    pub height_unit: String,
    /// Age in years
    #[arg(long)]
    pub age: Option<u32>,
    /// Gender: male or female
    #[arg(long)]
    pub gender: Option<String>,
    /// Activity level: sedentary, light, moderate, active, very_active
    #[arg(long)]
    pub activity: Option<String>,
    /// Goal: lose, maintain, gain
    #[arg(long)]
    pub goal: Option<String>,
}

fn parse_activity(s: &str) -> ActivityLevel {
    ActivityLevel::parse(s).unwrap_or_else(|| {
        eprintln!("Note: unknown activity level '{s}', using 'light'");
        ActivityLevel::parse_lenient(s)
    })
}

/// Overlay the given args on an existing profile. Without an existing profile
/// every field must be supplied.
pub(crate) fn merge_profile(
    existing: Option<BiometricProfile>,
    args: &ProfileArgs,
) -> Result<BiometricProfile> {
    let weight_kg = match args.weight {
        Some(w) => Some(weight_to_kg(w, &args.weight_unit)?),
        None => existing.as_ref().map(|p| p.weight_kg),
    };
    let height_cm = match args.height {
        Some(h) => Some(height_to_cm(h, &args.height_unit)?),
        None => existing.as_ref().map(|p| p.height_cm),
    };
    let gender = match &args.gender {
        Some(g) => Some(Gender::parse(g)?),
        None => existing.as_ref().map(|p| p.gender),
    };
    let goal = match &args.goal {
        Some(g) => Some(Goal::parse(g)?),
        None => existing.as_ref().map(|p| p.goal),
    };
    let activity_level = args
        .activity
        .as_deref()
        .map(parse_activity)
        .or(existing.as_ref().map(|p| p.activity_level));
    let age_years = args.age.or(existing.as_ref().map(|p| p.age_years));

    let missing = "No profile stored yet. Provide --weight, --height, --age, --gender, --activity and --goal";
    Ok(BiometricProfile {
        weight_kg: weight_kg.context(missing)?,
        height_cm: height_cm.context(missing)?,
        age_years: age_years.context(missing)?,
        gender: gender.context(missing)?,
        activity_level: activity_level.context(missing)?,
        goal: goal.context(missing)?,
        updated_at: existing.map(|p| p.updated_at).unwrap_or_default(),
    })
}

pub(crate) fn print_profile(profile: &BiometricProfile) {
    println!("Weight:    {:.1} kg", profile.weight_kg);
    println!("Height:    {:.1} cm", profile.height_cm);
    println!("Age:       {}", profile.age_years);
    println!("Gender:    {}", profile.gender.as_str());
    println!("Activity:  {}", profile.activity_level.as_str());
    println!("Goal:      {}", profile.goal.as_str());
}

pub(crate) fn cmd_profile_set(svc: &NutrackService, args: &ProfileArgs, json: bool) -> Result<()> {
    let profile = merge_profile(svc.get_profile()?, args)?;
    let stored = svc.set_profile(&profile)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stored)?);
    } else {
        println!("Profile saved");
        print_profile(&stored);
    }
    Ok(())
}

pub(crate) fn cmd_profile_show(svc: &NutrackService, json: bool) -> Result<()> {
    match svc.get_profile()? {
        Some(profile) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&profile)?);
            } else {
                print_profile(&profile);
            }
        }
        None => {
            if json {
                println!("{}", serde_json::json!({ "error": "No profile stored" }));
            } else {
                eprintln!("No profile stored. Use `nutrack profile set` to create one.");
            }
        }
    }
    Ok(())
}

pub(crate) fn cmd_profile_clear(svc: &NutrackService, json: bool) -> Result<()> {
    let cleared = svc.clear_profile()?;
    if json {
        println!("{}", serde_json::json!({ "cleared": cleared }));
    } else if cleared {
        println!("Profile cleared");
    } else {
        eprintln!("No profile was stored");
    }
    Ok(())
}
