use serde::{Deserialize, Serialize};

/// Lower bound applied to weight-loss calorie targets.
pub const MIN_LOSS_CALORIES: i64 = 1200;

const LOSS_DEFICIT: i64 = 500;
const GAIN_SURPLUS: i64 = 300;
const WATER_ML_PER_KG: f64 = 35.0;

pub const KG_PER_LB: f64 = 0.453_592;
pub const CM_PER_INCH: f64 = 2.54;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "male" | "m" => Ok(Self::Male),
            "female" | "f" => Ok(Self::Female),
            _ => anyhow::bail!("Invalid gender '{s}'. Must be one of: male, female"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    pub const ALL: [ActivityLevel; 5] = [
        Self::Sedentary,
        Self::Light,
        Self::Moderate,
        Self::Active,
        Self::VeryActive,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sedentary => "sedentary",
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::Active => "active",
            Self::VeryActive => "very_active",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|level| level.as_str() == lower)
    }

    /// Unknown names fall back to `Light`, whose multiplier is the default.
    #[must_use]
    pub fn parse_lenient(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|| {
            tracing::debug!(level = s, "unrecognized activity level, using light");
            Self::Light
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    Lose,
    Maintain,
    Gain,
}

impl Goal {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lose => "lose",
            Self::Maintain => "maintain",
            Self::Gain => "gain",
        }
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "lose" => Ok(Self::Lose),
            "maintain" => Ok(Self::Maintain),
            "gain" => Ok(Self::Gain),
            _ => anyhow::bail!("Invalid goal '{s}'. Must be one of: lose, maintain, gain"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obesity,
}

impl std::fmt::Display for BmiCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Underweight => "Underweight",
            Self::Normal => "Normal",
            Self::Overweight => "Overweight",
            Self::Obesity => "Obesity",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bmi {
    pub value: f64,
    pub category: BmiCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_field_names)]
pub struct MacroDistribution {
    pub carbs_g: i64,
    pub protein_g: i64,
    pub fat_g: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiometricInput {
    pub weight_kg: f64,
    pub height_cm: f64,
    pub age_years: u32,
    pub gender: Gender,
    pub activity_level: ActivityLevel,
    pub goal: Goal,
}

/// Everything derived from one set of biometrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthTargets {
    pub bmi: Bmi,
    pub bmr: i64,
    pub tdee: i64,
    pub calorie_target: i64,
    pub macros: MacroDistribution,
    pub water_ml: i64,
}

impl HealthTargets {
    #[must_use]
    pub fn from_input(input: &BiometricInput) -> Self {
        let bmr = bmr(
            input.gender,
            input.weight_kg,
            input.height_cm,
            input.age_years,
        );
        let tdee = tdee(bmr, input.activity_level);
        let calorie_target = calorie_target(tdee, input.goal);
        Self {
            bmi: bmi(input.weight_kg, input.height_cm),
            bmr,
            tdee,
            calorie_target,
            macros: macro_distribution(calorie_target),
            water_ml: water_recommendation_ml(input.weight_kg),
        }
    }
}

fn round_to_tenth(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Body mass index, rounded to one decimal. The category is taken from the
/// rounded value. Inputs are not validated.
#[must_use]
pub fn bmi(weight_kg: f64, height_cm: f64) -> Bmi {
    let height_m = height_cm / 100.0;
    let value = round_to_tenth(weight_kg / (height_m * height_m));
    let category = if value < 18.5 {
        BmiCategory::Underweight
    } else if value < 25.0 {
        BmiCategory::Normal
    } else if value < 30.0 {
        BmiCategory::Overweight
    } else {
        BmiCategory::Obesity
    };
    Bmi { value, category }
}

/// Basal metabolic rate (Mifflin-St Jeor), in kcal/day.
#[must_use]
pub fn bmr(gender: Gender, weight_kg: f64, height_cm: f64, age_years: u32) -> i64 {
    let base = 10.0 * weight_kg + 6.25 * height_cm - 5.0 * f64::from(age_years);
    let adjusted = match gender {
        Gender::Male => base + 5.0,
        Gender::Female => base - 161.0,
    };
    adjusted.round() as i64
}

#[must_use]
pub fn activity_multiplier(level: ActivityLevel) -> f64 {
    match level {
        ActivityLevel::Sedentary => 1.2,
        ActivityLevel::Light => 1.375,
        ActivityLevel::Moderate => 1.55,
        ActivityLevel::Active => 1.725,
        ActivityLevel::VeryActive => 1.9,
    }
}

/// Multiplier for a level given by name; unknown names get 1.375.
#[must_use]
pub fn activity_multiplier_for(level: &str) -> f64 {
    activity_multiplier(ActivityLevel::parse_lenient(level))
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn tdee(bmr: i64, level: ActivityLevel) -> i64 {
    (bmr as f64 * activity_multiplier(level)).round() as i64
}

#[must_use]
pub fn calorie_target(tdee: i64, goal: Goal) -> i64 {
    match goal {
        Goal::Lose => (tdee - LOSS_DEFICIT).max(MIN_LOSS_CALORIES),
        Goal::Gain => tdee + GAIN_SURPLUS,
        Goal::Maintain => tdee,
    }
}

/// 40% carbs, 30% protein, 30% fat. Components are rounded independently,
/// so they need not add back up to `calories`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn macro_distribution(calories: i64) -> MacroDistribution {
    let cal = calories as f64;
    MacroDistribution {
        carbs_g: (cal * 0.4 / 4.0).round() as i64,
        protein_g: (cal * 0.3 / 4.0).round() as i64,
        fat_g: (cal * 0.3 / 9.0).round() as i64,
    }
}

#[must_use]
pub fn water_recommendation_ml(weight_kg: f64) -> i64 {
    (weight_kg * WATER_ML_PER_KG).round() as i64
}

#[must_use]
pub fn lbs_to_kg(lbs: f64) -> f64 {
    lbs * KG_PER_LB
}

#[must_use]
pub fn inches_to_cm(inches: f64) -> f64 {
    inches * CM_PER_INCH
}
