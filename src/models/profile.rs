//! The `UserData` profile record.
//!
//! Fields are kept as the text the user typed; the profile is only displayed,
//! never computed on.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UserProfile {
    pub name: String,
    pub age: String,
    pub height: String,
    pub weight: String,
    pub nhs_number: String,
    pub health_type: String,
    pub daily_injections: String,
}

/// Partial update coming from the profile form. Blank fields keep the stored
/// value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub age: Option<String>,
    pub height: Option<String>,
    pub weight: Option<String>,
    pub nhs_number: Option<String>,
    pub health_type: Option<String>,
    pub daily_injections: Option<String>,
}

fn filled(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl UserProfile {
    pub fn is_blank(&self) -> bool {
        [
            &self.name,
            &self.age,
            &self.height,
            &self.weight,
            &self.nhs_number,
            &self.health_type,
            &self.daily_injections,
        ]
        .iter()
        .all(|field| field.trim().is_empty())
    }

    /// Field-by-field merge: a non-empty change wins, anything else keeps the
    /// current value.
    pub fn apply(&self, changes: &ProfileChanges) -> UserProfile {
        let pick = |change: &Option<String>, current: &String| {
            filled(change).map(str::to_string).unwrap_or_else(|| current.clone())
        };
        UserProfile {
            name: pick(&changes.name, &self.name),
            age: pick(&changes.age, &self.age),
            height: pick(&changes.height, &self.height),
            weight: pick(&changes.weight, &self.weight),
            nhs_number: pick(&changes.nhs_number, &self.nhs_number),
            health_type: pick(&changes.health_type, &self.health_type),
            daily_injections: pick(&changes.daily_injections, &self.daily_injections),
        }
    }
}

impl ProfileChanges {
    pub fn is_blank(&self) -> bool {
        [
            &self.name,
            &self.age,
            &self.height,
            &self.weight,
            &self.nhs_number,
            &self.health_type,
            &self.daily_injections,
        ]
        .iter()
        .all(|field| filled(field).is_none())
    }
}
