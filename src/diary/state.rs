use serde::{Deserialize, Serialize};

/// Save lifecycle of one diary screen.
///
/// `Idle -> Collecting -> Saving -> Saved | Failed`, and a failed session
/// returns to `Collecting` as soon as the user edits it again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SaveState {
    #[default]
    Idle,
    Collecting,
    Saving,
    Saved,
    Failed(String),
}

impl SaveState {
    /// A slot was added or edited.
    pub fn edited(&mut self) {
        match self {
            SaveState::Idle | SaveState::Failed(_) | SaveState::Saved => {
                *self = SaveState::Collecting;
            }
            SaveState::Collecting | SaveState::Saving => {}
        }
    }

    /// Moves to `Saving`. Returns false when a save is already in flight.
    pub fn begin_save(&mut self) -> bool {
        if self.is_saving() {
            return false;
        }
        *self = SaveState::Saving;
        true
    }

    pub fn finish<T, E: ToString>(&mut self, outcome: &Result<T, E>) {
        *self = match outcome {
            Ok(_) => SaveState::Saved,
            Err(err) => SaveState::Failed(err.to_string()),
        };
    }

    pub fn is_saving(&self) -> bool {
        matches!(self, SaveState::Saving)
    }
}
