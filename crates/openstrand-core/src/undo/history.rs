//! History bundles: every saved step in one file.

use crate::error::{StrandError, StrandResult};
use crate::persistence::ProjectFile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Type marker of history bundles.
pub const HISTORY_TYPE: &str = "OpenStrandStudioHistory";
/// Current bundle version.
pub const HISTORY_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryState {
    pub step: usize,
    pub data: ProjectFile,
}

/// Exported undo history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryBundle {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: u32,
    pub current_step: usize,
    pub max_step: usize,
    pub states: Vec<HistoryState>,
}

impl HistoryBundle {
    pub fn new(current_step: usize, max_step: usize, states: Vec<HistoryState>) -> Self {
        Self {
            kind: HISTORY_TYPE.to_string(),
            version: HISTORY_VERSION,
            current_step,
            max_step,
            states,
        }
    }

    /// Check the marker, the version and the step numbers.
    pub fn validate(&self) -> StrandResult<()> {
        if self.kind != HISTORY_TYPE {
            return Err(StrandError::HistoryCorrupt(format!("unexpected type {:?}", self.kind)));
        }
        if self.version != HISTORY_VERSION {
            return Err(StrandError::HistoryCorrupt(format!("unsupported version {}", self.version)));
        }
        if self.states.is_empty() {
            return Err(StrandError::HistoryCorrupt("no states".to_string()));
        }
        let mut seen = BTreeSet::new();
        for state in &self.states {
            if state.step == 0 || !seen.insert(state.step) {
                return Err(StrandError::HistoryCorrupt(format!("invalid step number {}", state.step)));
            }
        }
        Ok(())
    }

    /// Parse and validate a bundle.
    pub fn from_json(json: &str) -> StrandResult<Self> {
        let bundle: Self =
            serde_json::from_str(json).map_err(|e| StrandError::HistoryCorrupt(format!("unreadable bundle: {e}")))?;
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn to_json(&self) -> StrandResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read and validate a bundle file.
    pub fn read(path: &Path) -> StrandResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            log::error!("Failed to read history {}: {e}", path.display());
            StrandError::PersistenceIo(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn write(&self, path: &Path) -> StrandResult<()> {
        std::fs::write(path, self.to_json()?).map_err(|e| {
            log::error!("Failed to write history {}: {e}", path.display());
            StrandError::PersistenceIo(format!("Failed to write {}: {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(steps: &[usize]) -> HistoryBundle {
        let states = steps
            .iter()
            .map(|&step| HistoryState {
                step,
                data: ProjectFile::default(),
            })
            .collect();
        HistoryBundle::new(1, steps.len(), states)
    }

    #[test]
    fn test_validation() {
        assert!(bundle(&[1, 2]).validate().is_ok());
        assert!(matches!(bundle(&[]).validate(), Err(StrandError::HistoryCorrupt(_))));
        assert!(matches!(bundle(&[1, 1]).validate(), Err(StrandError::HistoryCorrupt(_))));
        assert!(matches!(bundle(&[0]).validate(), Err(StrandError::HistoryCorrupt(_))));

        let mut wrong = bundle(&[1]);
        wrong.kind = "Something".to_string();
        assert!(wrong.validate().is_err());
    }

    #[test]
    fn test_unreadable_bundle_is_corrupt() {
        assert!(matches!(HistoryBundle::from_json("[1, 2"), Err(StrandError::HistoryCorrupt(_))));
        let json = bundle(&[1]).to_json().unwrap();
        assert!(json.contains(HISTORY_TYPE));
        assert_eq!(HistoryBundle::from_json(&json).unwrap().states.len(), 1);
    }
}
