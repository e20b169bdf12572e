//! Coordinator states and the transitions allowed between them

use serde::Serialize;
use std::fmt;

/// Stage a failure can be attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    CheckingVersions,
    SyncingFiles,
    ProvisioningRuntime,
    PatchingBinaries,
    CheckingOptionalVariant,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::CheckingVersions => "checking versions",
            PipelineStage::SyncingFiles => "syncing files",
            PipelineStage::ProvisioningRuntime => "provisioning runtime",
            PipelineStage::PatchingBinaries => "patching binaries",
            PipelineStage::CheckingOptionalVariant => "checking optional variant",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    CheckingVersions,
    UpToDate,
    UpdateNeeded,
    SyncingFiles,
    ProvisioningRuntime,
    PatchingBinaries,
    CheckingOptionalVariant,
    Ready,
    Failed { stage: PipelineStage, error: String },
}

impl PipelineState {
    /// The stage this state belongs to, for states that do work
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            PipelineState::CheckingVersions => Some(PipelineStage::CheckingVersions),
            PipelineState::SyncingFiles => Some(PipelineStage::SyncingFiles),
            PipelineState::ProvisioningRuntime => Some(PipelineStage::ProvisioningRuntime),
            PipelineState::PatchingBinaries => Some(PipelineStage::PatchingBinaries),
            PipelineState::CheckingOptionalVariant => Some(PipelineStage::CheckingOptionalVariant),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Ready | PipelineState::Failed { .. })
    }

    pub fn can_transition_to(&self, next: &PipelineState) -> bool {
        use PipelineState::*;

        if matches!(next, Failed { .. }) {
            return !self.is_terminal();
        }

        matches!(
            (self, next),
            (CheckingVersions, UpToDate)
                | (CheckingVersions, UpdateNeeded)
                | (UpToDate, Ready)
                | (UpdateNeeded, SyncingFiles)
                | (SyncingFiles, ProvisioningRuntime)
                | (ProvisioningRuntime, PatchingBinaries)
                | (PatchingBinaries, CheckingOptionalVariant)
                | (CheckingOptionalVariant, Ready)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_path_is_linear() {
        let path = [
            PipelineState::CheckingVersions,
            PipelineState::UpdateNeeded,
            PipelineState::SyncingFiles,
            PipelineState::ProvisioningRuntime,
            PipelineState::PatchingBinaries,
            PipelineState::CheckingOptionalVariant,
            PipelineState::Ready,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(&pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
        assert!(!PipelineState::UpdateNeeded.can_transition_to(&PipelineState::PatchingBinaries));
        assert!(!PipelineState::UpToDate.can_transition_to(&PipelineState::SyncingFiles));
    }

    #[test]
    fn test_failed_reachable_from_any_non_terminal_state() {
        let failed = PipelineState::Failed {
            stage: PipelineStage::SyncingFiles,
            error: "boom".to_string(),
        };
        assert!(PipelineState::SyncingFiles.can_transition_to(&failed));
        assert!(PipelineState::UpToDate.can_transition_to(&failed));
        assert!(!PipelineState::Ready.can_transition_to(&failed));
        assert!(!failed.can_transition_to(&PipelineState::Ready));
    }

    #[test]
    fn test_failed_serializes_with_stage() {
        let failed = PipelineState::Failed {
            stage: PipelineStage::PatchingBinaries,
            error: "no artifacts".to_string(),
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["stage"], "patching_binaries");
        assert_eq!(json["error"], "no artifacts");
    }
}
