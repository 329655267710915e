use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

/// Steps of the provisioning workflow. `Failed` is reachable from every step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningState {
    Idle,
    Validating,
    ExtractingText,
    CreatingAgent,
    PersistingProfile,
    Done,
    Failed,
}

impl ProvisioningState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProvisioningState::Done | ProvisioningState::Failed)
    }

    pub fn can_advance_to(self, next: ProvisioningState) -> bool {
        use ProvisioningState::*;
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Failed) => self != Idle,
            (Idle, Validating) => true,
            (Validating, ExtractingText | CreatingAgent) => true,
            (ExtractingText, CreatingAgent) => true,
            (CreatingAgent, PersistingProfile) => true,
            (PersistingProfile, Done) => true,
            _ => false,
        }
    }
}

/// Ordered record of the states one workflow run passed through.
#[derive(Debug, Clone)]
pub struct StateTrail {
    user_id: Uuid,
    states: Vec<ProvisioningState>,
}

impl StateTrail {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            states: vec![ProvisioningState::Idle],
        }
    }

    pub fn current(&self) -> ProvisioningState {
        self.states
            .last()
            .copied()
            .unwrap_or(ProvisioningState::Idle)
    }

    pub fn advance(&mut self, next: ProvisioningState) {
        let current = self.current();
        if !current.can_advance_to(next) {
            warn!(
                "Unexpected provisioning transition {current:?} -> {next:?} for user {}",
                self.user_id
            );
        }
        info!("Provisioning {current:?} -> {next:?} for user {}", self.user_id);
        self.states.push(next);
    }

    pub fn fail(&mut self) {
        self.advance(ProvisioningState::Failed);
    }

    pub fn states(&self) -> &[ProvisioningState] {
        &self.states
    }
}
