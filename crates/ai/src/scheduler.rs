use serde::{Deserialize, Serialize};

use stockflow_core::BranchId;

use crate::job::AiJob;
use crate::result::AiError;

/// Branch scope for a job or a scheduler.
///
/// - `AllBranches`: stock is aggregated across branches (per-branch figures kept for
///   imbalance checks).
/// - `Branch`: one branch only.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "branch_id", rename_all = "snake_case")]
pub enum BranchScope {
    AllBranches,
    Branch(BranchId),
}

impl BranchScope {
    pub fn branch_id(&self) -> Option<BranchId> {
        match self {
            BranchScope::AllBranches => None,
            BranchScope::Branch(id) => Some(*id),
        }
    }

    /// Whether a scheduler with this scope may run a job scoped to `job`.
    pub fn allows(&self, job: BranchScope) -> bool {
        match self {
            BranchScope::AllBranches => true,
            BranchScope::Branch(b) => job == BranchScope::Branch(*b),
        }
    }
}

impl From<Option<BranchId>> for BranchScope {
    fn from(value: Option<BranchId>) -> Self {
        value.map_or(BranchScope::AllBranches, BranchScope::Branch)
    }
}

/// Scheduler/executor for AI jobs.
pub trait AiScheduler: Send + Sync + 'static {
    fn scope(&self) -> BranchScope;

    fn run<J: AiJob>(&self, job: J) -> Result<J::Output, AiError> {
        if !self.scope().allows(job.scope()) {
            return Err(AiError::ScopeViolation(format!(
                "scheduler scope {:?} does not cover job scope {:?}",
                self.scope(),
                job.scope()
            )));
        }
        job.run()
    }
}

/// Synchronous scheduler that runs jobs immediately in-process.
#[derive(Debug, Copy, Clone)]
pub struct LocalAiScheduler {
    scope: BranchScope,
}

impl LocalAiScheduler {
    pub fn new(scope: BranchScope) -> Self {
        Self { scope }
    }

    pub fn for_branch(branch_id: BranchId) -> Self {
        Self::new(BranchScope::Branch(branch_id))
    }
}

impl AiScheduler for LocalAiScheduler {
    fn scope(&self) -> BranchScope {
        self.scope
    }
}
