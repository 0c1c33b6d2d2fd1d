use crate::result::AiError;
use crate::scheduler::BranchScope;

/// A branch-scoped inference unit.
///
/// Jobs run over an input snapshot supplied by the caller (infra builds it from the
/// ledger and the sales history). They never touch ledger state.
pub trait AiJob: Send + Sync + 'static {
    type Input: Send + Sync + 'static;
    type Output;

    /// Branch scope the job's input was built for.
    fn scope(&self) -> BranchScope;

    /// The input snapshot the job will run on.
    fn input(&self) -> &Self::Input;

    /// Execute the job.
    fn run(&self) -> Result<Self::Output, AiError>;
}
