mod length;
mod milestones;
mod transitions;

pub use length::run_length;
pub use milestones::{MilestoneProgress, MilestoneTable, NextMilestone, DEFAULT_MILESTONES};
pub use transitions::{ClosedRun, GracePolicy, StreakEngine, Transition};
