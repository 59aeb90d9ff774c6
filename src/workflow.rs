//! Program stages
//!
//! A program moves through a fixed sequence of stages. Stages up to and
//! including the current one are enabled.

use serde::Serialize;
use thiserror::Error;

pub const STAGES: [&str; 4] = [
    "Organization",
    "Program Stand-up",
    "Program Instantiation",
    "Program Evaluation",
];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("No stage at index {0}")]
    InvalidStage(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    /// -1 until a stage is chosen
    current: i64,
}

impl Default for Workflow {
    fn default() -> Self {
        Self { current: -1 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageView {
    pub index: usize,
    pub name: &'static str,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowView {
    pub current: i64,
    pub current_stage: Option<&'static str>,
    pub stages: Vec<StageView>,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> i64 {
        self.current
    }

    pub fn current_stage(&self) -> Option<&'static str> {
        usize::try_from(self.current).ok().and_then(|i| STAGES.get(i).copied())
    }

    /// Move to stage `index`; out-of-range indices leave the state unchanged
    pub fn set_stage(&mut self, index: i64) -> Result<&'static str, WorkflowError> {
        let stage = usize::try_from(index)
            .ok()
            .and_then(|i| STAGES.get(i).copied())
            .ok_or(WorkflowError::InvalidStage(index))?;
        self.current = index;
        Ok(stage)
    }

    pub fn enabled(&self, index: usize) -> bool {
        i64::try_from(index).map_or(false, |i| i <= self.current)
    }

    pub fn view(&self) -> WorkflowView {
        WorkflowView {
            current: self.current,
            current_stage: self.current_stage(),
            stages: STAGES
                .iter()
                .enumerate()
                .map(|(index, name)| StageView {
                    index,
                    name,
                    enabled: self.enabled(index),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_with_nothing_enabled() {
        let workflow = Workflow::new();
        assert_eq!(workflow.current(), -1);
        assert_eq!(workflow.current_stage(), None);
        assert!((0..STAGES.len()).all(|i| !workflow.enabled(i)));
    }

    #[test]
    fn test_set_stage_enables_earlier_stages() {
        let mut workflow = Workflow::new();
        assert_eq!(workflow.set_stage(2), Ok("Program Instantiation"));
        assert!(workflow.enabled(0));
        assert!(workflow.enabled(2));
        assert!(!workflow.enabled(3));

        let view = workflow.view();
        assert_eq!(view.current_stage, Some("Program Instantiation"));
        assert_eq!(view.stages.iter().filter(|s| s.enabled).count(), 3);
    }

    #[test]
    fn test_invalid_stage_is_rejected() {
        let mut workflow = Workflow::new();
        workflow.set_stage(1).unwrap();
        assert_eq!(workflow.set_stage(4), Err(WorkflowError::InvalidStage(4)));
        assert_eq!(workflow.set_stage(-1), Err(WorkflowError::InvalidStage(-1)));
        assert_eq!(workflow.current(), 1);
    }
}
