//! Outcome of a suite run, serializable as JSON.

use crate::error::Result;
use crate::scenarios::Scenario;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Passed,
    /// An isolation invariant did not hold.
    Violated,
    /// The scenario could not run, e.g. the fixture query itself failed.
    Errored,
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScenarioStatus::Passed => "passed",
            ScenarioStatus::Violated => "violated",
            ScenarioStatus::Errored => "errored",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    pub status: ScenarioStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub rows_observed: usize,
    pub duration_ms: u64,
}

impl ScenarioOutcome {
    pub fn passed(&self) -> bool {
        self.status == ScenarioStatus::Passed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub backend: String,
    pub stream_results: bool,
    pub outcomes: Vec<ScenarioOutcome>,
}

impl SuiteReport {
    pub fn new(backend: impl Into<String>, stream_results: bool) -> Self {
        Self {
            backend: backend.into(),
            stream_results,
            outcomes: Vec::new(),
        }
    }

    pub fn all_passed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(ScenarioOutcome::passed)
    }

    pub fn outcome(&self, scenario: Scenario) -> Option<&ScenarioOutcome> {
        self.outcomes.iter().find(|o| o.scenario == scenario)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioOutcome> {
        self.outcomes.iter().filter(|o| !o.passed())
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} (stream_results={}):",
            self.backend, self.stream_results
        )?;
        for outcome in &self.outcomes {
            write!(f, "  {:<40} {}", outcome.scenario.name(), outcome.status)?;
            if let Some(message) = &outcome.message {
                write!(f, " - {}", message)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
