//! Cursor isolation scenarios.
//!
//! Each scenario interleaves statements and cursors on one session and
//! checks that no handle observes another's advance, close or exhaustion.
//! A broken expectation is a [`ConformanceError::Violation`]; any driver
//! error raised during a step is turned into one naming that step.

mod isolation;
mod nested;
pub mod probes;

pub use nested::{
    join_books_by_author, nested_metadata_enumeration, sequential_column_count, Book,
};

use crate::driver::{Cursor, Session};
use crate::error::{ConformanceError, Result};
use crate::fixture::Fixture;
use crate::observability::SuiteLogger;
use crate::report::{ScenarioOutcome, ScenarioStatus, SuiteReport};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    InterleavedConsumption,
    OpenCloseNonInterference,
    StatementIndependence,
    ParameterizedStatementIndependence,
    NestedMetadataEnumeration,
    CrossTableJoin,
}

impl Scenario {
    pub const ALL: [Scenario; 6] = [
        Scenario::InterleavedConsumption,
        Scenario::OpenCloseNonInterference,
        Scenario::StatementIndependence,
        Scenario::ParameterizedStatementIndependence,
        Scenario::NestedMetadataEnumeration,
        Scenario::CrossTableJoin,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::InterleavedConsumption => "interleaved_consumption",
            Scenario::OpenCloseNonInterference => "open_close_non_interference",
            Scenario::StatementIndependence => "statement_independence",
            Scenario::ParameterizedStatementIndependence => "parameterized_statement_independence",
            Scenario::NestedMetadataEnumeration => "nested_metadata_enumeration",
            Scenario::CrossTableJoin => "cross_table_join",
        }
    }

    fn execute(&self, session: &dyn Session, fixture: &Fixture) -> Result<usize> {
        let check = Check::new(self.name());
        match self {
            Scenario::InterleavedConsumption => {
                isolation::interleaved_consumption(&check, session, fixture)
            }
            Scenario::OpenCloseNonInterference => {
                isolation::open_close_non_interference(&check, session, fixture)
            }
            Scenario::StatementIndependence => {
                isolation::statement_independence(&check, session, fixture)
            }
            Scenario::ParameterizedStatementIndependence => {
                isolation::parameterized_statement_independence(&check, session, fixture)
            }
            Scenario::NestedMetadataEnumeration => {
                nested_metadata_enumeration(session).map(|names| names.len())
            }
            Scenario::CrossTableJoin => {
                join_books_by_author(session, fixture).map(|books| books.len())
            }
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs scenarios against a live session and collects their outcomes.
pub struct ConformanceSuite {
    fixture: Fixture,
    scenarios: Vec<Scenario>,
    logger: SuiteLogger,
}

impl ConformanceSuite {
    pub fn new(fixture: Fixture) -> Self {
        Self {
            fixture,
            scenarios: Scenario::ALL.to_vec(),
            logger: SuiteLogger::default(),
        }
    }

    /// Restricts the run to `scenarios`, in the given order.
    pub fn only(mut self, scenarios: &[Scenario]) -> Self {
        self.scenarios = scenarios.to_vec();
        self
    }

    /// Runs every selected scenario. A failing scenario never stops the
    /// ones after it.
    pub fn run(&self, session: &dyn Session) -> SuiteReport {
        let mut report = SuiteReport::new(session.backend(), session.options().stream_results);
        for scenario in &self.scenarios {
            report.outcomes.push(self.run_scenario(session, *scenario));
        }
        report
    }

    pub fn run_scenario(&self, session: &dyn Session, scenario: Scenario) -> ScenarioOutcome {
        self.logger.log_scenario_start(scenario.name());
        let started = Instant::now();
        let result = scenario.execute(session, &self.fixture);
        let duration_ms = started.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(rows_observed) => ScenarioOutcome {
                scenario,
                status: ScenarioStatus::Passed,
                message: None,
                rows_observed,
                duration_ms,
            },
            Err(e) => ScenarioOutcome {
                scenario,
                status: match e {
                    ConformanceError::Violation { .. } => ScenarioStatus::Violated,
                    _ => ScenarioStatus::Errored,
                },
                message: Some(e.message()),
                rows_observed: 0,
                duration_ms,
            },
        };
        self.logger.log_outcome(&outcome);
        outcome
    }
}

/// Step helpers of one scenario.
pub(crate) struct Check {
    scenario: &'static str,
}

impl Check {
    pub(crate) fn new(scenario: &'static str) -> Self {
        Self { scenario }
    }

    pub(crate) fn violation(&self, message: impl Into<String>) -> ConformanceError {
        ConformanceError::violation(self.scenario, message)
    }

    /// Turns an error raised by `step` into a violation naming it.
    pub(crate) fn step<T>(&self, step: &str, result: Result<T>) -> Result<T> {
        result.map_err(|e| match e {
            ConformanceError::Violation { .. } => e,
            other => self.violation(format!("{} failed: {}", step, other)),
        })
    }

    pub(crate) fn require(&self, condition: bool, message: impl FnOnce() -> String) -> Result<()> {
        if condition {
            Ok(())
        } else {
            Err(self.violation(message()))
        }
    }

    /// Advances `cursor`, which must still have a row.
    pub(crate) fn expect_row(&self, cursor: &mut dyn Cursor, label: &str) -> Result<()> {
        let position = cursor.position();
        let advanced = self.step(&format!("advancing {}", label), cursor.advance())?;
        self.require(advanced, || {
            format!("{} reported end-of-data after {} rows", label, position)
        })
    }

    /// Advances `cursor` until end-of-data; returns its final position.
    pub(crate) fn drain(&self, cursor: &mut dyn Cursor, label: &str) -> Result<usize> {
        while self.step(&format!("advancing {}", label), cursor.advance())? {}
        Ok(cursor.position())
    }

    pub(crate) fn expect_open(&self, cursor: &dyn Cursor, label: &str, when: &str) -> Result<()> {
        self.require(!cursor.is_closed(), || {
            format!("{} reports closed {} without being closed", label, when)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_names_are_unique_snake_case() {
        let names: std::collections::HashSet<&str> =
            Scenario::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), Scenario::ALL.len());
        for scenario in Scenario::ALL {
            let json = serde_json::to_string(&scenario).unwrap();
            assert_eq!(json, format!("\"{}\"", scenario.name()));
        }
    }

    #[test]
    fn test_step_wraps_driver_errors() {
        let check = Check::new("demo");
        let err = check
            .step::<()>("advancing A", Err(ConformanceError::driver("24000", "gone")))
            .unwrap_err();
        match err {
            ConformanceError::Violation { scenario, message } => {
                assert_eq!(scenario, "demo");
                assert!(message.starts_with("advancing A failed"));
            }
            other => panic!("Expected Violation, got {:?}", other),
        }
    }

    #[test]
    fn test_step_keeps_violations() {
        let check = Check::new("demo");
        let original = ConformanceError::violation("inner", "kept");
        let err = check.step::<()>("x", Err(original.clone())).unwrap_err();
        assert_eq!(err.to_string(), original.to_string());
    }

    #[test]
    fn test_require() {
        let check = Check::new("demo");
        assert!(check.require(true, || unreachable!()).is_ok());
        assert!(matches!(
            check.require(false, || "nope".to_string()),
            Err(ConformanceError::Violation { .. })
        ));
    }
}
