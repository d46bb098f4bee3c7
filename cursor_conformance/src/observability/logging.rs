use crate::report::{ScenarioOutcome, ScenarioStatus};
use log::Level;
use std::collections::BTreeMap;

/// `log` facade wrapper used by the harness and the suite. Metadata is
/// appended as `key=value` pairs in key order.
pub struct SuiteLogger {
    enabled: bool,
}

impl SuiteLogger {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn log_event(&self, level: Level, event: &str, metadata: &BTreeMap<&str, String>) {
        if !self.enabled {
            return;
        }
        log::log!(level, "{}", format_event(event, metadata));
    }

    pub fn log_session(&self, backend: &str, action: &str, metadata: &BTreeMap<&str, String>) {
        if !self.enabled {
            return;
        }
        let event = format!("Session {} ({})", action, backend);
        self.log_event(Level::Info, &event, metadata);
    }

    pub fn log_migration(&self, backend: &str, applied: usize) {
        if !self.enabled {
            return;
        }
        log::info!("Migrations applied: {}, backend={}", applied, backend);
    }

    pub fn log_scenario_start(&self, scenario: &str) {
        if !self.enabled {
            return;
        }
        log::debug!("Scenario started: {}", scenario);
    }

    pub fn log_outcome(&self, outcome: &ScenarioOutcome) {
        let mut metadata = BTreeMap::new();
        metadata.insert("duration_ms", outcome.duration_ms.to_string());
        metadata.insert("rows", outcome.rows_observed.to_string());
        if let Some(message) = &outcome.message {
            metadata.insert("message", message.clone());
        }

        let level = match outcome.status {
            ScenarioStatus::Passed => Level::Info,
            ScenarioStatus::Violated => Level::Warn,
            ScenarioStatus::Errored => Level::Error,
        };
        let event = format!("Scenario {}: {}", outcome.scenario.name(), outcome.status);
        self.log_event(level, &event, &metadata);
    }
}

impl Default for SuiteLogger {
    fn default() -> Self {
        Self::new(true)
    }
}

fn format_event(event: &str, metadata: &BTreeMap<&str, String>) -> String {
    let mut message = event.to_string();
    for (key, value) in metadata {
        message.push_str(&format!(", {}={}", key, value));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::Scenario;

    #[test]
    fn test_suite_logger_default_enabled() {
        assert!(SuiteLogger::default().is_enabled());
        assert!(!SuiteLogger::new(false).is_enabled());
    }

    #[test]
    fn test_format_event_orders_metadata() {
        let mut metadata = BTreeMap::new();
        metadata.insert("rows", "2".to_string());
        metadata.insert("backend", "memory".to_string());
        assert_eq!(
            format_event("Scenario done", &metadata),
            "Scenario done, backend=memory, rows=2"
        );
    }

    #[test]
    fn test_log_outcome_enabled_and_disabled() {
        let outcome = ScenarioOutcome {
            scenario: Scenario::CrossTableJoin,
            status: ScenarioStatus::Violated,
            message: Some("premature end-of-data".to_string()),
            rows_observed: 1,
            duration_ms: 3,
        };
        SuiteLogger::new(true).log_outcome(&outcome);
        SuiteLogger::new(false).log_outcome(&outcome);
    }

    #[test]
    fn test_log_session_and_migration() {
        let logger = SuiteLogger::new(true);
        let mut metadata = BTreeMap::new();
        metadata.insert("read_only", "true".to_string());
        logger.log_session("memory", "opened", &metadata);
        logger.log_migration("memory", 3);
        SuiteLogger::new(false).log_session("memory", "closed", &metadata);
    }
}
