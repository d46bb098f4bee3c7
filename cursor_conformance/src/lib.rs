pub mod config;
pub mod decode;
pub mod driver;
mod error;
pub mod fixture;
pub mod harness;
pub mod migration;
pub mod observability;
pub mod report;
pub mod scenarios;
#[cfg(feature = "test-helpers")]
pub mod test_helpers;

pub use config::HarnessConfig;
pub use driver::odbc::OdbcBackend;
pub use driver::{Cursor, Session, SessionOptions, Statement, StatementKind, Value};
pub use error::{ConformanceError, ErrorCategory, Result};
pub use fixture::Fixture;
pub use harness::{with_fresh_database, Backend, FreshDatabase};
pub use report::{ScenarioOutcome, ScenarioStatus, SuiteReport};
pub use scenarios::{ConformanceSuite, Scenario};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_surface_names_every_scenario() {
        let names: Vec<&str> = Scenario::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), 6);
        assert!(names.contains(&"cross_table_join"));
    }

    #[test]
    fn test_default_session_options_are_read_only() {
        assert!(SessionOptions::default().read_only);
    }
}
