pub mod logging;

pub use logging::SuiteLogger;
