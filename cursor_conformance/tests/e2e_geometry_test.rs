mod helpers;
use cursor_conformance::scenarios::probes::geometry_literal_both;
use cursor_conformance::{with_fresh_database, StatementKind};
use helpers::{e2e_backend, e2e_spatial_config, should_run_e2e_tests};
use serial_test::serial;

#[test]
#[serial]
fn test_e2e_geometry_literal_prepared_and_adhoc() {
    if !should_run_e2e_tests() {
        eprintln!("⚠️  Skipping E2E test: DuckDB ODBC driver not available");
        return;
    }

    let backend = e2e_backend().expect("backend");
    let config = e2e_spatial_config().expect("config");
    let results = match with_fresh_database(&backend, &config, config.session, |db| {
        geometry_literal_both(db.session())
    }) {
        Ok(results) => results,
        Err(e) if e.is_setup_failure() => {
            eprintln!("⚠️  Skipping E2E test: spatial extension unavailable: {}", e);
            return;
        }
        Err(e) => panic!("geometry literal failed: {}", e),
    };

    let kinds: Vec<StatementKind> = results.iter().map(|(k, _)| *k).collect();
    assert_eq!(kinds, vec![StatementKind::Prepared, StatementKind::AdHoc]);
    for (kind, geom) in &results {
        assert!(!geom.is_null(), "{:?} returned NULL", kind);
    }
}
