use cursor_conformance::driver::memory::{
    Fault, HandleEvent, HandleKind, HandleRegistry, MemoryBackend, MemoryDatabase, MemorySession,
    SharedRegistry,
};
use cursor_conformance::scenarios::{join_books_by_author, nested_metadata_enumeration, Book};
use cursor_conformance::{
    with_fresh_database, ConformanceSuite, Fixture, HarnessConfig, Scenario, ScenarioStatus,
    SessionOptions, SuiteReport,
};
use std::collections::HashSet;

fn options(stream_results: bool) -> SessionOptions {
    SessionOptions {
        read_only: true,
        stream_results,
    }
}

fn library_session(faults: Vec<Fault>, stream_results: bool) -> (MemorySession, SharedRegistry) {
    let registry = HandleRegistry::shared(faults);
    let session =
        MemorySession::in_memory(MemoryDatabase::library(), options(stream_results), registry.clone());
    (session, registry)
}

fn run_with(faults: Vec<Fault>, stream_results: bool) -> SuiteReport {
    let _ = env_logger::builder().is_test(true).try_init();
    let (session, _) = library_session(faults, stream_results);
    ConformanceSuite::new(Fixture::default()).run(&session)
}

fn violated(report: &SuiteReport) -> HashSet<Scenario> {
    report
        .outcomes
        .iter()
        .filter(|o| o.status == ScenarioStatus::Violated)
        .map(|o| o.scenario)
        .collect()
}

#[test]
fn test_all_scenarios_pass_on_well_behaved_driver() {
    let report = run_with(vec![], true);
    assert_eq!(report.outcomes.len(), Scenario::ALL.len());
    assert!(report.all_passed(), "{}", report);
    for outcome in &report.outcomes {
        assert!(outcome.rows_observed > 0, "{} observed no rows", outcome.scenario);
    }
}

#[test]
fn test_all_scenarios_pass_with_buffered_results() {
    let report = run_with(vec![], false);
    assert!(report.all_passed(), "{}", report);
    assert!(!report.stream_results);
}

#[test]
fn test_cross_table_join_yields_fixture_books() {
    let (session, _) = library_session(vec![], true);
    let books = join_books_by_author(&session, &Fixture::default()).unwrap();

    let got: HashSet<Book> = books.into_iter().collect();
    let expected: HashSet<Book> = [("Book1", "Alice"), ("Book2", "Alice")]
        .iter()
        .map(|(title, author)| Book {
            title: title.to_string(),
            author: author.to_string(),
        })
        .collect();
    assert_eq!(got, expected);
}

#[test]
fn test_nested_metadata_counts_every_column() {
    let (session, _) = library_session(vec![], true);
    let names = nested_metadata_enumeration(&session).unwrap();
    assert_eq!(
        names,
        vec!["author: name", "book: title", "book: author"]
    );
}

#[test]
fn test_close_on_execute_is_flagged_everywhere() {
    let report = run_with(vec![Fault::CloseOpenCursorsOnExecute], true);
    assert_eq!(violated(&report), Scenario::ALL.iter().copied().collect());
}

#[test]
fn test_buffered_results_mask_close_on_execute() {
    let report = run_with(vec![Fault::CloseOpenCursorsOnExecute], false);
    assert!(report.all_passed(), "{}", report);
}

#[test]
fn test_error_at_end_of_data_is_flagged_everywhere() {
    let report = run_with(vec![Fault::ErrorAtEndOfData], true);
    assert_eq!(violated(&report), Scenario::ALL.iter().copied().collect());
    let outcome = report.outcome(Scenario::InterleavedConsumption).unwrap();
    assert!(outcome.message.as_deref().unwrap_or("").contains("Fetch failed"));
}

#[test]
fn test_truncated_result_is_caught_by_row_count() {
    let report = run_with(vec![Fault::TruncateAfter(1)], true);
    assert_eq!(
        violated(&report),
        [
            Scenario::InterleavedConsumption,
            Scenario::OpenCloseNonInterference,
            Scenario::StatementIndependence,
            Scenario::ParameterizedStatementIndependence,
        ]
        .into_iter()
        .collect()
    );
    let message = report
        .outcome(Scenario::InterleavedConsumption)
        .and_then(|o| o.message.clone())
        .unwrap();
    assert!(message.contains("after 1 rows"), "{}", message);
    let message = report
        .outcome(Scenario::ParameterizedStatementIndependence)
        .and_then(|o| o.message.clone())
        .unwrap();
    assert!(message.contains("A reported end-of-data after 1 rows"), "{}", message);
}

#[test]
fn test_silent_early_end_is_flagged_by_independence_scenarios() {
    let report = run_with(vec![Fault::EndSiblingCursorsOnExecute], true);
    let flagged = violated(&report);
    for scenario in [
        Scenario::InterleavedConsumption,
        Scenario::OpenCloseNonInterference,
        Scenario::StatementIndependence,
        Scenario::ParameterizedStatementIndependence,
        Scenario::NestedMetadataEnumeration,
    ] {
        assert!(flagged.contains(&scenario), "{} passed: {}", scenario, report);
    }
    for scenario in [
        Scenario::OpenCloseNonInterference,
        Scenario::StatementIndependence,
        Scenario::ParameterizedStatementIndependence,
    ] {
        let message = report.outcome(scenario).and_then(|o| o.message.clone()).unwrap();
        assert!(message.contains("A reported end-of-data"), "{}", message);
    }
}

#[test]
fn test_buffered_results_mask_silent_early_end() {
    let report = run_with(vec![Fault::EndSiblingCursorsOnExecute], false);
    assert!(report.all_passed(), "{}", report);
}

#[test]
fn test_sibling_statement_close_is_flagged_by_independence_scenarios() {
    let report = run_with(vec![Fault::CloseSiblingStatementsOnClose], true);
    assert_eq!(
        violated(&report),
        [
            Scenario::StatementIndependence,
            Scenario::ParameterizedStatementIndependence
        ]
        .into_iter()
        .collect()
    );
}

#[test]
fn test_cursor_close_cascade_is_flagged_everywhere() {
    let report = run_with(vec![Fault::CloseAllCursorsOnCursorClose], true);
    assert_eq!(violated(&report), Scenario::ALL.iter().copied().collect());
}

#[test]
fn test_failing_scenario_does_not_stop_the_rest() {
    let _ = env_logger::builder().is_test(true).try_init();
    let (session, _) = library_session(vec![Fault::TruncateAfter(1)], true);
    let report = ConformanceSuite::new(Fixture::default())
        .only(&[Scenario::InterleavedConsumption, Scenario::CrossTableJoin])
        .run(&session);

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[0].status, ScenarioStatus::Violated);
    assert_eq!(report.outcomes[1].status, ScenarioStatus::Passed);
    assert_eq!(report.failures().count(), 1);
}

#[test]
fn test_missing_fixture_table_is_errored_not_violated() {
    let registry = HandleRegistry::shared(vec![]);
    let session = MemorySession::in_memory(MemoryDatabase::default(), options(true), registry);
    let report = ConformanceSuite::new(Fixture::default())
        .only(&[Scenario::InterleavedConsumption])
        .run(&session);
    assert_eq!(report.outcomes[0].status, ScenarioStatus::Errored);
}

#[test]
fn test_handles_are_released_in_reverse_order() {
    let (session, registry) = library_session(vec![], true);
    let report = ConformanceSuite::new(Fixture::default())
        .only(&[Scenario::CrossTableJoin])
        .run(&session);
    assert!(report.all_passed(), "{}", report);

    let registry = registry.borrow();
    assert_eq!(registry.open_handles(), 0);
    let released: Vec<(HandleKind, u64)> = registry
        .events()
        .iter()
        .filter_map(|e| match e {
            HandleEvent::Released { kind, id } => Some((*kind, *id)),
            _ => None,
        })
        .collect();
    // Authors statement 1, books statement 2, authors cursor 3, books cursor 4.
    assert_eq!(
        released,
        vec![
            (HandleKind::Cursor, 4),
            (HandleKind::Cursor, 3),
            (HandleKind::Statement, 2),
            (HandleKind::Statement, 1),
        ]
    );
}

#[test]
fn test_handles_are_released_after_violations() {
    let (session, registry) = library_session(vec![Fault::CloseAllCursorsOnCursorClose], true);
    let report = ConformanceSuite::new(Fixture::default()).run(&session);
    assert!(!report.all_passed());
    assert_eq!(registry.borrow().open_handles(), 0);
    assert!(registry
        .borrow()
        .events()
        .iter()
        .any(|e| matches!(e, HandleEvent::FaultTriggered { .. })));
}

#[test]
fn test_suite_runs_on_fresh_migrated_database() {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = MemoryBackend::default();
    let config = HarnessConfig::default();

    let report = with_fresh_database(&backend, &config, config.session, |db| {
        Ok(ConformanceSuite::new(Fixture::default()).run(db.session()))
    })
    .unwrap();

    assert!(report.all_passed(), "{}", report);
    assert_eq!(report.backend, "memory");
    assert_eq!(backend.registry().borrow().open_handles(), 0);
}

#[test]
fn test_fault_injection_through_backend() {
    let backend = MemoryBackend::default().with_faults(vec![Fault::CloseOpenCursorsOnExecute]);
    let config = HarnessConfig::default();

    let report = with_fresh_database(&backend, &config, config.session, |db| {
        Ok(ConformanceSuite::new(Fixture::default()).run(db.session()))
    })
    .unwrap();

    assert_eq!(violated(&report).len(), Scenario::ALL.len());
    assert!(backend
        .events()
        .iter()
        .any(|e| matches!(e, HandleEvent::FaultTriggered { fault: Fault::CloseOpenCursorsOnExecute, .. })));
}

#[test]
fn test_report_serializes_statuses() {
    let report = run_with(vec![Fault::TruncateAfter(1)], true);
    let json = report.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["backend"], "memory");
    assert_eq!(value["outcomes"][0]["scenario"], "interleaved_consumption");
    assert_eq!(value["outcomes"][0]["status"], "violated");
}
