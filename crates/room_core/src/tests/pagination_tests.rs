use super::*;

#[test]
fn a_new_engine_is_idle() {
    let engine = PaginationEngine::new(50);
    assert_eq!(engine.phase(), PaginationPhase::Idle);
    assert!(!engine.end());
    assert!(!engine.loading_more());
    assert_eq!(engine.page_size(), 50);
}

#[test]
fn try_begin_claims_a_single_flight_slot() {
    let mut engine = PaginationEngine::new(50);
    assert!(engine.try_begin());
    assert_eq!(engine.phase(), PaginationPhase::Fetching);
    assert!(!engine.try_begin());
}

#[test]
fn a_full_page_returns_to_idle() {
    let mut engine = PaginationEngine::new(50);
    assert!(engine.try_begin());
    engine.complete(50);
    assert_eq!(engine.phase(), PaginationPhase::Idle);
    assert!(engine.try_begin());
}

#[test]
fn a_short_page_is_terminal_for_the_mount() {
    let mut engine = PaginationEngine::new(50);
    assert!(engine.try_begin());
    engine.complete(12);
    assert_eq!(engine.phase(), PaginationPhase::Exhausted);
    assert!(engine.end());
    assert!(!engine.try_begin());
}

#[test]
fn an_empty_page_is_terminal_too() {
    let mut engine = PaginationEngine::new(50);
    assert!(engine.try_begin());
    engine.complete(0);
    assert_eq!(engine.phase(), PaginationPhase::Exhausted);
}

#[test]
fn a_failed_fetch_resets_to_idle_for_retry() {
    let mut engine = PaginationEngine::new(50);
    assert!(engine.try_begin());
    engine.fail();
    assert_eq!(engine.phase(), PaginationPhase::Idle);
    assert!(!engine.end());
    assert!(engine.try_begin());
}

#[test]
fn the_exhaustion_threshold_follows_the_configured_page_size() {
    let mut engine = PaginationEngine::new(10);
    assert!(engine.try_begin());
    engine.complete(10);
    assert_eq!(engine.phase(), PaginationPhase::Idle);

    assert!(engine.try_begin());
    engine.complete(9);
    assert_eq!(engine.phase(), PaginationPhase::Exhausted);
}
