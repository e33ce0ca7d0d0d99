use super::*;
use crate::health::ProbeOutcome;
use chrono::Duration as ChronoDuration;
use nexushub_core::ProcessState;

fn window() -> ChronoDuration {
    ChronoDuration::seconds(30)
}

#[test]
fn starting_plus_healthy_becomes_running() {
    let t = decide_health_transition(ProcessState::Starting, None, ProbeOutcome::Healthy, Utc::now(), window());
    assert_eq!(t, HealthTransition::BecameRunning);
}

#[test]
fn starting_plus_unhealthy_becomes_unhealthy() {
    let t = decide_health_transition(ProcessState::Starting, None, ProbeOutcome::Unhealthy, Utc::now(), window());
    assert_eq!(t, HealthTransition::BecameUnhealthy);
}

#[test]
fn running_plus_healthy_is_unchanged() {
    let t = decide_health_transition(ProcessState::Running, None, ProbeOutcome::Healthy, Utc::now(), window());
    assert_eq!(t, HealthTransition::Unchanged);
}

#[test]
fn running_plus_unhealthy_becomes_unhealthy() {
    let t = decide_health_transition(ProcessState::Running, None, ProbeOutcome::Unhealthy, Utc::now(), window());
    assert_eq!(t, HealthTransition::BecameUnhealthy);
}

#[test]
fn unhealthy_plus_healthy_recovers_to_running() {
    let now = Utc::now();
    let t = decide_health_transition(ProcessState::Unhealthy, Some(now), ProbeOutcome::Healthy, now, window());
    assert_eq!(t, HealthTransition::BecameRunning);
}

#[test]
fn unhealthy_persisting_past_window_becomes_failed() {
    let since = Utc::now() - ChronoDuration::seconds(31);
    let t = decide_health_transition(ProcessState::Unhealthy, Some(since), ProbeOutcome::Unhealthy, Utc::now(), window());
    assert_eq!(t, HealthTransition::BecameFailed);
}

#[test]
fn unhealthy_within_window_stays_unhealthy() {
    let since = Utc::now() - ChronoDuration::seconds(5);
    let t = decide_health_transition(ProcessState::Unhealthy, Some(since), ProbeOutcome::Unhealthy, Utc::now(), window());
    assert_eq!(t, HealthTransition::Unchanged);
}

#[test]
fn stopped_state_is_untouched_by_health_loop() {
    let t = decide_health_transition(ProcessState::Stopped, None, ProbeOutcome::Healthy, Utc::now(), window());
    assert_eq!(t, HealthTransition::Unchanged);
}
