//! FSM unit tests

use rollstep::deploy::fsm::{RunEvent, RunFsm, RunState};

#[test]
fn test_fsm_initial_state() {
    let fsm = RunFsm::new();
    assert_eq!(fsm.state(), &RunState::Start);
    assert!(fsm.error().is_none());
    assert!(!fsm.is_terminal());
}

#[test]
fn test_fsm_skip_flow() {
    let mut fsm = RunFsm::new();

    fsm.process(RunEvent::CheckGate).unwrap();
    fsm.process(RunEvent::GateClosed).unwrap();
    assert_eq!(fsm.state(), &RunState::Skipped);

    fsm.process(RunEvent::Finish).unwrap();
    assert_eq!(fsm.state(), &RunState::Done);
}

#[test]
fn test_fsm_failure_is_terminal() {
    let mut fsm = RunFsm::new();

    fsm.process(RunEvent::CheckGate).unwrap();
    fsm.process(RunEvent::CredentialsResolved).unwrap();
    fsm.process(RunEvent::ConfigWritten).unwrap();
    fsm.process(RunEvent::Fail("exit code 1".to_string())).unwrap();

    assert_eq!(fsm.state(), &RunState::Failed);
    assert_eq!(fsm.error(), Some("exit code 1"));

    // No retry out of Failed
    assert!(fsm.process(RunEvent::CheckGate).is_err());
    assert!(fsm.process(RunEvent::UpdateApplied).is_err());
    assert!(fsm.process(RunEvent::Finish).is_err());
}

#[test]
fn test_fsm_stages_cannot_be_skipped() {
    let mut fsm = RunFsm::new();

    // Cannot resolve credentials before the gate check
    assert!(fsm.process(RunEvent::CredentialsResolved).is_err());

    fsm.process(RunEvent::CheckGate).unwrap();
    // Cannot write the config before credentials are resolved
    assert!(fsm.process(RunEvent::ConfigWritten).is_err());
    // Cannot apply before the config is written
    assert!(fsm.process(RunEvent::UpdateApplied).is_err());
}

#[test]
fn test_fsm_done_is_terminal() {
    let mut fsm = RunFsm::new();

    fsm.process(RunEvent::CheckGate).unwrap();
    fsm.process(RunEvent::GateClosed).unwrap();
    fsm.process(RunEvent::Finish).unwrap();

    assert!(fsm.is_terminal());
    assert!(fsm.process(RunEvent::Fail("late".to_string())).is_err());
}
