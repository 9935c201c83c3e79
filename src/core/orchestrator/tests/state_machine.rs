use crate::core::orchestrator::{RunState, can_transition};

#[test]
fn lifecycle_happy_path_transitions_are_allowed() {
    let path = [
        (RunState::Queued, RunState::Running),
        (RunState::Running, RunState::Completed),
    ];
    for (from, to) in path {
        assert!(
            can_transition(from, to),
            "expected transition {:?} -> {:?} to be allowed",
            from,
            to
        );
    }
}

#[test]
fn running_can_fail_or_be_cancelled() {
    assert!(can_transition(RunState::Running, RunState::Failed));
    assert!(can_transition(RunState::Running, RunState::Cancelled));
    assert!(can_transition(RunState::Queued, RunState::Cancelled));
}

#[test]
fn queued_cannot_skip_running() {
    assert!(!can_transition(RunState::Queued, RunState::Completed));
    assert!(!can_transition(RunState::Queued, RunState::Failed));
}

#[test]
fn nothing_returns_to_queued() {
    for from in [
        RunState::Running,
        RunState::Completed,
        RunState::Failed,
        RunState::Cancelled,
    ] {
        assert!(
            !can_transition(from, RunState::Queued),
            "unexpected transition {:?} -> queued",
            from
        );
    }
}

#[test]
fn terminal_states_are_final() {
    let terminal = [RunState::Completed, RunState::Failed, RunState::Cancelled];
    for from in terminal {
        assert!(from.is_terminal());
        for to in [RunState::Running, RunState::Completed, RunState::Failed, RunState::Cancelled] {
            if from != to {
                assert!(!can_transition(from, to), "{:?} -> {:?}", from, to);
            }
        }
    }
}

#[test]
fn same_state_is_a_no_op_transition() {
    assert!(can_transition(RunState::Running, RunState::Running));
    assert!(can_transition(RunState::Completed, RunState::Completed));
}

#[test]
fn status_strings_round_trip() {
    for s in ["queued", "running", "completed", "failed", "cancelled"] {
        assert_eq!(RunState::from_status(s).map(|r| r.as_str()), Some(s));
    }
    assert_eq!(RunState::from_status("paused"), None);
}
