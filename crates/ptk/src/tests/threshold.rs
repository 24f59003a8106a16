use crate::tests::{engine, engine_with, p, start};
use crate::{SchedError, SchedulerConfig, ThreadId, ThreadState};

#[test]
fn threshold_weaker_than_priority_is_rejected_without_side_effects() {
    let engine = engine();
    let t = start(&engine, "t", 10, 6);
    let _x = start(&engine, "x", 8, 8);

    let before = engine.with_state(|s| (s.ready().ready_map().clone(), s.ledger().preempted_map().clone()));
    let tcb_before = engine.thread(t).expect("t exists");

    assert_eq!(
        engine.change_threshold(t, p(11)),
        Err(SchedError::ThresholdInvalid {
            thread: t,
            threshold: p(11),
            priority: p(10),
        })
    );

    let tcb_after = engine.thread(t).expect("t exists");
    assert_eq!(tcb_after.user_threshold(), tcb_before.user_threshold());
    assert_eq!(tcb_after.effective_threshold(), tcb_before.effective_threshold());
    let after = engine.with_state(|s| (s.ready().ready_map().clone(), s.ledger().preempted_map().clone()));
    assert_eq!(before, after);
    assert_eq!(engine.execute_thread(), Some(t));
}

#[test]
fn unknown_thread_is_reported() {
    let engine = engine();
    assert_eq!(
        engine.change_threshold(ThreadId(42), p(1)),
        Err(SchedError::UnknownThread(ThreadId(42)))
    );
}

#[test]
fn effective_threshold_never_looser_than_inheritance() {
    let engine = engine();
    let t = start(&engine, "t", 10, 10);

    engine.set_inherited_priority(t, Some(p(2))).expect("t exists");
    for requested in [10, 6, 2, 1, 0] {
        engine.change_threshold(t, p(requested)).expect("valid threshold");
        let tcb = engine.thread(t).expect("t exists");
        assert_eq!(tcb.effective_threshold(), p(requested).min(p(2)));
        assert!(tcb.effective_threshold() <= tcb.priority());
        assert_eq!(tcb.user_threshold(), p(requested));
    }

    engine.change_threshold(t, p(10)).expect("valid threshold");
    assert_eq!(engine.thread(t).map(|tcb| tcb.effective_threshold()), Some(p(2)));

    engine.set_inherited_priority(t, None).expect("t exists");
    assert_eq!(engine.thread(t).map(|tcb| tcb.effective_threshold()), Some(p(10)));
}

#[test]
fn old_threshold_round_trips() {
    let engine = engine();
    let t = start(&engine, "t", 20, 20);

    let mut expected = p(20);
    for next in [15, 15, 3, 20, 0, 9] {
        assert_eq!(engine.change_threshold(t, p(next)), Ok(expected));
        expected = p(next);
    }
    assert_eq!(engine.thread(t).map(|tcb| tcb.user_threshold()), Some(p(9)));
}

#[test]
fn removing_threshold_hands_cpu_to_waiting_thread() {
    let engine = engine();
    let t = start(&engine, "t", 10, 3);
    let x = start(&engine, "x", 5, 5);
    assert_eq!(engine.execute_thread(), Some(t), "threshold 3 holds off priority 5");
    let checks_before = engine.port().check_count();

    assert_eq!(engine.change_threshold(t, p(10)), Ok(p(3)));

    assert_eq!(engine.execute_thread(), Some(x));
    assert_eq!(engine.current_thread(), Some(x));
    assert_eq!(engine.thread(t).map(|tcb| tcb.state()), Some(ThreadState::Ready));
    assert!(!engine.is_preempted(p(10)), "no threshold left to remember");
    assert_eq!(engine.port().check_count(), checks_before + 1);
    assert_eq!(engine.port().next.lock().unwrap().last(), Some(&x));
}

#[test]
fn threshold_still_covering_highest_ready_keeps_thread_running() {
    let engine = engine();
    let t = start(&engine, "t", 10, 3);
    let _x = start(&engine, "x", 5, 5);
    let checks_before = engine.port().check_count();

    // 5 is not more urgent than 4.
    assert_eq!(engine.change_threshold(t, p(4)), Ok(p(3)));
    assert_eq!(engine.execute_thread(), Some(t));
    assert_eq!(engine.port().check_count(), checks_before);

    // 5 is more urgent than 6.
    assert_eq!(engine.change_threshold(t, p(6)), Ok(p(4)));
    assert_ne!(engine.execute_thread(), Some(t));
}

#[test]
fn graded_threshold_preemption_is_remembered_and_restored() {
    let engine = engine();
    let t = start(&engine, "t", 10, 3);
    let x = start(&engine, "x", 5, 5);

    engine.change_threshold(t, p(7)).expect("valid threshold");
    assert_eq!(engine.current_thread(), Some(x));
    assert!(engine.is_preempted(p(10)));

    // `y` is less urgent than t's threshold, so t must come back first.
    let y = start(&engine, "y", 8, 8);
    assert_eq!(engine.execute_thread(), Some(x));

    engine.suspend(x).expect("x is running");
    assert_eq!(engine.execute_thread(), Some(t));
    assert_eq!(engine.current_thread(), Some(t));
    assert!(!engine.is_preempted(p(10)));
    assert_eq!(engine.thread(y).map(|tcb| tcb.state()), Some(ThreadState::Ready));
}

#[test]
fn no_switch_for_thread_that_is_not_executing() {
    let engine = engine();
    let runner = start(&engine, "runner", 4, 4);
    let idle = start(&engine, "idle", 20, 1);
    let _mid = start(&engine, "mid", 12, 12);
    let next_before = engine.port().next.lock().unwrap().len();
    let checks_before = engine.port().check_count();

    for threshold in [20, 13, 12, 5, 0, 20] {
        engine.change_threshold(idle, p(threshold)).expect("valid threshold");
        assert_eq!(engine.execute_thread(), Some(runner));
    }
    assert_eq!(engine.port().next.lock().unwrap().len(), next_before);
    assert_eq!(engine.port().check_count(), checks_before);
}

#[test]
fn repeating_current_threshold_leaves_no_stale_mark() {
    let engine = engine();
    let t = start(&engine, "t", 10, 10);
    let _x = start(&engine, "x", 5, 5);

    for _ in 0..3 {
        engine.change_threshold(t, p(10)).expect("valid threshold");
        assert!(engine.with_state(|s| s.ledger().preempted_map().is_empty()));
    }
}

#[test]
fn returning_threshold_to_priority_clears_preempted_mark() {
    let engine = engine();
    let t = start(&engine, "t", 10, 3);
    let _x = start(&engine, "x", 5, 5);
    engine.change_threshold(t, p(7)).expect("valid threshold");
    assert!(engine.is_preempted(p(10)));

    // t is blocked by its own threshold history; repeating it keeps the mark.
    engine.change_threshold(t, p(7)).expect("valid threshold");
    assert!(engine.is_preempted(p(10)));

    engine.change_threshold(t, p(10)).expect("valid threshold");
    assert!(!engine.is_preempted(p(10)));
    engine.change_threshold(t, p(10)).expect("valid threshold");
    assert!(!engine.is_preempted(p(10)));
}

#[test]
fn critical_section_is_released_for_preempt_check() {
    let engine = engine();
    let t = start(&engine, "t", 10, 0);
    let _x = start(&engine, "x", 2, 2);
    engine.change_threshold(t, p(10)).expect("valid threshold");

    let checks = engine.port().checks.lock().unwrap();
    assert!(!checks.is_empty());
    assert!(checks.iter().all(|free| *free));
}

#[test]
fn disabled_thresholds_are_all_or_nothing() {
    let engine = engine_with(
        SchedulerConfig::builder()
            .preemption_threshold(false)
            .build()
            .expect("valid config"),
    );
    let t = start(&engine, "t", 10, 10);

    assert_eq!(engine.change_threshold(t, p(6)), Ok(p(10)));
    assert_eq!(engine.thread(t).map(|tcb| tcb.user_threshold()), Some(p(0)));

    let x = start(&engine, "x", 3, 3);
    assert_eq!(engine.execute_thread(), Some(t), "threshold 0 blocks everything");

    // An out-of-range request is coerced before validation.
    assert_eq!(engine.change_threshold(t, p(25)), Ok(p(0)));
    assert_eq!(engine.execute_thread(), Some(t));

    assert_eq!(engine.change_threshold(t, p(10)), Ok(p(0)));
    assert_eq!(engine.execute_thread(), Some(x));
    assert!(engine.with_state(|s| s.ledger().preempted_map().is_empty()));
}

#[test]
fn two_level_preempted_map_tracks_group_bits() {
    let engine = engine_with(
        SchedulerConfig::builder()
            .max_priorities(256)
            .build()
            .expect("valid config"),
    );
    let t = start(&engine, "t", 200, 2);
    let x = start(&engine, "x", 70, 70);
    assert_eq!(engine.execute_thread(), Some(t));

    engine.change_threshold(t, p(100)).expect("valid threshold");
    assert_eq!(engine.execute_thread(), Some(x));
    engine.with_state(|s| {
        let map = s.ledger().preempted_map();
        assert!(map.is_two_level());
        assert!(map.group_active(6));
        assert_eq!(map.lowest_set(), Some(p(200)));
    });

    engine.suspend(x).expect("x is running");
    assert_eq!(engine.execute_thread(), Some(t));
    engine.with_state(|s| {
        let map = s.ledger().preempted_map();
        assert!(!map.group_active(6));
        assert!(map.is_empty());
    });
}
