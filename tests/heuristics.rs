use pvpilot::search::heuristics::{promising, prune_margin};

#[test]
fn margin_never_loosens_as_search_deepens() {
    for &best in &[-500, -60, -10, 0, 10, 60, 120, 500, 5_000] {
        for i in 3..40 {
            let now = prune_margin(best, i);
            let next = prune_margin(best, i + 1);
            assert!(
                next <= now,
                "margin loosened from {now} to {next} at iteration {i} (best={best})"
            );
        }
    }
}

#[test]
fn margin_stays_below_the_leader() {
    for &best in &[-500, -60, 0, 60, 500, 100_000] {
        for i in 1..30 {
            assert!(prune_margin(best, i) <= best - 10);
        }
    }
}

#[test]
fn first_iterations_are_more_lenient() {
    assert!(prune_margin(0, 1) > prune_margin(0, 4));
    assert!(prune_margin(100, 2) > prune_margin(100, 6));
}

#[test]
fn winning_leader_only_keeps_non_losing_alternatives() {
    // Once the leader is at +50 or better, the margin never dips below zero
    // no matter how deep the search goes.
    for &best in &[50, 120, 400, 2_000] {
        for i in 1..40 {
            assert!(prune_margin(best, i) >= 0, "negative margin for best={best} i={i}");
        }
    }
}

#[test]
fn promise_is_one_for_the_leader() {
    assert_eq!(promising(-300, 50, 30, 12, true), 1.0);
}

#[test]
fn promise_stays_in_unit_range() {
    for &eval in &[-1_000, -100, 0, 100, 1_000] {
        for &best in &[-500, 0, 500] {
            for &size in &[2usize, 10, 25, 60] {
                for i in 1..30 {
                    let p = promising(eval, best, size, i, false);
                    assert!((0.0..=1.0).contains(&p), "promise {p} out of range");
                }
            }
        }
    }
}

#[test]
fn promise_falls_with_the_eval_gap() {
    let near = promising(40, 50, 20, 5, false);
    let far = promising(-150, 50, 20, 5, false);
    assert!(near > far, "{near} vs {far}");
}

#[test]
fn promise_tightens_with_depth_and_narrow_fields() {
    let shallow = promising(0, 50, 20, 2, false);
    let deep = promising(0, 50, 20, 20, false);
    assert!(deep <= shallow);

    let wide = promising(0, 50, 40, 10, false);
    let narrow_field = promising(0, 50, 5, 10, false);
    assert!(wide <= narrow_field);
}
