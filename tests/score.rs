use std::cmp::Ordering;

use cozy_chess::Color;
use pvpilot::search::score::{Score, VALUE_MATE};

#[test]
fn same_perspective_compares_directly() {
    let a = Score::pov(50, Color::White);
    let b = Score::pov(20, Color::White);
    assert_eq!(a.compare(&b), Ordering::Greater);
    assert_eq!(b.compare(&a), Ordering::Less);
    assert_eq!(a.compare(&a), Ordering::Equal);
}

#[test]
fn opposing_perspectives_are_normalized_by_compare() {
    // +50 for White against -60 for Black: the latter is +60 for White.
    let a = Score::pov(50, Color::White);
    let b = Score::pov(-60, Color::Black);
    assert_eq!(a.compare(&b), Ordering::Less);

    // Symmetric view agrees.
    assert_eq!(b.compare(&a), Ordering::Greater);

    // A mirrored pair is equal.
    let c = Score::pov(30, Color::White);
    let d = Score::pov(-30, Color::Black);
    assert_eq!(c.compare(&d), Ordering::Equal);
}

#[test]
fn to_pov_negates_across_perspectives() {
    let s = Score::pov(30, Color::White);
    assert_eq!(s.to_pov(Color::Black).value(), -30);
    assert_eq!(s.to_pov(Color::White).value(), 30);
    assert_eq!(s.to_pov(Color::Black).to_pov(Color::White).value(), 30);

    // Untagged scores are adopted as-is.
    let rel = Score::cp(25);
    assert_eq!(rel.to_pov(Color::Black).value(), 25);
    assert_eq!(rel.to_pov(Color::Black).perspective(), Some(Color::Black));
}

#[test]
fn gap_uses_the_callers_perspective() {
    let a = Score::pov(80, Color::White);
    let b = Score::pov(-20, Color::Black);
    assert_eq!(a.gap(&b), 60);
    assert_eq!(b.gap(&a), -60);
}

#[test]
fn mate_distances_fold_into_centipawns() {
    assert_eq!(Score::from_mate_distance(0), VALUE_MATE);
    assert_eq!(Score::from_mate_distance(3), VALUE_MATE - 3);
    assert_eq!(Score::from_mate_distance(-2), -(VALUE_MATE - 2));
    assert!(Score::from_mate_distance(1) > 30_000);
}
