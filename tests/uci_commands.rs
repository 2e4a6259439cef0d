use cozy_chess::Color;
use pvpilot::options::Options;
use pvpilot::uci::UciEngine;

#[test]
fn position_startpos_with_moves() {
    let mut eng = UciEngine::new(Options::default());
    assert!(eng.handle_command("position startpos moves e2e4 e7e6"));
    assert_eq!(
        eng.position().fen(),
        "rnbqkbnr/pppp1ppp/4p3/8/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2"
    );
}

#[test]
fn position_fen_with_moves() {
    let mut eng = UciEngine::new(Options::default());
    eng.handle_command(
        "position fen rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1 moves g1f3",
    );
    assert_eq!(eng.position().side_to_move(), Color::Black);
}

#[test]
fn position_stops_at_the_first_illegal_move() {
    let mut eng = UciEngine::new(Options::default());
    eng.handle_command("position startpos moves e2e4 e2e4 d2d4");
    // Only the first token applied.
    assert_eq!(eng.position().side_to_move(), Color::Black);
    assert_eq!(eng.position().ply(), 1);
}

#[test]
fn malformed_position_is_ignored() {
    let mut eng = UciEngine::new(Options::default());
    let before = eng.position().fen();
    eng.handle_command("position fen not a real fen at all");
    assert_eq!(eng.position().fen(), before);
}

#[test]
fn setoption_updates_known_options() {
    let mut eng = UciEngine::new(Options::default());
    eng.handle_command("setoption name MAX_MOVES value 10");
    assert_eq!(eng.options().max_moves, 10);

    eng.handle_command("setoption name Move Overhead value 250");
    assert_eq!(eng.options().move_overhead, 250);

    eng.handle_command("setoption name Nodes value 50000");
    assert_eq!(eng.options().nodes, Some(50_000));
    eng.handle_command("setoption name Nodes value auto");
    assert_eq!(eng.options().nodes, None);
}

#[test]
fn out_of_range_values_keep_the_prior_setting() {
    let mut eng = UciEngine::new(Options::default());
    eng.handle_command("setoption name Threads value 9999");
    assert_eq!(eng.options().threads, 1);

    eng.handle_command("setoption name MAX_MOVES value 0");
    assert_eq!(eng.options().max_moves, 5);

    eng.handle_command("setoption name Nodes value banana");
    assert_eq!(eng.options().nodes, None);

    // Unknown options are reported but change nothing.
    eng.handle_command("setoption name Ponder value true");
}

#[test]
fn quit_ends_the_command_loop() {
    let mut eng = UciEngine::new(Options::default());
    assert!(eng.handle_command("isready"));
    assert!(!eng.handle_command("quit"));
}
