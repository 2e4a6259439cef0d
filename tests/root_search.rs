use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pvpilot::board::position::Position;
use pvpilot::engine::client::{Analysis, ClientError, Evaluator, SearchLimit};
use pvpilot::search::budget::NodeBudget;
use pvpilot::search::root::{
    self, NullReporter, SearchContext, SearchConfig, SearchParams, StopReason,
};
use pvpilot::search::score::VALUE_MATE;
use pvpilot::search::timeman::Clock;

/// Scripted evaluator: replies with the queried position's first legal move
/// and a score chosen per call. Never spawns anything.
struct StubEvaluator {
    calls: u64,
    nodes_per_call: u64,
    score_for_call: Box<dyn FnMut(u64) -> i32>,
    cancel_at: Option<(Arc<AtomicBool>, u64)>,
    fail_from: Option<u64>,
    seen_fens: Vec<String>,
}

impl StubEvaluator {
    fn constant(score: i32) -> Self {
        Self {
            calls: 0,
            nodes_per_call: 1000,
            score_for_call: Box::new(move |_| score),
            cancel_at: None,
            fail_from: None,
            seen_fens: Vec::new(),
        }
    }
}

impl Evaluator for StubEvaluator {
    fn ensure_ready(&mut self) -> Result<(), ClientError> {
        Ok(())
    }

    fn restart(&mut self) -> Result<(), ClientError> {
        Ok(())
    }

    fn analyse(&mut self, pos: &Position, _limit: &SearchLimit) -> Result<Analysis, ClientError> {
        self.calls += 1;
        if let Some(from) = self.fail_from {
            if self.calls >= from {
                return Err(ClientError::NotRunning);
            }
        }
        if let Some((flag, at)) = &self.cancel_at {
            if self.calls >= *at {
                flag.store(true, Ordering::Relaxed);
            }
        }
        self.seen_fens.push(pos.fen());

        let reply = pos.legal_moves().first().map(|&m| pos.move_to_uci(m));
        let score = (self.score_for_call)(self.calls);
        Ok(Analysis {
            score_cp: Some(score),
            pv: reply.clone().into_iter().collect(),
            nodes: self.nodes_per_call,
            depth: 10,
            seldepth: 12,
            nps: 100_000,
            time_ms: 1,
            bestmove: reply,
        })
    }
}

fn test_config() -> SearchConfig {
    SearchConfig { node_budget: NodeBudget::Fixed(1000), ..Default::default() }
}

#[test]
fn constant_evaluator_settles_on_the_first_root_move() {
    let root = Position::startpos();
    let first = root.move_to_uci(root.legal_moves()[0]);
    let mut stub = StubEvaluator::constant(0);
    let mut ctx = SearchContext::new(test_config());
    let params = SearchParams { max_iters: 3, ..Default::default() };

    let res = root::search(&mut ctx, &mut stub, &root, &params, &mut NullReporter);

    assert_eq!(res.stop, StopReason::IterationLimit);
    assert_eq!(res.iterations, 3);
    assert_eq!(res.bestmove.as_deref(), Some(first.as_str()));
    assert!(res.ponder.is_some(), "a traced line should offer a ponder move");
    // One whole-position probe plus one call per candidate per pass.
    assert_eq!(stub.calls, 1 + 3 * 20);
}

#[test]
fn node_ceiling_stops_the_search_with_a_legal_answer() {
    let root = Position::startpos();
    let first = root.move_to_uci(root.legal_moves()[0]);
    let mut stub = StubEvaluator::constant(0);
    let mut ctx = SearchContext::new(test_config());
    let params = SearchParams { max_iters: 100, max_nodes: Some(5_000), ..Default::default() };

    let res = root::search(&mut ctx, &mut stub, &root, &params, &mut NullReporter);

    assert_eq!(res.stop, StopReason::NodeLimit);
    // At most one in-flight call beyond the ceiling.
    assert!(res.nodes <= 5_000 + 1_000, "spent {} nodes", res.nodes);
    // Mid-pass interruption falls back to the whole-position probe's reply.
    assert_eq!(res.bestmove.as_deref(), Some(first.as_str()));
}

#[test]
fn cancellation_reports_the_previous_pass_leader() {
    let root = Position::startpos();
    let first = root.move_to_uci(root.legal_moves()[0]);
    let cancel = Arc::new(AtomicBool::new(false));
    let mut ctx = SearchContext::with_cancel(test_config(), cancel.clone());

    // Pass 1 (calls 2..=21) scores everything equal, making the first root
    // move the committed leader. Pass 2 then finds a "better" second move
    // just before cancellation lands mid-pass.
    let mut stub = StubEvaluator::constant(0);
    stub.score_for_call = Box::new(|call| if call == 23 { 500 } else { 0 });
    stub.cancel_at = Some((cancel, 25));

    let params = SearchParams { max_iters: 10, ..Default::default() };
    let res = root::search(&mut ctx, &mut stub, &root, &params, &mut NullReporter);

    assert_eq!(res.stop, StopReason::Cancelled);
    assert_eq!(
        res.bestmove.as_deref(),
        Some(first.as_str()),
        "a partially re-evaluated leader must not be reported"
    );
    // The loop noticed the flag at the next candidate boundary.
    assert_eq!(stub.calls, 25);
}

#[test]
fn forced_move_is_returned_without_consulting_the_evaluator() {
    let root = Position::from_fen("R6k/6p1/8/8/8/8/8/7K b - - 0 1").expect("valid FEN");
    assert_eq!(root.legal_moves().len(), 1);

    let mut stub = StubEvaluator::constant(0);
    let mut ctx = SearchContext::new(test_config());
    let params = SearchParams {
        clock: Some(Clock::new(60_000, 60_000, 0, 0)),
        ..Default::default()
    };

    let res = root::search(&mut ctx, &mut stub, &root, &params, &mut NullReporter);

    assert_eq!(res.bestmove.as_deref(), Some("h8h7"));
    assert_eq!(stub.calls, 0);
}

#[test]
fn mate_in_one_leads_without_an_evaluator_call_on_the_terminal_node() {
    let root = Position::from_fen("k7/7R/1K6/8/8/8/8/8 w - - 0 1").expect("valid FEN");
    let mate = root.find_uci_move("h7h8").expect("mating move is legal");
    let mated_fen = {
        let mut p = root.clone();
        p.play(mate);
        p.fen()
    };

    let mut stub = StubEvaluator::constant(10);
    let mut ctx = SearchContext::new(test_config());
    let params = SearchParams { max_iters: 2, ..Default::default() };

    let res = root::search(&mut ctx, &mut stub, &root, &params, &mut NullReporter);

    assert_eq!(res.bestmove.as_deref(), Some("h7h8"));
    assert_eq!(res.score_cp, VALUE_MATE);
    assert!(
        !stub.seen_fens.contains(&mated_fen),
        "the terminal position must be scored from the game state, not the evaluator"
    );
}

#[test]
fn root_without_legal_moves_reports_none() {
    let root = Position::from_fen("R5k1/5ppp/8/8/8/8/8/7K b - - 0 1").expect("valid FEN");
    let mut stub = StubEvaluator::constant(0);
    let mut ctx = SearchContext::new(test_config());

    let res = root::search(&mut ctx, &mut stub, &root, &SearchParams::default(), &mut NullReporter);

    assert_eq!(res.bestmove, None);
    assert_eq!(stub.calls, 0);
}

#[test]
fn evaluator_loss_mid_search_degrades_to_the_committed_answer() {
    let root = Position::startpos();
    let first = root.move_to_uci(root.legal_moves()[0]);
    let mut stub = StubEvaluator::constant(0);
    stub.fail_from = Some(23); // first failure early in pass 2

    let mut ctx = SearchContext::new(test_config());
    let params = SearchParams { max_iters: 10, ..Default::default() };
    let res = root::search(&mut ctx, &mut stub, &root, &params, &mut NullReporter);

    assert_eq!(res.stop, StopReason::EvaluatorError);
    assert_eq!(res.bestmove.as_deref(), Some(first.as_str()));
}

#[test]
fn evaluator_dead_from_the_start_yields_no_move() {
    let root = Position::startpos();
    let mut stub = StubEvaluator::constant(0);
    stub.fail_from = Some(1);

    let mut ctx = SearchContext::new(test_config());
    let res = root::search(&mut ctx, &mut stub, &root, &SearchParams::default(), &mut NullReporter);

    assert_eq!(res.stop, StopReason::EvaluatorError);
    assert_eq!(res.bestmove, None);
}
