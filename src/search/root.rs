use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cozy_chess::Move;
use log::{debug, warn};

use crate::board::position::{Outcome, Position};
use crate::engine::client::{Analysis, ClientError, Evaluator, SearchLimit};
use crate::search::average::RunningAverage;
use crate::search::budget::{calc_nodes, set_nodes, NodeBudget};
use crate::search::heuristics::{promising, prune_margin};
use crate::search::score::{Score, VALUE_DRAW, VALUE_INFINITE, VALUE_MATE};
use crate::search::timeman::{Clock, TimeManager};

const CURRMOVE_INTERVAL: Duration = Duration::from_secs(5);

/// Limits for one search request; any combination may be present.
#[derive(Clone, Debug)]
pub struct SearchParams {
    pub max_iters: u32,
    pub max_nodes: Option<u64>,
    pub movetime: Option<u64>,
    pub clock: Option<Clock>,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self { max_iters: 256, max_nodes: None, movetime: None, clock: None }
    }
}

/// Options snapshot taken when a search starts.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub node_budget: NodeBudget,
    pub threads: u32,
    pub max_moves: usize,
    pub max_horizon: usize,
    pub move_overhead: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            node_budget: NodeBudget::default(),
            threads: 1,
            max_moves: 5,
            max_horizon: 30,
            move_overhead: 100,
        }
    }
}

/// Thresholds gating a full-field recalculation. Empirically tuned as a set;
/// swap the whole object rather than individual fields.
#[derive(Clone, Copy, Debug)]
pub struct RecalcPolicy {
    pub narrow_fraction: f64,
    pub best_drop: i32,
    pub root_drop: i32,
    pub min_gap_iters: u32,
}

impl Default for RecalcPolicy {
    fn default() -> Self {
        Self { narrow_fraction: 0.2, best_drop: 50, root_drop: 100, min_gap_iters: 5 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    IterationLimit,
    NodeLimit,
    Deadline,
    Cancelled,
    EvaluatorError,
}

#[derive(Clone, Debug)]
pub struct SearchResult {
    pub bestmove: Option<String>,
    pub ponder: Option<String>,
    pub score_cp: i32,
    pub nodes: u64,
    pub iterations: u32,
    pub stop: StopReason,
}

pub struct IterationInfo<'a> {
    pub iteration: u32,
    pub seldepth: u32,
    pub score_cp: i32,
    pub nodes: u64,
    pub nps: u64,
    pub time_ms: u64,
    pub pv: &'a str,
}

/// Progress sink for the front end. The search emits one iteration event per
/// completed pass, low-frequency currmove events while a pass is quiet, and
/// exactly one bestmove event per search.
pub trait Reporter {
    fn iteration(&mut self, info: &IterationInfo);
    fn currmove(&mut self, iteration: u32, mv: &str, number: usize, total_nodes: u64);
    fn bestmove(&mut self, best: Option<&str>, ponder: Option<&str>);
}

pub struct NullReporter;

impl Reporter for NullReporter {
    fn iteration(&mut self, _info: &IterationInfo) {}
    fn currmove(&mut self, _iteration: u32, _mv: &str, _number: usize, _total_nodes: u64) {}
    fn bestmove(&mut self, _best: Option<&str>, _ponder: Option<&str>) {}
}

/// Per-search mutable state shared with the control path: the cancellation
/// flag is the only thing both contexts touch.
pub struct SearchContext {
    cancel: Arc<AtomicBool>,
    pub cfg: SearchConfig,
    nps: RunningAverage,
}

impl SearchContext {
    pub fn new(cfg: SearchConfig) -> Self {
        Self::with_cancel(cfg, Arc::new(AtomicBool::new(false)))
    }

    pub fn with_cancel(cfg: SearchConfig, cancel: Arc<AtomicBool>) -> Self {
        let mut nps = RunningAverage::default();
        nps.add(f64::from(1_000_000 * cfg.threads.max(1)));
        Self { cancel, cfg, nps }
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, AtomicOrdering::Relaxed);
    }

    pub fn cancelled(&self) -> bool {
        self.cancel.load(AtomicOrdering::Relaxed)
    }
}

/// One root move's sub-search state. `pos` is always the position reached by
/// replaying `pv` from the root; `pv` starts with the root move itself.
struct Candidate {
    pos: Position,
    pv: Vec<Move>,
    eval: Option<Score>,
    depth: u32,
    pruned_at: Option<u32>,
    extra: f64,
}

/// Search a position by tracing principal variations: one evaluator
/// sub-search per root move, budgets and pruning steered by the heuristics,
/// refined iteratively until a limit or cancellation stops it. Always
/// produces a usable result; evaluator failures degrade to the best answer
/// confirmed so far.
pub fn search<E: Evaluator>(
    ctx: &mut SearchContext,
    evaluator: &mut E,
    root: &Position,
    params: &SearchParams,
    reporter: &mut dyn Reporter,
) -> SearchResult {
    let started = Instant::now();
    let mut last_output = started;
    let root_stm = root.side_to_move();
    let policy = RecalcPolicy::default();

    let tm = match params.clock {
        Some(clock) => TimeManager::init(&clock, root_stm, root.ply(), ctx.cfg.move_overhead),
        None => TimeManager::default(),
    };
    let use_timeman = tm.is_timed() || params.movetime.is_some();
    let mut opt_time = tm.opt_time as f64;
    let mut max_time = tm.max_time as f64;
    if let Some(mt) = params.movetime {
        opt_time = mt as f64;
        max_time = mt as f64;
    }
    if use_timeman {
        debug!("timeman: optimal {opt_time:.0}ms maximum {max_time:.0}ms");
    }

    let root_moves = root.legal_moves();
    if root_moves.is_empty() {
        reporter.bestmove(None, None);
        return SearchResult {
            bestmove: None,
            ponder: None,
            score_cp: 0,
            nodes: 0,
            iterations: 0,
            stop: StopReason::IterationLimit,
        };
    }

    // A forced move needs no allocation between candidates.
    if root_moves.len() == 1 && use_timeman {
        let best = root.move_to_uci(root_moves[0]);
        reporter.bestmove(Some(&best), None);
        return SearchResult {
            bestmove: Some(best),
            ponder: None,
            score_cp: 0,
            nodes: 0,
            iterations: 0,
            stop: StopReason::IterationLimit,
        };
    }

    let mut retry_used = false;
    if let Err(e) = evaluator.ensure_ready() {
        warn!("evaluator not ready: {e}");
        retry_used = true;
        if evaluator.restart().and_then(|_| evaluator.ensure_ready()).is_err() {
            reporter.bestmove(None, None);
            return SearchResult {
                bestmove: None,
                ponder: None,
                score_cp: 0,
                nodes: 0,
                iterations: 0,
                stop: StopReason::EvaluatorError,
            };
        }
    }

    let mut i: u32 = 1;
    let mut total_nodes: u64 = 0;
    let mut default_nodes = set_nodes(ctx.cfg.node_budget, i, ctx.nps.value(), ctx.cfg.threads);
    let mut root_moves_size = root_moves.len();

    // Severe time pressure: a full first pass will not fit in the soft
    // budget, so return the evaluator's own single-call recommendation.
    if use_timeman
        && root_moves_size as f64 * default_nodes > opt_time / 1000.0 * ctx.nps.value()
    {
        let limit = SearchLimit::MoveTime(opt_time.max(1.0) as u64);
        return match analyse_with_retry(evaluator, &mut retry_used, root, &limit) {
            Ok(a) => {
                let best = a.bestmove.clone().or_else(|| a.pv.first().cloned());
                let ponder = a.pv.get(1).cloned();
                let pv_str = a.pv.join(" ");
                reporter.iteration(&IterationInfo {
                    iteration: 0,
                    seldepth: a.depth,
                    score_cp: a.score_cp.unwrap_or(0),
                    nodes: a.nodes,
                    nps: a.nps,
                    time_ms: a.time_ms,
                    pv: &pv_str,
                });
                reporter.bestmove(best.as_deref(), ponder.as_deref());
                SearchResult {
                    bestmove: best,
                    ponder,
                    score_cp: a.score_cp.unwrap_or(0),
                    nodes: a.nodes,
                    iterations: 0,
                    stop: StopReason::Deadline,
                }
            }
            Err(e) => {
                warn!("evaluator unavailable under time pressure: {e}");
                reporter.bestmove(None, None);
                SearchResult {
                    bestmove: None,
                    ponder: None,
                    score_cp: 0,
                    nodes: 0,
                    iterations: 0,
                    stop: StopReason::EvaluatorError,
                }
            }
        };
    }

    // Whole-position probe: seeds the committed answer so every interruption
    // point has a usable reply.
    let root_analysis =
        match analyse_with_retry(evaluator, &mut retry_used, root, &SearchLimit::Nodes(default_nodes as u64)) {
            Ok(a) => a,
            Err(e) => {
                warn!("evaluator unavailable: {e}");
                reporter.bestmove(None, None);
                return SearchResult {
                    bestmove: None,
                    ponder: None,
                    score_cp: 0,
                    nodes: 0,
                    iterations: 0,
                    stop: StopReason::EvaluatorError,
                };
            }
        };
    total_nodes += root_analysis.nodes;
    if root_analysis.nps > 0 {
        ctx.nps.add(root_analysis.nps as f64);
    }
    let root_score = Score::pov(root_analysis.score_cp.unwrap_or(0), root_stm);
    let root_best = root_analysis.bestmove.clone().or_else(|| root_analysis.pv.first().cloned());
    let root_ponder = root_analysis.pv.get(1).cloned();
    {
        let pv_str = root_analysis.pv.join(" ");
        reporter.iteration(&IterationInfo {
            iteration: 0,
            seldepth: root_analysis.depth,
            score_cp: root_score.value(),
            nodes: total_nodes,
            nps: root_analysis.nps,
            time_ms: started.elapsed().as_millis() as u64,
            pv: &pv_str,
        });
    }

    let mut candidates: HashMap<Move, Candidate> = HashMap::new();
    let mut best_value = Score::pov(-VALUE_INFINITE, root_stm);
    let mut best_move: Option<Move> = None;
    let mut best_move_changes: u32 = 0;
    let mut prev_best_value = root_score;
    let mut prev_recalc_iter: i64 = -1;
    let mut extra_time_iter: u32 = 0;
    let mut opt_elapsed = false;
    let mut max_elapsed = false;

    // Leader of the last completed pass; mid-pass interruptions report this,
    // never a partially re-evaluated leader.
    let mut committed: Option<(Move, Score)> = None;

    while i <= params.max_iters {
        // Pre-pass estimate: if this pass cannot fit in what is left of the
        // soft budget, stop now and save the time. Estimate aggressively; we
        // can always stop mid-pass later.
        if use_timeman {
            let opt_left = opt_time - elapsed_ms(started);
            if root_moves_size as f64 * default_nodes > opt_left / 1000.0 * ctx.nps.value() * 2.0 {
                debug!("timeman: early abort before iteration {i}");
                return emit_final(
                    root, &candidates, committed, root_best.as_deref(), root_ponder.as_deref(),
                    root_score, total_nodes, i - 1, StopReason::Deadline, reporter,
                );
            }
        }

        // Grow the base budget with diminishing returns, capped at 10x the
        // configured base.
        default_nodes *= 1.0 + ((0.0025 - 0.000033 * i as f64) * i as f64).max(0.0);
        default_nodes =
            default_nodes.min(10.0 * set_nodes(ctx.cfg.node_budget, i, ctx.nps.value(), ctx.cfg.threads));
        debug!("iteration {i}: default nodes {default_nodes:.0}");

        // Spend more time while the answer keeps changing.
        if best_move_changes > 0 {
            let instability =
                0.8 + 1.5 * f64::from(best_move_changes + 1).log10() / f64::from(ctx.cfg.threads.max(1));
            opt_time *= instability;
            debug!("timeman: {best_move_changes} best move changes, optimal time scaled by {instability:.2}");
        }
        best_move_changes = 0;

        for (idx, &mv) in root_moves.iter().enumerate() {
            // Cancellation and deadlines are polled before every candidate,
            // never only between passes.
            let elapsed = elapsed_ms(started);
            if use_timeman {
                if opt_time - elapsed <= 0.0 {
                    opt_elapsed = true;
                }
                if max_time > 0.0 && elapsed >= max_time {
                    max_elapsed = true;
                }
            }
            let cancelled = ctx.cancelled();
            let nodes_limit_reached = params.max_nodes.is_some_and(|n| total_nodes >= n);

            if cancelled || opt_elapsed || max_elapsed || nodes_limit_reached {
                // One-time extension: finish this pass if the remainder is
                // affordable within the hard deadline.
                if use_timeman
                    && extra_time_iter == 0
                    && opt_elapsed
                    && !max_elapsed
                    && !cancelled
                    && !nodes_limit_reached
                {
                    let remaining = (root_moves.len() - (idx + 1)) as f64;
                    if remaining * default_nodes * 1.2 < max_time / 1000.0 * ctx.nps.value() {
                        debug!("timeman: extra time granted in iteration {i}");
                        extra_time_iter = i;
                    }
                }
                if extra_time_iter < i {
                    let stop = if cancelled {
                        StopReason::Cancelled
                    } else if nodes_limit_reached {
                        StopReason::NodeLimit
                    } else {
                        StopReason::Deadline
                    };
                    if let Some((bm, bv)) = committed {
                        if let Some(cand) = candidates.get(&bm) {
                            let pv_str = root.pv_to_uci(&cand.pv);
                            let elapsed = started.elapsed();
                            reporter.iteration(&IterationInfo {
                                iteration: i,
                                seldepth: cand.depth,
                                score_cp: bv.value(),
                                nodes: total_nodes,
                                nps: nps_so_far(total_nodes, elapsed),
                                time_ms: elapsed.as_millis() as u64,
                                pv: &pv_str,
                            });
                        }
                    }
                    return emit_final(
                        root, &candidates, committed, root_best.as_deref(), root_ponder.as_deref(),
                        root_score, total_nodes, i - 1, stop, reporter,
                    );
                }
            }

            // Pruned moves are skipped until the aging reprieve: only early,
            // provisional prunes ever come back.
            if let Some(cand) = candidates.get_mut(&mv) {
                if let Some(p) = cand.pruned_at {
                    if p > 2 || i64::from(p) >= i64::from(i) - 5 {
                        continue;
                    }
                    if i - p >= 2 {
                        cand.pruned_at = None;
                    }
                }
            }

            let cand = candidates.entry(mv).or_insert_with(|| {
                let mut pos = root.clone();
                pos.play(mv);
                Candidate { pos, pv: vec![mv], eval: None, depth: 0, pruned_at: None, extra: 1.0 }
            });

            if last_output.elapsed() >= CURRMOVE_INTERVAL {
                reporter.currmove(i, &root.move_to_uci(mv), idx + 1, total_nodes);
                last_output = Instant::now();
            }

            let prev_eval = cand.eval;
            let is_best = best_move == Some(mv);
            let promise = match prev_eval {
                Some(ev) => promising(ev.value(), best_value.value(), root_moves_size, i, is_best),
                None => 1.0,
            };
            let move_nodes = calc_nodes(
                default_nodes,
                best_value.value(),
                prev_eval.map(|e| e.value()),
                i,
                is_best,
                cand.extra,
                promise,
            );

            let value = if let Some(outcome) = cand.pos.outcome() {
                // Terminal positions are scored from the game state; the
                // evaluator is not consulted.
                match outcome {
                    Outcome::Mate { winner } => Score::pov(VALUE_MATE, winner).to_pov(root_stm),
                    Outcome::Draw => Score::cp(VALUE_DRAW).to_pov(root_stm),
                }
            } else {
                let analysis = match analyse_with_retry(
                    evaluator,
                    &mut retry_used,
                    &cand.pos,
                    &SearchLimit::Nodes(move_nodes),
                ) {
                    Ok(a) => a,
                    Err(e) => {
                        warn!("evaluator lost mid-search ({e}); reporting the committed answer");
                        return emit_final(
                            root, &candidates, committed, root_best.as_deref(), root_ponder.as_deref(),
                            root_score, total_nodes, i - 1, StopReason::EvaluatorError, reporter,
                        );
                    }
                };

                let Some(cp) = analysis.score_cp else {
                    // Malformed reply: no nodes, no PV extension, no eval
                    // update for this call.
                    debug!("iteration {i}: discarding malformed reply for {}", root.move_to_uci(mv));
                    continue;
                };

                total_nodes += analysis.nodes;
                if analysis.nps > 0 {
                    ctx.nps.add(analysis.nps as f64);
                }
                if cand.depth == 0 {
                    cand.depth = analysis.depth;
                }

                let stm = cand.pos.side_to_move();
                let mut tail = analysis.pv;
                tail.truncate(ctx.cfg.max_moves);
                let applied = cand.pos.push_uci_pv(&tail);
                cand.pv.extend(applied);

                if cand.pv.len() >= ctx.cfg.max_horizon {
                    // Horizon reached: defer this line until a recalculation
                    // truncates it.
                    debug!("iteration {i}: {} deferred at horizon", root.move_to_uci(mv));
                    cand.pruned_at = Some(i);
                }

                Score::pov(cp, stm).to_pov(root_stm)
            };

            cand.eval = Some(value);

            if value.compare(&best_value) == Ordering::Greater {
                if best_move != Some(mv) {
                    best_move_changes += 1;
                }
                best_value = value;
                best_move = Some(mv);
            }
        }

        // Pass complete: report it and commit the leader.
        if let Some(bm) = best_move {
            if let Some(cand) = candidates.get(&bm) {
                let pv_str = root.pv_to_uci(&cand.pv);
                let elapsed = started.elapsed();
                reporter.iteration(&IterationInfo {
                    iteration: i,
                    seldepth: cand.depth,
                    score_cp: best_value.value(),
                    nodes: total_nodes,
                    nps: nps_so_far(total_nodes, elapsed),
                    time_ms: elapsed.as_millis() as u64,
                    pv: &pv_str,
                });
            }
            committed = Some((bm, best_value));
        }

        // Refresh pruning against the new leader.
        let margin = Score::pov(prune_margin(best_value.value(), i), root_stm);
        for (mv, cand) in candidates.iter_mut() {
            if let Some(ev) = cand.eval {
                if ev.compare(&margin) == Ordering::Less {
                    cand.pruned_at = Some(i);
                    debug!("iteration {i}: pruned {} (margin {})", root.move_to_uci(*mv), margin.value());
                }
            }
        }
        root_moves_size = root_moves
            .iter()
            .filter(|&&m| candidates.get(&m).map_or(true, |c| c.pruned_at.is_none()))
            .count();

        // Concentrate the remaining budget once the field has collapsed.
        if (root_moves_size as f64) < policy.narrow_fraction * root_moves.len() as f64 {
            if let Some(bm) = best_move {
                if let Some(cand) = candidates.get_mut(&bm) {
                    cand.extra = if cand.extra == 1.0 { 1.2 } else { cand.extra * 1.25 };
                }
            }
        }

        // Recalculation: truncate stale lines and restart pruning when the
        // field narrowed sharply or the leader's value moved too far.
        let frac = root_moves_size as f64 / root_moves.len() as f64;
        if (frac < policy.narrow_fraction
            || best_value.gap(&prev_best_value).abs() > policy.best_drop
            || best_value.gap(&root_score).abs() > policy.root_drop)
            && i64::from(i) - prev_recalc_iter >= i64::from(policy.min_gap_iters)
        {
            for (mv, cand) in candidates.iter_mut() {
                cand.pruned_at = None;
                let Some(ev) = cand.eval else { continue };

                // Promising lines keep more of their history; weak lines are
                // substantially reset.
                let mut p = promising(ev.value(), best_value.value(), root_moves_size, i, best_move == Some(*mv));
                p = p.min(0.85);
                p += cand.pv.len() as f64 / 200.0;
                p = p.min(0.9 + f64::from(i) / 100.0).min(1.0);

                let keep = ((cand.pv.len() as f64 * p) as usize).max(1 + (i / 20) as usize);
                cand.pv.truncate(keep);

                let mut pos = root.clone();
                let applied = pos.push_pv(&cand.pv);
                cand.pv.truncate(applied);
                cand.pos = pos;
                debug!("iteration {i}: kept {} moves of {}", cand.pv.len(), root.move_to_uci(*mv));
            }
            default_nodes *= 1.5;
            root_moves_size = root_moves.len();
            prev_best_value = best_value;
            best_value = Score::pov(-VALUE_INFINITE, root_stm);
            prev_recalc_iter = i64::from(i);
        }

        i += 1;
    }

    emit_final(
        root, &candidates, committed, root_best.as_deref(), root_ponder.as_deref(),
        root_score, total_nodes, params.max_iters, StopReason::IterationLimit, reporter,
    )
}

fn analyse_with_retry<E: Evaluator>(
    evaluator: &mut E,
    retry_used: &mut bool,
    pos: &Position,
    limit: &SearchLimit,
) -> Result<Analysis, ClientError> {
    match evaluator.analyse(pos, limit) {
        Ok(a) => Ok(a),
        Err(e) => {
            if *retry_used {
                return Err(e);
            }
            // One reconnect-and-retry per search invocation.
            *retry_used = true;
            warn!("evaluator call failed ({e}), restarting");
            evaluator.restart()?;
            evaluator.ensure_ready()?;
            evaluator.analyse(pos, limit)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn emit_final(
    root: &Position,
    candidates: &HashMap<Move, Candidate>,
    committed: Option<(Move, Score)>,
    fallback: Option<&str>,
    fallback_ponder: Option<&str>,
    root_score: Score,
    total_nodes: u64,
    iterations: u32,
    stop: StopReason,
    reporter: &mut dyn Reporter,
) -> SearchResult {
    let (bestmove, ponder, score_cp) = match committed {
        Some((bm, bv)) => {
            let best = root.move_to_uci(bm);
            let ponder = candidates
                .get(&bm)
                .map(|c| root.pv_to_strings(&c.pv))
                .and_then(|strs| strs.get(1).cloned());
            (Some(best), ponder, bv.value())
        }
        None => (
            fallback.map(|s| s.to_string()),
            fallback_ponder.map(|s| s.to_string()),
            root_score.value(),
        ),
    };
    reporter.bestmove(bestmove.as_deref(), ponder.as_deref());
    SearchResult { bestmove, ponder, score_cp, nodes: total_nodes, iterations, stop }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

fn nps_so_far(total_nodes: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { (total_nodes as f64 / secs) as u64 } else { 0 }
}
