use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::warn;

use crate::board::position::Position;
use crate::engine::resource::EngineResource;
use crate::options::Options;
use crate::search::root::{self, IterationInfo, Reporter, SearchContext, SearchParams};
use crate::search::timeman::Clock;

pub const ENGINE_NAME: &str = "PVpilot";
pub const ENGINE_AUTHOR: &str = "PVpilot Team";

const STOP_JOIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Prints search progress in UCI wire format.
pub struct UciReporter;

impl Reporter for UciReporter {
    fn iteration(&mut self, info: &IterationInfo) {
        println!(
            "info depth {} seldepth {} score cp {} nodes {} nps {} time {} pv {}",
            info.iteration, info.seldepth, info.score_cp, info.nodes, info.nps, info.time_ms, info.pv
        );
    }

    fn currmove(&mut self, iteration: u32, mv: &str, number: usize, total_nodes: u64) {
        println!("info depth {iteration} currmove {mv} currmovenumber {number} nodes {total_nodes}");
    }

    fn bestmove(&mut self, best: Option<&str>, ponder: Option<&str>) {
        match (best, ponder) {
            (Some(b), Some(p)) => println!("bestmove {b} ponder {p}"),
            (Some(b), None) => println!("bestmove {b}"),
            (None, _) => println!("bestmove 0000"),
        }
    }
}

struct ActiveSearch {
    cancel: Arc<AtomicBool>,
    done: Arc<(Mutex<bool>, Condvar)>,
    handle: JoinHandle<()>,
}

pub struct UciEngine {
    pos: Position,
    opts: Options,
    engine: Arc<EngineResource>,
    active: Option<ActiveSearch>,
}

impl UciEngine {
    pub fn new(opts: Options) -> Self {
        let engine = Arc::new(EngineResource::new(opts.engine_params()));
        Self { pos: Position::startpos(), opts, engine, active: None }
    }

    pub fn run_loop(&mut self) {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(s) => s.trim().to_string(),
                Err(_) => break,
            };
            if line.is_empty() {
                continue;
            }
            if !self.handle_command(&line) {
                break;
            }
        }
        self.shutdown();
    }

    /// Dispatch one command line. Returns false when the loop should exit.
    pub fn handle_command(&mut self, line: &str) -> bool {
        if line == "uci" {
            self.cmd_uci();
        } else if line == "isready" {
            println!("readyok");
        } else if line == "ucinewgame" {
            self.cmd_ucinewgame();
        } else if line == "quit" {
            return false;
        } else if line == "stop" {
            self.stop_active();
        } else if let Some(rest) = line.strip_prefix("position ") {
            self.cmd_position(rest);
        } else if line == "go" {
            self.cmd_go("");
        } else if let Some(rest) = line.strip_prefix("go ") {
            self.cmd_go(rest);
        } else if let Some(rest) = line.strip_prefix("setoption ") {
            self.cmd_setoption(rest);
        } else {
            println!("Unknown command: '{line}'.");
        }
        true
    }

    fn cmd_uci(&self) {
        println!("id name {} {}", ENGINE_NAME, env!("CARGO_PKG_VERSION"));
        println!("id author {ENGINE_AUTHOR}");
        println!("{}", self.opts.uci_options_string());
        println!("uciok");
    }

    fn cmd_ucinewgame(&mut self) {
        self.stop_active();
        self.pos = Position::startpos();
    }

    fn cmd_position(&mut self, args: &str) {
        // 'position startpos [moves ...]' or 'position fen <fen> [moves ...]'
        let mut tokens = args.split_whitespace();
        let mut pos = match tokens.next() {
            Some("startpos") => Position::startpos(),
            Some("fen") => {
                let fen_fields: Vec<&str> = tokens.by_ref().take(6).collect();
                if fen_fields.len() < 6 {
                    return;
                }
                match Position::from_fen(&fen_fields.join(" ")) {
                    Ok(p) => p,
                    Err(_) => return,
                }
            }
            _ => return,
        };
        if let Some("moves") = tokens.next() {
            for mv in tokens {
                if pos.make_move_uci(mv).is_err() {
                    break;
                }
            }
        }
        self.pos = pos;
    }

    fn cmd_go(&mut self, args: &str) {
        // A running search must release the evaluator before a new one starts.
        self.stop_active();

        let mut params = SearchParams { max_iters: self.opts.max_iterations, ..Default::default() };
        if args.trim().is_empty() {
            params.max_iters = 10;
        }
        let mut clock = Clock::default();
        let mut has_clock = false;
        let mut tokens = args.split_whitespace();
        while let Some(tok) = tokens.next() {
            match tok {
                "depth" => {
                    if let Some(v) = tokens.next().and_then(|s| s.parse().ok()) {
                        params.max_iters = v;
                    }
                }
                "nodes" => {
                    if let Some(v) = tokens.next().and_then(|s| s.parse().ok()) {
                        params.max_nodes = Some(v);
                    }
                }
                "movetime" => {
                    if let Some(v) = tokens.next().and_then(|s| s.parse().ok()) {
                        params.movetime = Some(v);
                    }
                }
                "infinite" => {
                    params.max_iters = self.opts.max_iterations;
                }
                "wtime" => {
                    if let Some(v) = tokens.next().and_then(|s| s.parse().ok()) {
                        clock.wtime = v;
                        has_clock = true;
                    }
                }
                "btime" => {
                    if let Some(v) = tokens.next().and_then(|s| s.parse().ok()) {
                        clock.btime = v;
                        has_clock = true;
                    }
                }
                "winc" => {
                    if let Some(v) = tokens.next().and_then(|s| s.parse().ok()) {
                        clock.winc = v;
                    }
                }
                "binc" => {
                    if let Some(v) = tokens.next().and_then(|s| s.parse().ok()) {
                        clock.binc = v;
                    }
                }
                _ => {}
            }
        }
        if has_clock {
            params.clock = Some(clock);
        }

        let cfg = self.opts.search_config();
        let cancel = Arc::new(AtomicBool::new(false));
        let done = Arc::new((Mutex::new(false), Condvar::new()));
        let engine = self.engine.clone();
        let pos = self.pos.clone();
        let thread_cancel = cancel.clone();
        let thread_done = done.clone();
        let handle = thread::spawn(move || {
            let mut ctx = SearchContext::with_cancel(cfg, thread_cancel);
            let mut lease = engine.acquire();
            let mut reporter = UciReporter;
            let _ = root::search(&mut ctx, &mut lease, &pos, &params, &mut reporter);
            let (lock, cv) = &*thread_done;
            *lock.lock().unwrap() = true;
            cv.notify_all();
        });
        self.active = Some(ActiveSearch { cancel, done, handle });
    }

    fn cmd_setoption(&mut self, args: &str) {
        // FORMAT: name <id> [value <x>]
        let tokens: Vec<&str> = args.split_whitespace().collect();
        if tokens.first() != Some(&"name") {
            return;
        }
        let value_index = tokens.iter().position(|&t| t == "value").unwrap_or(tokens.len());
        let name = tokens[1..value_index].join(" ");
        let value = tokens.get(value_index + 1..).unwrap_or(&[]).join(" ");
        match self.opts.set(&name, &value) {
            Some(true) => self.engine.reconfigure(self.opts.engine_params()),
            Some(false) => {}
            None => println!("No such option: '{name}'. Type 'uci' for all options."),
        }
    }

    /// Request cancellation of a running search and wait briefly for it to
    /// finish. A search that overruns the wait keeps the evaluator lock, so a
    /// following `go` still serializes behind it.
    pub fn stop_active(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.store(true, Ordering::Relaxed);
            let finished = Self::wait_done(&active.done, Some(STOP_JOIN_TIMEOUT));
            if finished {
                let _ = active.handle.join();
            } else {
                warn!("search did not stop within {STOP_JOIN_TIMEOUT:?}");
            }
        }
    }

    /// Let a running search finish on its own (batch mode).
    pub fn wait_active(&mut self) {
        if let Some(active) = self.active.take() {
            Self::wait_done(&active.done, None);
            let _ = active.handle.join();
        }
    }

    fn wait_done(done: &Arc<(Mutex<bool>, Condvar)>, timeout: Option<Duration>) -> bool {
        let (lock, cv) = &**done;
        let mut finished = lock.lock().unwrap();
        match timeout {
            Some(t) => {
                while !*finished {
                    let (guard, res) = cv.wait_timeout(finished, t).unwrap();
                    finished = guard;
                    if res.timed_out() {
                        break;
                    }
                }
            }
            None => {
                while !*finished {
                    finished = cv.wait(finished).unwrap();
                }
            }
        }
        *finished
    }

    pub fn shutdown(&mut self) {
        self.stop_active();
        self.engine.shutdown();
    }

    pub fn position(&self) -> &Position {
        &self.pos
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }
}
