use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, trace};
use thiserror::Error;

use crate::board::position::Position;
use crate::search::score::Score;
use crate::search::timeman::Clock;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const READY_TIMEOUT: Duration = Duration::from_secs(30);
const REPLY_TIMEOUT: Duration = Duration::from_secs(600);
const QUIT_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to launch evaluator '{path}': {source}")]
    Spawn { path: PathBuf, source: std::io::Error },
    #[error("evaluator i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed evaluator reply: {0}")]
    Protocol(String),
    #[error("evaluator did not answer within {0:?}")]
    Timeout(Duration),
    #[error("evaluator process is not running")]
    NotRunning,
}

/// Resource limit for one evaluator call; exactly one of these applies.
#[derive(Clone, Copy, Debug)]
pub enum SearchLimit {
    Nodes(u64),
    MoveTime(u64),
    Clock(Clock),
}

impl SearchLimit {
    pub fn to_go(&self) -> String {
        match *self {
            SearchLimit::Nodes(n) => format!("go nodes {}", n.max(1)),
            SearchLimit::MoveTime(ms) => format!("go movetime {}", ms.max(1)),
            SearchLimit::Clock(c) => format!(
                "go wtime {} btime {} winc {} binc {}",
                c.wtime, c.btime, c.winc, c.binc
            ),
        }
    }
}

/// Parsed result of one evaluator call. `score_cp` is relative to the side to
/// move of the analysed position, with mate distances folded into the
/// centipawn scale.
#[derive(Clone, Debug, Default)]
pub struct Analysis {
    pub score_cp: Option<i32>,
    pub pv: Vec<String>,
    pub nodes: u64,
    pub depth: u32,
    pub seldepth: u32,
    pub nps: u64,
    pub time_ms: u64,
    pub bestmove: Option<String>,
}

impl Analysis {
    fn update_from_info(&mut self, line: &str) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let mut i = 0;
        while i < tokens.len() {
            match tokens[i] {
                "depth" => {
                    if let Some(v) = tokens.get(i + 1).and_then(|t| t.parse().ok()) {
                        self.depth = v;
                    }
                }
                "seldepth" => {
                    if let Some(v) = tokens.get(i + 1).and_then(|t| t.parse().ok()) {
                        self.seldepth = v;
                    }
                }
                "nodes" => {
                    if let Some(v) = tokens.get(i + 1).and_then(|t| t.parse().ok()) {
                        self.nodes = v;
                    }
                }
                "nps" => {
                    if let Some(v) = tokens.get(i + 1).and_then(|t| t.parse().ok()) {
                        self.nps = v;
                    }
                }
                "time" => {
                    if let Some(v) = tokens.get(i + 1).and_then(|t| t.parse().ok()) {
                        self.time_ms = v;
                    }
                }
                "score" => match tokens.get(i + 1) {
                    Some(&"cp") => {
                        if let Some(v) = tokens.get(i + 2).and_then(|t| t.parse().ok()) {
                            self.score_cp = Some(v);
                        }
                        i += 1;
                    }
                    Some(&"mate") => {
                        if let Some(v) = tokens.get(i + 2).and_then(|t| t.parse().ok()) {
                            self.score_cp = Some(Score::from_mate_distance(v));
                        }
                        i += 1;
                    }
                    _ => {}
                },
                "pv" => {
                    self.pv = tokens[i + 1..].iter().map(|t| t.to_string()).collect();
                    break;
                }
                _ => {}
            }
            i += 1;
        }
    }
}

/// Synchronous client for one external UCI evaluator subprocess. A dedicated
/// reader thread feeds replies through a channel so every wait carries a
/// timeout instead of blocking on the pipe.
pub struct UciClient {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    rx: Receiver<String>,
}

impl UciClient {
    pub fn spawn(path: &Path, threads: u32, hash_mb: u32) -> Result<Self, ClientError> {
        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ClientError::Spawn { path: path.to_path_buf(), source })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClientError::Protocol("no stdin handle".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClientError::Protocol("no stdout handle".to_string()))?;

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines().map_while(Result::ok) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        let mut client = UciClient { child, stdin: BufWriter::new(stdin), rx };
        client.send("uci")?;
        client.wait_for("uciok", HANDSHAKE_TIMEOUT)?;
        client.configure(threads, hash_mb)?;
        debug!("evaluator ready: {}", path.display());
        Ok(client)
    }

    pub fn configure(&mut self, threads: u32, hash_mb: u32) -> Result<(), ClientError> {
        self.send(&format!("setoption name Threads value {threads}"))?;
        self.send(&format!("setoption name Hash value {hash_mb}"))?;
        self.ping()
    }

    /// Liveness probe: `isready`/`readyok` round trip.
    pub fn ping(&mut self) -> Result<(), ClientError> {
        self.send("isready")?;
        self.wait_for("readyok", READY_TIMEOUT)
    }

    pub fn analyse_fen(&mut self, fen: &str, limit: &SearchLimit) -> Result<Analysis, ClientError> {
        self.send(&format!("position fen {fen}"))?;
        self.send(&limit.to_go())?;

        let started = Instant::now();
        let mut analysis = Analysis::default();
        loop {
            match self.rx.recv_timeout(REPLY_TIMEOUT) {
                Ok(line) => {
                    trace!("evaluator: {line}");
                    if line.starts_with("info") {
                        analysis.update_from_info(&line);
                    } else if line.starts_with("bestmove") {
                        analysis.bestmove = line.split_whitespace().nth(1).map(|s| s.to_string());
                        if analysis.time_ms == 0 {
                            analysis.time_ms = started.elapsed().as_millis() as u64;
                        }
                        return Ok(analysis);
                    }
                }
                Err(RecvTimeoutError::Timeout) => return Err(ClientError::Timeout(REPLY_TIMEOUT)),
                Err(RecvTimeoutError::Disconnected) => return Err(ClientError::NotRunning),
            }
        }
    }

    fn send(&mut self, cmd: &str) -> Result<(), ClientError> {
        trace!("-> evaluator: {cmd}");
        writeln!(self.stdin, "{cmd}")?;
        self.stdin.flush()?;
        Ok(())
    }
}

impl Drop for UciClient {
    fn drop(&mut self) {
        // Best effort: quit politely, then make sure nothing is left behind.
        let _ = self.send("quit");
        let deadline = Instant::now() + QUIT_GRACE;
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) if Instant::now() < deadline => thread::sleep(Duration::from_millis(20)),
                _ => break,
            }
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl UciClient {
    fn wait_for(&mut self, expected: &str, timeout: Duration) -> Result<(), ClientError> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            match self.rx.recv_timeout(Duration::from_millis(100)) {
                Ok(line) => {
                    trace!("evaluator: {line}");
                    if line.starts_with(expected) {
                        return Ok(());
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return Err(ClientError::NotRunning),
            }
        }
        Err(ClientError::Timeout(timeout))
    }
}

/// The seam the root search drives. `UciClient` speaks to the real
/// subprocess; tests substitute a scripted stand-in.
pub trait Evaluator {
    fn ensure_ready(&mut self) -> Result<(), ClientError>;
    fn restart(&mut self) -> Result<(), ClientError>;
    fn analyse(&mut self, pos: &Position, limit: &SearchLimit) -> Result<Analysis, ClientError>;
}
