use crate::engine::resource::EngineParams;
use crate::search::budget::NodeBudget;
use crate::search::root::SearchConfig;

/// UCI option registry. Per the protocol, invalid or out-of-range values are
/// ignored and the prior value is retained.
#[derive(Clone, Debug)]
pub struct Options {
    pub engine_path: String,
    pub max_moves: usize,
    pub nodes: Option<u64>,
    pub nodes_auto_scale: u32,
    pub threads: u32,
    pub hash_mb: u32,
    pub move_overhead: u64,
    pub max_iterations: u32,
    pub max_horizon: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            engine_path: "stockfish".to_string(),
            max_moves: 5,
            nodes: None,
            nodes_auto_scale: 100,
            threads: 1,
            hash_mb: 16,
            move_overhead: 100,
            max_iterations: 256,
            max_horizon: 30,
        }
    }
}

impl Options {
    /// Apply a `setoption` value. Returns `None` for an unknown option,
    /// otherwise whether an evaluator-side parameter changed.
    pub fn set(&mut self, name: &str, value: &str) -> Option<bool> {
        match name {
            "ENGINE_PATH" => {
                if !value.is_empty() {
                    self.engine_path = value.to_string();
                }
                Some(true)
            }
            "MAX_MOVES" => {
                if let Some(v) = spin(value, 1, 100) {
                    self.max_moves = v as usize;
                }
                Some(false)
            }
            "Nodes" => {
                match NodeBudget::parse(value) {
                    Some(NodeBudget::Fixed(n)) if n <= 1 << 32 => self.nodes = Some(n),
                    Some(NodeBudget::Automatic { .. }) => self.nodes = None,
                    _ => {}
                }
                Some(false)
            }
            "NodesAutoScale" => {
                if let Some(v) = spin(value, 10, 1000) {
                    self.nodes_auto_scale = v as u32;
                }
                Some(false)
            }
            "Threads" => {
                if let Some(v) = spin(value, 1, 1024) {
                    self.threads = v as u32;
                }
                Some(true)
            }
            "Hash" => {
                if let Some(v) = spin(value, 1, 1 << 25) {
                    self.hash_mb = v as u32;
                }
                Some(true)
            }
            "Move Overhead" => {
                if let Some(v) = spin(value, 0, 5000) {
                    self.move_overhead = v;
                }
                Some(false)
            }
            "MAX_ITERATIONS" => {
                if let Some(v) = spin(value, 1, 1024) {
                    self.max_iterations = v as u32;
                }
                Some(false)
            }
            "MAX_HORIZON" => {
                if let Some(v) = spin(value, 4, 200) {
                    self.max_horizon = v as usize;
                }
                Some(false)
            }
            _ => None,
        }
    }

    pub fn uci_options_string(&self) -> String {
        [
            "option name ENGINE_PATH type string default stockfish",
            "option name MAX_MOVES type spin default 5 min 1 max 100",
            "option name Nodes type string default auto",
            "option name NodesAutoScale type spin default 100 min 10 max 1000",
            "option name Threads type spin default 1 min 1 max 1024",
            "option name Hash type spin default 16 min 1 max 33554432",
            "option name Move Overhead type spin default 100 min 0 max 5000",
            "option name MAX_ITERATIONS type spin default 256 min 1 max 1024",
            "option name MAX_HORIZON type spin default 30 min 4 max 200",
        ]
        .join("\n")
    }

    pub fn node_budget(&self) -> NodeBudget {
        match self.nodes {
            Some(n) => NodeBudget::Fixed(n),
            None => NodeBudget::Automatic { scale: f64::from(self.nodes_auto_scale) / 100.0 },
        }
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            node_budget: self.node_budget(),
            threads: self.threads,
            max_moves: self.max_moves,
            max_horizon: self.max_horizon,
            move_overhead: self.move_overhead,
        }
    }

    pub fn engine_params(&self) -> EngineParams {
        EngineParams {
            path: self.engine_path.clone().into(),
            threads: self.threads,
            hash_mb: self.hash_mb,
        }
    }
}

fn spin(value: &str, min: u64, max: u64) -> Option<u64> {
    value.parse::<u64>().ok().filter(|v| (min..=max).contains(v))
}
