use cozy_chess::Color;

/// Game clock state in milliseconds, as received from the front end.
#[derive(Clone, Copy, Debug, Default)]
pub struct Clock {
    pub wtime: u64,
    pub btime: u64,
    pub winc: u64,
    pub binc: u64,
}

impl Clock {
    pub fn new(wtime: u64, btime: u64, winc: u64, binc: u64) -> Self {
        Self { wtime, btime, winc, binc }
    }

    pub fn time(&self, c: Color) -> u64 {
        match c {
            Color::White => self.wtime,
            Color::Black => self.btime,
        }
    }

    pub fn inc(&self, c: Color) -> u64 {
        match c {
            Color::White => self.winc,
            Color::Black => self.binc,
        }
    }
}

/// Two-tier time budget: spend `opt_time` under normal circumstances, never
/// exceed `max_time`. Much of the calculation is derived from Stockfish.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimeManager {
    pub opt_time: u64,
    pub max_time: u64,
}

impl TimeManager {
    pub fn init(clock: &Clock, us: Color, ply: u32, overhead_ms: u64) -> Self {
        let time = clock.time(us) as f64;
        if time == 0.0 {
            // Untimed game: rely on node/iteration ceilings alone.
            return Self::default();
        }
        let inc = clock.inc(us) as f64;
        let overhead = overhead_ms as f64;
        let ply = ply as f64;

        let time_left = (time + inc * 49.0 - overhead).max(1.0);

        // Use extra time with larger increments, less with zero increment.
        let opt_extra = if inc > 0.0 {
            (1.0 + 0.4 * (600.0 * inc / time).log10()).clamp(1.0, 1.25)
        } else {
            0.8
        };

        // Use more time when we are well ahead of the opponent on the clock.
        let them = !us;
        let their_time = clock.time(them) as f64;
        let mut adv_extra = 1.0;
        if their_time > 0.0 && their_time < time {
            let time_ratio = time / their_time;
            let inc_ratio = clock.inc(them) as f64 / inc;
            let e = 1.0 + 0.2 * time_ratio.log10() + 0.1 * time_ratio - 1.0 * inc_ratio.log10();
            if !e.is_nan() {
                adv_extra = e.clamp(1.0, 3.0);
            }
        }

        let opt_scale = ((0.88 + ply / 116.4) / 50.0).min(0.88 * time / time_left) * opt_extra * adv_extra;
        let max_scale = (3.0 + 0.05 * ply).min(6.5);

        // Never use more than a ply-scaled percentage of the remaining time.
        let opt_provisional = (opt_scale * time_left).max(1.0);
        let max_time_percent = (0.70 + 0.001 * ply).min(0.90);
        let max_time = (max_time_percent * time - overhead)
            .min(max_scale * opt_provisional)
            .max(1.0) as u64;
        let opt_time = (opt_provisional as u64).min(max_time);

        Self { opt_time, max_time }
    }

    pub fn is_timed(&self) -> bool {
        self.opt_time > 0 || self.max_time > 0
    }
}
