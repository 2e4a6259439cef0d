use cozy_chess::{Board, Color, GameStatus, Move, Piece};

/// Terminal game state of a position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Mate { winner: Color },
    Draw,
}

/// Clone-and-play position handle. The search never inspects piece placement;
/// it only derives successors, enumerates legal moves, and detects terminal
/// states, all through this wrapper.
#[derive(Clone, Debug)]
pub struct Position {
    board: Board,
}

impl Position {
    pub fn startpos() -> Self {
        Self { board: Board::default() }
    }

    pub fn from_fen(fen: &str) -> Result<Self, String> {
        Board::from_fen(fen, false)
            .map(|b| Self { board: b })
            .map_err(|e| format!("FEN error: {e:?}"))
    }

    pub fn set_from_start_and_moves(moves: &[String]) -> Result<Self, String> {
        let mut pos = Self::startpos();
        for m in moves {
            pos.make_move_uci(m)?;
        }
        Ok(pos)
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn fen(&self) -> String {
        format!("{}", self.board)
    }

    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    /// Plies played since the start of the game, derived from the move
    /// counters carried in the position.
    pub fn ply(&self) -> u32 {
        let fullmove = u32::from(self.board.fullmove_number()).max(1);
        (fullmove - 1) * 2 + u32::from(self.board.side_to_move() == Color::Black)
    }

    /// Legal moves in generation order. This order is stable for a given
    /// position and doubles as the root-move enumeration order.
    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::with_capacity(64);
        self.board.generate_moves(|ml| {
            for m in ml {
                moves.push(m);
            }
            false
        });
        moves
    }

    pub fn play(&mut self, m: Move) {
        self.board.play(m);
    }

    /// Locate the legal move matching a UCI token. Standard castling notation
    /// (`e1g1`) is mapped onto cozy-chess's king-takes-rook encoding.
    pub fn find_uci_move(&self, uci: &str) -> Option<Move> {
        let mut found = None;
        self.board.generate_moves(|ml| {
            for m in ml {
                if format!("{m}") == uci {
                    found = Some(m);
                    break;
                }
            }
            found.is_some()
        });
        if found.is_none() {
            if let Some(alias) = castle_alias(uci) {
                return self.find_uci_move(alias);
            }
        }
        found
    }

    pub fn make_move_uci(&mut self, uci: &str) -> Result<(), String> {
        match self.find_uci_move(uci) {
            Some(m) => {
                self.board.play(m);
                Ok(())
            }
            None => Err(format!("Illegal move: {uci}")),
        }
    }

    /// UCI text for a move of this position, with cozy-chess's king-takes-rook
    /// castling encoding mapped back to the standard king destination.
    pub fn move_to_uci(&self, m: Move) -> String {
        let s = format!("{m}");
        if self.board.piece_on(m.from) == Some(Piece::King)
            && self.board.colors(self.board.side_to_move()).has(m.to)
        {
            return match s.as_str() {
                "e1h1" => "e1g1".to_string(),
                "e1a1" => "e1c1".to_string(),
                "e8h8" => "e8g8".to_string(),
                "e8a8" => "e8c8".to_string(),
                _ => s,
            };
        }
        s
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.board.status() {
            GameStatus::Won => Some(Outcome::Mate { winner: !self.board.side_to_move() }),
            GameStatus::Drawn => Some(Outcome::Draw),
            GameStatus::Ongoing => {
                if self.board.halfmove_clock() >= 100 {
                    Some(Outcome::Draw)
                } else {
                    None
                }
            }
        }
    }

    pub fn is_game_over(&self) -> bool {
        self.outcome().is_some()
    }

    /// Replay a stored line, stopping at a terminal position or a move that
    /// no longer applies. Returns how many moves were played.
    pub fn push_pv(&mut self, pv: &[Move]) -> usize {
        let mut applied = 0;
        for &m in pv {
            if self.is_game_over() || self.board.try_play(m).is_err() {
                break;
            }
            applied += 1;
        }
        applied
    }

    /// Apply evaluator-reported UCI tokens, stopping at the first token that
    /// is not a legal move here. Returns the moves actually played.
    pub fn push_uci_pv(&mut self, pv: &[String]) -> Vec<Move> {
        let mut applied = Vec::with_capacity(pv.len());
        for token in pv {
            if self.is_game_over() {
                break;
            }
            match self.find_uci_move(token) {
                Some(m) => {
                    self.board.play(m);
                    applied.push(m);
                }
                None => break,
            }
        }
        applied
    }

    /// UCI tokens for a stored line starting at this position.
    pub fn pv_to_strings(&self, pv: &[Move]) -> Vec<String> {
        let mut walk = self.clone();
        let mut out = Vec::with_capacity(pv.len());
        for &m in pv {
            let token = walk.move_to_uci(m);
            if walk.board.try_play(m).is_err() {
                break;
            }
            out.push(token);
        }
        out
    }

    pub fn pv_to_uci(&self, pv: &[Move]) -> String {
        self.pv_to_strings(pv).join(" ")
    }
}

fn castle_alias(uci: &str) -> Option<&'static str> {
    match uci {
        "e1g1" => Some("e1h1"),
        "e1c1" => Some("e1a1"),
        "e8g8" => Some("e8h8"),
        "e8c8" => Some("e8a8"),
        _ => None,
    }
}
