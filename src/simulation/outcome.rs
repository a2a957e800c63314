//! Trade outcome draws and per-path random streams

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Result of a single fixed-bracket trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Take-profit hit
    Win,
    /// Stop-loss hit
    Loss,
}

impl Outcome {
    pub fn is_win(self) -> bool {
        self == Outcome::Win
    }
}

/// Draw one Bernoulli outcome: `Win` with probability `win_rate`.
///
/// Consumes exactly one uniform `[0, 1)` sample per call, so a seeded
/// stream replays the same outcome sequence.
pub fn draw_outcome<R: Rng + ?Sized>(win_rate: f64, rng: &mut R) -> Outcome {
    if rng.gen::<f64>() < win_rate {
        Outcome::Win
    } else {
        Outcome::Loss
    }
}

/// Independent random stream for path `path_index` under a master seed.
///
/// Every path shares the seed but reads its own ChaCha stream, so results
/// do not depend on which worker runs the path or in what order.
pub fn path_rng(seed: u64, path_index: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(path_index);
    rng
}
