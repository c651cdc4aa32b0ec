//! The shared coin MO14 samples when `bin_values` doesn't single out a
//! value every node can safely decide on.

/// A common coin: every correct node must obtain the same bit for a given
/// round. The reference coin below is for development only — production
/// deployments should plug in a threshold signature scheme (e.g.
/// threshold-BLS) so the bit cannot be predicted before enough shares are
/// collected.
pub trait CommonCoin {
    /// Sample the coin for `round`. Must be deterministic given the round:
    /// every correct node calling this for the same round gets the same
    /// bit.
    fn flip(&self, round: u64) -> bool;
}

/// `c_r = r mod 2`. Only guarantees liveness under synchrony — a real
/// adversary can bias round parity. Good enough for tests and local
/// development, not for a production deployment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParityCoin;

impl CommonCoin for ParityCoin {
    fn flip(&self, round: u64) -> bool {
        round % 2 == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity_coin_is_deterministic_per_round() {
        let coin = ParityCoin;
        assert_eq!(coin.flip(4), coin.flip(4));
        assert_ne!(coin.flip(4), coin.flip(5));
    }
}
