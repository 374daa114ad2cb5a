//! Random DFAs for property tests

use rand::seq::index::sample;
use rand::Rng;

use oblivids_gdfa::{ByteSet, CharGroup, Dfa, State};

/// Shape of a random DFA
#[derive(Debug, Clone, Copy)]
pub struct RandomDfaConfig {
    pub states: usize,
    /// Upper bound on distinct targets per state
    pub max_targets: usize,
    /// Extra groups per state repeating bytes of an existing group
    pub overlap: usize,
    /// Probability that a non-start state accepts
    pub accept_probability: f64,
}

impl Default for RandomDfaConfig {
    fn default() -> Self {
        Self {
            states: 8,
            max_targets: 4,
            overlap: 0,
            accept_probability: 0.2,
        }
    }
}

/// Draw a total, deterministic DFA.
///
/// Every byte of a state belongs to exactly one primary group; overlap
/// groups only repeat bytes with the same target, so the automaton stays
/// deterministic while `cmax` grows.
pub fn random_dfa<R: Rng>(rng: &mut R, config: &RandomDfaConfig) -> Dfa {
    let n = config.states.max(1);
    let mut states = Vec::with_capacity(n);

    for index in 0..n {
        let k = rng.gen_range(1..=config.max_targets.clamp(1, n));
        let targets = sample(rng, n, k).into_vec();

        let mut sets = vec![ByteSet::empty(); k];
        for byte in 0..=255u8 {
            // The first k bytes seed every group so none is empty
            let g = if (byte as usize) < k {
                byte as usize
            } else {
                rng.gen_range(0..k)
            };
            sets[g].insert(byte);
        }

        let mut groups: Vec<CharGroup> = sets
            .into_iter()
            .zip(&targets)
            .map(|(symbols, &target)| CharGroup {
                symbols,
                target: target as u32,
            })
            .collect();

        for _ in 0..config.overlap {
            let base = groups[rng.gen_range(0..k)].clone();
            let symbols: ByteSet = base.symbols.iter().filter(|_| rng.gen_bool(0.5)).collect();
            if !symbols.is_empty() {
                groups.push(CharGroup {
                    symbols,
                    target: base.target,
                });
            }
        }

        let attack_id = (index != 0 && rng.gen_bool(config.accept_probability))
            .then(|| rng.gen_range(1..=1000u32));
        states.push(State { groups, attack_id });
    }

    Dfa { start: 0, states }
}

/// Random input of `len` bytes drawn from `alphabet`
pub fn random_input<R: Rng>(rng: &mut R, alphabet: &[u8], len: usize) -> Vec<u8> {
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_random_dfa_is_valid() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        for overlap in [0, 2] {
            let config = RandomDfaConfig {
                overlap,
                ..Default::default()
            };
            let dfa = random_dfa(&mut rng, &config);
            dfa.validate(&dfa.min_sparsity().unwrap()).unwrap();
        }
    }

    #[test]
    fn test_overlap_raises_cmax() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let config = RandomDfaConfig {
            states: 4,
            overlap: 3,
            ..Default::default()
        };
        let dfa = random_dfa(&mut rng, &config);
        assert!(dfa.min_sparsity().unwrap().cmax > 1);
    }
}
