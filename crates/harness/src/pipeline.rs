//! End-to-end pipeline: plaintext reference against the oblivious scan

use oblivids_gdfa::{Dfa, ScanReport, Sparsity, Verdict};

use crate::error::{HarnessError, Result};
use crate::plaintext::{PlaintextScanner, ScanTrace};
use crate::secure::SecureScanner;

/// Both scans of one input
#[derive(Debug)]
pub struct ScanComparison {
    pub plaintext: ScanTrace,
    pub secure: ScanReport,
}

impl ScanComparison {
    pub fn verdicts_match(&self) -> bool {
        self.plaintext.verdict == self.secure.verdict()
    }

    /// The oblivious scan consumed exactly the bytes the reference did
    pub fn steps_match(&self) -> bool {
        self.plaintext.steps() as u64 == self.secure.result.steps
    }
}

/// Runs the same DFA in the clear and obliviously
pub struct ScanPipeline {
    pub plaintext: PlaintextScanner,
    pub secure: SecureScanner,
    seed: u64,
}

impl ScanPipeline {
    pub fn new(dfa: Dfa, sparsity: Sparsity, seed: u64) -> Result<Self> {
        let secure = SecureScanner::build(dfa.clone(), sparsity, seed)?;
        Ok(Self {
            plaintext: PlaintextScanner::new(dfa),
            secure,
            seed,
        })
    }

    /// Pipeline at the smallest sparsity the DFA admits
    pub fn minimal(dfa: Dfa, seed: u64) -> Result<Self> {
        let sparsity = dfa.min_sparsity()?;
        Self::new(dfa, sparsity, seed)
    }

    pub fn run_plaintext(&self, input: &[u8]) -> Result<ScanTrace> {
        self.plaintext.scan(input)
    }

    pub fn run_secure(&self, input: &[u8]) -> Result<ScanReport> {
        self.secure.scan(input, self.seed)
    }

    pub fn compare(&self, input: &[u8]) -> Result<ScanComparison> {
        Ok(ScanComparison {
            plaintext: self.run_plaintext(input)?,
            secure: self.run_secure(input)?,
        })
    }

    /// Fail unless both scans agree on verdict and bytes consumed
    pub fn verify(&self, input: &[u8]) -> Result<Verdict> {
        let comparison = self.compare(input)?;
        if !comparison.verdicts_match() {
            return Err(HarnessError::VerificationFailed {
                message: format!(
                    "verdict mismatch on {} bytes: plaintext {}, secure {}",
                    input.len(),
                    comparison.plaintext.verdict,
                    comparison.secure.verdict()
                ),
            });
        }
        if !comparison.steps_match() {
            return Err(HarnessError::VerificationFailed {
                message: format!(
                    "step mismatch: plaintext {}, secure {}",
                    comparison.plaintext.steps(),
                    comparison.secure.result.steps
                ),
            });
        }
        Ok(comparison.plaintext.verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::{random_dfa, random_input, RandomDfaConfig};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_verify_random_inputs() {
        let mut rng = ChaCha20Rng::seed_from_u64(12);
        let dfa = random_dfa(&mut rng, &RandomDfaConfig::default());
        let pipeline = ScanPipeline::minimal(dfa, 13).unwrap();

        for len in [0, 1, 7, 20] {
            let input = random_input(&mut rng, b"abcdef", len);
            pipeline.verify(&input).unwrap();
        }
    }

    #[test]
    fn test_padded_sparsity_agrees() {
        let mut rng = ChaCha20Rng::seed_from_u64(14);
        let dfa = random_dfa(&mut rng, &RandomDfaConfig::default());
        let minimal = dfa.min_sparsity().unwrap();
        let padded = Sparsity::new(minimal.outmax + 3, minimal.cmax + 1).unwrap();
        let pipeline = ScanPipeline::new(dfa, padded, 15).unwrap();

        let input = random_input(&mut rng, b"xyz", 12);
        pipeline.verify(&input).unwrap();
    }
}
