//! Chou-Orlandi base OT over Ristretto
//!
//! The base-OT sender publishes `S = y·G` once. For every index `i` the
//! receiver answers `R_i = c_i·S + x_i·G`. Keys are bound to the index so that
//! reusing `S` across all κ transfers does not correlate them:
//!
//! - sender: `k0_i = H(y·R_i, i, 0)`, `k1_i = H(y·(R_i − S), i, 1)`
//! - receiver: `k_i = H(x_i·S, i, c_i)` which equals `k{c_i}_i`
//!
//! In the extension the *client* is the base-OT sender and the *server* the
//! base-OT receiver, whose choice bits form its secret Δ.

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_TABLE;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand::{CryptoRng, RngCore};
use subtle::{Choice, ConditionallySelectable};
use zeroize::Zeroize;

use crate::crypto::{hash_point, prg, xor_in_place, Block, POINT_BYTES};
use crate::error::{OtError, Result};

fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    let mut bytes = [0u8; 64];
    rng.fill_bytes(&mut bytes);
    let scalar = Scalar::from_bytes_mod_order_wide(&bytes);
    bytes.zeroize();
    scalar
}

/// Decode a compressed point, rejecting non-canonical encodings and the identity
pub fn decode_point(bytes: &[u8]) -> Result<RistrettoPoint> {
    let compressed = CompressedRistretto::from_slice(bytes).map_err(|_| OtError::InvalidPoint)?;
    let point = compressed.decompress().ok_or(OtError::InvalidPoint)?;
    if point == RistrettoPoint::identity() {
        return Err(OtError::InvalidPoint);
    }
    Ok(point)
}

fn decode_points(blob: &[u8]) -> Result<Vec<RistrettoPoint>> {
    if blob.is_empty() || blob.len() % POINT_BYTES != 0 {
        return Err(OtError::InvalidMessageFormat(format!(
            "point blob of {} bytes",
            blob.len()
        )));
    }
    blob.chunks(POINT_BYTES).map(decode_point).collect()
}

/// Mask `msg` under a base-OT key
fn mask(key: &Block, index: usize, msg: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; msg.len()];
    prg(key, index as u64, &mut out);
    xor_in_place(&mut out, msg);
    out
}

/// Base-OT sender: holds `y` and learns both keys of every transfer
pub struct BaseOtSender {
    y: Scalar,
    s: RistrettoPoint,
}

impl BaseOtSender {
    /// Sample `y` and compute the public point `S`
    pub fn setup<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let y = random_scalar(rng);
        let s = &y * RISTRETTO_BASEPOINT_TABLE;
        Self { y, s }
    }

    /// Compressed `S`, sent once per session
    pub fn public_key(&self) -> [u8; POINT_BYTES] {
        self.s.compress().to_bytes()
    }

    /// Derive `(k0_i, k1_i)` from the receiver's blinded points
    pub fn derive_keys(&self, blinded: &[u8]) -> Result<Vec<(Block, Block)>> {
        let points = decode_points(blinded)?;

        Ok(points
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let k0 = hash_point(&(self.y * r), i, 0);
                let k1 = hash_point(&(self.y * (r - self.s)), i, 1);
                (k0, k1)
            })
            .collect())
    }

    /// Chosen-message transfer: `c_b = m_b ⊕ G(k_b)` for every pair.
    ///
    /// The two messages of a pair may differ in length.
    pub fn transfer(
        &self,
        blinded: &[u8],
        msgs: &[(Vec<u8>, Vec<u8>)],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let keys = self.derive_keys(blinded)?;
        if keys.len() != msgs.len() {
            return Err(OtError::InvalidInput(format!(
                "{} message pairs for {} blinded points",
                msgs.len(),
                keys.len()
            )));
        }

        msgs.iter()
            .zip(keys.iter())
            .enumerate()
            .map(|(i, ((m0, m1), (k0, k1)))| Ok((mask(k0, i, m0), mask(k1, i, m1))))
            .collect()
    }
}

impl Drop for BaseOtSender {
    fn drop(&mut self) {
        self.y.zeroize();
    }
}

/// Base-OT receiver: learns one key per index, for its choice bit
pub struct BaseOtReceiver {
    choices: Vec<bool>,
    keys: Vec<Block>,
}

impl BaseOtReceiver {
    /// Blind every choice against the sender's public point.
    ///
    /// Returns the receiver and the concatenated compressed `R_i`.
    pub fn choose<R: RngCore + CryptoRng>(
        public_key: &[u8],
        choices: &[bool],
        rng: &mut R,
    ) -> Result<(Self, Vec<u8>)> {
        if choices.is_empty() {
            return Err(OtError::InvalidInput("no choice bits".into()));
        }
        let s = decode_point(public_key)?;

        let mut blinded = Vec::with_capacity(choices.len() * POINT_BYTES);
        let mut keys = Vec::with_capacity(choices.len());

        for (i, &c) in choices.iter().enumerate() {
            let mut x = random_scalar(rng);
            let x_g = &x * RISTRETTO_BASEPOINT_TABLE;
            let r = RistrettoPoint::conditional_select(&x_g, &(s + x_g), Choice::from(c as u8));
            blinded.extend_from_slice(r.compress().as_bytes());
            keys.push(hash_point(&(x * s), i, c as u8));
            x.zeroize();
        }

        Ok((
            Self {
                choices: choices.to_vec(),
                keys,
            },
            blinded,
        ))
    }

    /// `k_i = k{c_i}_i` for every index
    pub fn keys(&self) -> &[Block] {
        &self.keys
    }

    /// The choice bits this receiver committed to
    pub fn choices(&self) -> &[bool] {
        &self.choices
    }

    /// Unmask the chosen message of each pair
    pub fn receive(&self, ciphertexts: &[(Vec<u8>, Vec<u8>)]) -> Result<Vec<Vec<u8>>> {
        if ciphertexts.len() != self.keys.len() {
            return Err(OtError::InvalidMessageFormat(format!(
                "{} ciphertext pairs for {} choices",
                ciphertexts.len(),
                self.keys.len()
            )));
        }

        Ok(ciphertexts
            .iter()
            .zip(self.keys.iter().zip(self.choices.iter()))
            .enumerate()
            .map(|(i, ((c0, c1), (key, &choice)))| {
                let c = select_bytes(c0, c1, Choice::from(choice as u8));
                mask(key, i, &c)
            })
            .collect())
    }

    /// Consume the receiver, yielding its keys
    pub fn into_keys(mut self) -> Vec<Block> {
        std::mem::take(&mut self.keys)
    }
}

/// `b` when `choice` is set, else `a`, without branching on `choice`.
///
/// Both inputs are read over the longer length; only the final truncation
/// depends on the selected length.
fn select_bytes(a: &[u8], b: &[u8], choice: Choice) -> Vec<u8> {
    let len = u64::conditional_select(&(a.len() as u64), &(b.len() as u64), choice) as usize;
    let mut out: Vec<u8> = (0..a.len().max(b.len()))
        .map(|j| {
            let x = a.get(j).copied().unwrap_or(0);
            let y = b.get(j).copied().unwrap_or(0);
            u8::conditional_select(&x, &y, choice)
        })
        .collect();
    out.truncate(len);
    out
}

impl Drop for BaseOtReceiver {
    fn drop(&mut self) {
        self.keys.zeroize();
    }
}
