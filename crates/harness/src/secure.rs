//! Oblivious scanning over an in-process OT session
//!
//! The server half (slot table and OT sender) and the client half (package
//! and scan client) run in one process; every message still goes through
//! the frame codec.

use std::sync::Arc;

use oblivids_gdfa::{
    evaluate_local, run_local, Dfa, EvalResult, GdfaBuilder, GdfaPackage, ScanClient, ScanReport,
    ServerTable, Sparsity,
};
use oblivids_ot::{OtSender, OtSessionConfig};
use tracing::debug;

use crate::error::Result;

/// A garbled rule set and the server table that answers for it
pub struct SecureScanner {
    package: GdfaPackage,
    table: Arc<ServerTable>,
    config: OtSessionConfig,
}

impl SecureScanner {
    /// Garble `dfa` with a seeded build
    pub fn build(dfa: Dfa, sparsity: Sparsity, seed: u64) -> Result<Self> {
        let (package, table) = GdfaBuilder::with_seed(dfa, sparsity, seed)?
            .build()
            .into_package()?;
        Ok(Self {
            package,
            table: Arc::new(table),
            config: OtSessionConfig::default(),
        })
    }

    /// Garble `dfa` at the smallest sparsity it admits
    pub fn build_minimal(dfa: Dfa, seed: u64) -> Result<Self> {
        let sparsity = dfa.min_sparsity()?;
        Self::build(dfa, sparsity, seed)
    }

    pub fn with_config(mut self, config: OtSessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn package(&self) -> &GdfaPackage {
        &self.package
    }

    pub fn table(&self) -> &ServerTable {
        &self.table
    }

    /// Fresh OT sender for one session
    pub fn server(&self, seed: u64) -> OtSender<ServerTable> {
        OtSender::new(Arc::clone(&self.table), self.config.clone(), self.package.info())
            .with_seed(seed)
    }

    /// Scan `input` over a full OT session
    pub fn scan(&self, input: &[u8], seed: u64) -> Result<ScanReport> {
        let mut server = self.server(seed.wrapping_add(1));
        let client = ScanClient::new(self.package.clone(), input).with_seed(seed);
        let report = run_local(client, &mut server)?;
        debug!(rounds = report.rounds, verdict = %report.verdict(), "scan finished");
        Ok(report)
    }

    /// Scan `input` with tokens taken straight from the table
    pub fn scan_direct(&self, input: &[u8]) -> Result<EvalResult> {
        Ok(evaluate_local(&self.package, &self.table, input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oblivids_gdfa::{DfaBuilder, Verdict};

    fn dfa() -> Dfa {
        let mut builder = DfaBuilder::new();
        let s = builder.add_state();
        let mid = builder.add_state();
        let hit = builder.add_state();
        builder.add_transition(s, b'<', mid);
        builder.add_transition(s, oblivids_gdfa::ByteSet::single(b'<').complement(), s);
        builder.add_transition(mid, b'?', hit);
        builder.add_transition(mid, oblivids_gdfa::ByteSet::single(b'?').complement(), s);
        builder.add_transition(hit, oblivids_gdfa::ByteSet::full(), hit);
        builder.set_accepting(hit, 5);
        builder.build().unwrap()
    }

    #[test]
    fn test_scan_matches_direct() {
        let scanner = SecureScanner::build_minimal(dfa(), 3).unwrap();
        for input in [&b"ab<?cd"[..], b"<<>?", b""] {
            let report = scanner.scan(input, 9).unwrap();
            let direct = scanner.scan_direct(input).unwrap();
            assert_eq!(report.verdict(), direct.verdict());
        }
    }

    #[test]
    fn test_scan_reports_attack() {
        let scanner = SecureScanner::build_minimal(dfa(), 4).unwrap();
        let report = scanner.scan(b"x<?", 1).unwrap();
        assert_eq!(report.verdict(), Verdict::Attack(5));
        assert!(report.bytes_sent > 0 && report.bytes_received > 0);
    }
}
