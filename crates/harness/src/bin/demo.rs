//! End-to-end oblivious scanning demo
//!
//! This demo shows the full pipeline:
//! 1. Compile a few signatures into one DFA
//! 2. Garble it into a package plus server table
//! 3. Scan payloads over an in-process OT session
//! 4. Compare every verdict with the plaintext scan

use oblivids_gdfa::{ByteSet, Dfa, DfaBuilder};
use oblivids_harness::{PlaintextScanner, SecureScanner};

/// Trie automaton reporting the first signature seen anywhere in the input.
///
/// Failure transitions fall back to the start state, which is enough for
/// signatures that share no prefix with their own suffixes.
fn signature_dfa(signatures: &[(&[u8], u32)]) -> Result<Dfa, Box<dyn std::error::Error>> {
    let mut builder = DfaBuilder::new();
    let start = builder.add_state();
    let mut edges: Vec<Vec<(u8, u32)>> = vec![Vec::new()];

    for &(signature, attack_id) in signatures {
        let mut state = start;
        for &byte in signature {
            let existing = edges[state as usize]
                .iter()
                .find(|(b, _)| *b == byte)
                .map(|&(_, to)| to);
            state = match existing {
                Some(to) => to,
                None => {
                    let to = builder.add_state();
                    edges.push(Vec::new());
                    edges[state as usize].push((byte, to));
                    to
                }
            };
        }
        builder.set_accepting(state, attack_id);
    }

    let firsts: Vec<(u8, u32)> = edges[start as usize].clone();
    for (from, out) in edges.iter().enumerate() {
        let from = from as u32;
        let mut covered = ByteSet::empty();
        for &(byte, to) in out {
            builder.add_transition(from, byte, to);
            covered.insert(byte);
        }
        // Restart, possibly on the first byte of another signature
        for &(byte, to) in &firsts {
            if !covered.contains(byte) {
                builder.add_transition(from, byte, to);
                covered.insert(byte);
            }
        }
        builder.add_transition(from, covered.complement(), start);
    }

    Ok(builder.build()?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Oblivids Oblivious Scanning Demo ===\n");

    let signatures: &[(&[u8], u32)] = &[
        (b"/etc/passwd", 1001),
        (b"<script>", 1002),
        (b"UNION SELECT", 1003),
    ];

    println!("--- Rules ---");
    for (signature, attack_id) in signatures {
        println!("  {} -> attack {}", String::from_utf8_lossy(signature), attack_id);
    }

    let dfa = signature_dfa(signatures)?;
    let sparsity = dfa.min_sparsity()?;
    println!("\n--- Garbling ---");
    println!("  States: {}", dfa.num_states());
    println!("  outmax: {}, cmax: {}", sparsity.outmax, sparsity.cmax);

    let reference = PlaintextScanner::new(dfa.clone());
    let scanner = SecureScanner::build(dfa, sparsity, 2024)?;
    let header = scanner.package().header();
    println!("  Rows: {} x {} bytes", header.row_count, header.row_len);
    println!("  Entry: {} bytes", header.entry_len);
    println!("  Digest: {}", hex::encode(scanner.package().digest()));

    let payloads: &[&[u8]] = &[
        b"GET /index.html HTTP/1.1",
        b"GET /../../etc/passwd HTTP/1.1",
        b"q=1 UNION SELECT password FROM users",
        b"<p>hello</p><script>alert(1)</script>",
    ];

    println!("\n--- Scanning ---");
    for (i, payload) in payloads.iter().enumerate() {
        let report = scanner.scan(payload, i as u64)?;
        let expected = reference.scan(payload)?;
        let status = if expected.verdict == report.verdict() { "ok" } else { "MISMATCH" };
        println!(
            "  {:<40} {:<12} rounds={:<3} sent={:<6} received={:<8} [{}]",
            String::from_utf8_lossy(payload),
            report.verdict().to_string(),
            report.rounds,
            report.bytes_sent,
            report.bytes_received,
            status
        );
    }

    Ok(())
}
