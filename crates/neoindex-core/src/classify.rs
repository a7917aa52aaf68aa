//! NEP5 token-contract classification.
//!
//! This is a heuristic substring test over raw bytecode, not a disassembly:
//! a contract qualifies iff its script contains the byte representation of
//! every canonical method name. Compiled NEP5 contracts push those names as
//! literals, so the test is cheap and accurate in practice; false positives
//! are handled via the blacklist, which wins unconditionally. Pure function,
//! no I/O, so it stays unit-testable in isolation.

use std::collections::HashSet;

/// The six methods a fungible token contract must expose.
pub const NEP5_METHODS: [&str; 6] = [
    "totalSupply",
    "name",
    "symbol",
    "decimals",
    "balanceOf",
    "transfer",
];

/// Returns `true` if `needle` occurs as a contiguous byte substring.
fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}

/// Classify a contract script as a NEP5 token.
///
/// `true` iff the contract is not blacklisted and the script contains all of
/// [`NEP5_METHODS`].
pub fn is_token_contract(script: &[u8], contract_hash: &str, blacklist: &HashSet<String>) -> bool {
    if blacklist.contains(contract_hash) {
        return false;
    }
    NEP5_METHODS
        .iter()
        .all(|method| contains_bytes(script, method.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A fake script embedding the given method names between opcode noise.
    fn script_with(methods: &[&str]) -> Vec<u8> {
        let mut script = vec![0x51, 0xc5, 0x6b];
        for method in methods {
            script.push(method.len() as u8);
            script.extend_from_slice(method.as_bytes());
            script.push(0x7c);
        }
        script.extend_from_slice(&[0x61, 0x6c, 0x75, 0x66]);
        script
    }

    #[test]
    fn full_interface_classifies() {
        let script = script_with(&NEP5_METHODS);
        assert!(is_token_contract(&script, "0xtoken", &HashSet::new()));
    }

    #[test]
    fn one_missing_method_rejects() {
        for skip in 0..NEP5_METHODS.len() {
            let partial: Vec<&str> = NEP5_METHODS
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, m)| *m)
                .collect();
            let script = script_with(&partial);
            assert!(
                !is_token_contract(&script, "0xtoken", &HashSet::new()),
                "should reject without {:?}",
                NEP5_METHODS[skip]
            );
        }
    }

    #[test]
    fn blacklist_wins_over_interface() {
        let script = script_with(&NEP5_METHODS);
        let blacklist = HashSet::from(["0xspam".to_string()]);
        assert!(!is_token_contract(&script, "0xspam", &blacklist));
        assert!(is_token_contract(&script, "0xother", &blacklist));
    }

    #[test]
    fn empty_script_rejects() {
        assert!(!is_token_contract(&[], "0xtoken", &HashSet::new()));
    }
}
