//! Grouping of spendable outputs by the address that originally funded them.
//!
//! A change output carries a fresh key the user never saw, so listing it under its own address is
//! useless. Instead each change output is attributed to the address at the root of its change
//! chain: walk back through the first input of the spending transaction while the output is change,
//! that input is ours and its parent transaction is known.

use crate::engine::{OutPoint, WalletEngine, WalletOutput};

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

pub struct OutputGrouper<'a> {
    engine: &'a dyn WalletEngine,
    max_walk: usize,
}

impl<'a> OutputGrouper<'a> {
    pub fn new(engine: &'a dyn WalletEngine, max_walk: usize) -> Self {
        Self { engine, max_walk }
    }

    /// Spendable outputs plus the given locked outputs, keyed by funding address.
    ///
    /// Locked outputs whose transaction is unknown or conflicted are skipped. Outputs whose
    /// funding output pays to no extractable address are dropped.
    pub fn group_by_address(
        &self,
        locked: &BTreeSet<OutPoint>,
    ) -> BTreeMap<String, Vec<WalletOutput>> {
        let mut candidates = self.engine.available_outputs(None);
        let mut seen: BTreeSet<OutPoint> = candidates.iter().map(|o| o.outpoint()).collect();

        for outpoint in locked {
            if seen.contains(outpoint) {
                continue;
            }
            match self.engine.transaction(&outpoint.txid) {
                Some(tx) if tx.depth >= 0 => {
                    let depth = tx.depth;
                    candidates.push(WalletOutput::new(tx, outpoint.vout, depth));
                    seen.insert(*outpoint);
                }
                _ => debug!("Locked output {} is not listable", outpoint),
            }
        }

        let mut groups: BTreeMap<String, Vec<WalletOutput>> = BTreeMap::new();
        for output in candidates {
            let origin = self.funding_output(&output);
            let Some(address) = origin.txout().and_then(|o| o.script_pubkey.destination()) else {
                debug!("Output {} has no extractable destination", output.outpoint());
                continue;
            };
            groups.entry(address.to_string()).or_default().push(output);
        }
        groups
    }

    /// Follow `output` back through its change chain to the output that funded it.
    pub fn funding_output(&self, output: &WalletOutput) -> WalletOutput {
        let mut current = output.clone();
        for _ in 0..self.max_walk {
            let Some(txout) = current.txout() else {
                return current;
            };
            if !self.engine.is_change_output(txout) {
                return current;
            }
            let Some(first) = current.tx.inputs.first() else {
                return current;
            };
            if !self.engine.is_owned_input(first) {
                return current;
            }
            let Some(parent) = self.engine.transaction(&first.prevout.txid) else {
                return current;
            };
            current = WalletOutput::new(parent, first.prevout.vout, 0);
        }
        warn!(
            "Change chain of {} is longer than {} steps, stopping early",
            output.outpoint(),
            self.max_walk
        );
        current
    }
}
