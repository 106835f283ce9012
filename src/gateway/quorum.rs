use std::sync::Arc;
use tracing::debug;

use crate::chain::types::MultisigAccount;
use crate::chain::ExternalChainAdapter;
use crate::error::{GatewayError, GatewayResult};
use crate::ledger::models::GatewayMember;
use crate::ledger::LedgerAdapter;

/// Derives the current M-of-N multisig account from the elected validator
/// roster and decides when a withdrawal has collected enough partial
/// signatures to be finalized.
pub struct QuorumCoordinator {
    ledger: Arc<dyn LedgerAdapter>,
    chain: Arc<dyn ExternalChainAdapter>,
}

impl QuorumCoordinator {
    pub fn new(ledger: Arc<dyn LedgerAdapter>, chain: Arc<dyn ExternalChainAdapter>) -> Self {
        Self { ledger, chain }
    }

    /// Signatures required to spend: floor(N/2) + 1.
    pub fn threshold(elected: usize) -> usize {
        elected / 2 + 1
    }

    /// Derive the cold multisig account for the elected roster.
    ///
    /// Keys are sorted into canonical (lexicographic) order first, so any
    /// permutation of the same roster yields the same address. An empty
    /// roster means there is no active quorum and is an error.
    pub async fn derive_multisig(
        &self,
        gateway: &str,
        members: &[GatewayMember],
    ) -> GatewayResult<MultisigAccount> {
        if members.is_empty() {
            return Err(GatewayError::NoElectedValidators(gateway.to_string()));
        }

        let mut keys: Vec<String> = members
            .iter()
            .map(|m| m.out_public_key.clone())
            .collect();
        keys.sort();

        let threshold = Self::threshold(keys.len());
        let account = self
            .chain
            .derive_multisig_address(gateway, threshold, &keys, true)
            .await?;
        debug!(gateway, address = %account.address, threshold, "derived multisig account");
        Ok(account)
    }

    /// Whether at least `threshold` partial-signature rows exist for the
    /// withdrawal.
    pub async fn has_quorum(&self, wid: &str, threshold: usize) -> GatewayResult<bool> {
        let preps = self.ledger.withdrawal_preps(wid).await?;
        Ok(preps.len() >= threshold)
    }
}
