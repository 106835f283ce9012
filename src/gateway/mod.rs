pub mod checkpoint;
pub mod quorum;
pub mod retry;
pub mod scheduler;
pub mod stages;

use std::sync::Arc;

use crate::chain::types::{InputAccountMap, MultisigAccount, SignerAccount};
use crate::chain::ExternalChainAdapter;
use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::ledger::models::AccountAttachment;
use crate::ledger::LedgerAdapter;

/// Everything a stage needs, constructed once at startup and passed by
/// reference. No ambient globals.
pub struct GatewayContext {
    pub config: Config,
    pub ledger: Arc<dyn LedgerAdapter>,
    pub chain: Arc<dyn ExternalChainAdapter>,
}

impl GatewayContext {
    pub fn new(
        config: Config,
        ledger: Arc<dyn LedgerAdapter>,
        chain: Arc<dyn ExternalChainAdapter>,
    ) -> Self {
        Self {
            config,
            ledger,
            chain,
        }
    }

    /// Name of the gateway this node serves, if gateway mode is enabled.
    pub fn gateway_name(&self) -> Option<&str> {
        self.config.gateway_name.as_deref()
    }

    /// This node's external-chain signing material.
    pub fn signer(&self) -> SignerAccount {
        SignerAccount {
            private_key: self.config.out_secret.clone(),
        }
    }
}

/// Resolve the redeem script for every source address of an unsigned
/// transaction: the multisig account's own script when the address is the
/// multisig address, otherwise the registered gateway account's
/// attachment. A source address with no gateway account is an error.
pub async fn resolve_input_accounts(
    ledger: &dyn LedgerAdapter,
    inputs: &[String],
    multisig: &MultisigAccount,
) -> GatewayResult<InputAccountMap> {
    let mut map = InputAccountMap::new();
    for address in inputs {
        let redeem_script = if multisig.address == *address {
            multisig.redeem_script.clone()
        } else {
            let account = ledger
                .account_by_out_address(address)
                .await?
                .ok_or_else(|| GatewayError::UnknownInputAddress(address.clone()))?;
            AccountAttachment::parse(&account.attachment)?.redeem_script
        };
        map.insert(address.clone(), redeem_script);
    }
    Ok(map)
}
