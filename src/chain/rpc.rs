use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::*;
use super::ExternalChainAdapter;
use crate::error::{GatewayError, GatewayResult};

/// JSON-RPC client for the external chain's gateway helper node, which
/// wraps the chain's wallet/transaction primitives behind one endpoint.
pub struct ChainRpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct TransactionsPage {
    transactions: Vec<ChainTransaction>,
}

impl ChainRpcClient {
    pub fn new(url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> GatewayResult<T> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .json::<RpcResponse<T>>()
            .await?;

        if let Some(error) = response.error {
            return Err(GatewayError::Chain(format!(
                "{} failed: {} (code {})",
                method, error.message, error.code
            )));
        }

        response
            .result
            .ok_or_else(|| GatewayError::Chain(format!("{} returned no result", method)))
    }
}

#[async_trait]
impl ExternalChainAdapter for ChainRpcClient {
    async fn import_address(&self, address: &str) -> GatewayResult<()> {
        self.call::<Value>("importaddress", json!([address])).await?;
        Ok(())
    }

    async fn transactions_from_height(
        &self,
        height: i64,
    ) -> GatewayResult<Vec<ChainTransaction>> {
        let page: TransactionsPage = self
            .call("gettransactionsfromheight", json!([height]))
            .await?;
        Ok(page.transactions)
    }

    async fn create_transaction(
        &self,
        from: &MultisigAccount,
        outputs: &[TxOutput],
    ) -> GatewayResult<UnsignedTransaction> {
        self.call("createtransaction", json!([from, outputs])).await
    }

    async fn sign_transaction(
        &self,
        transaction: &UnsignedTransaction,
        signer: &SignerAccount,
        inputs: &InputAccountMap,
    ) -> GatewayResult<PartialSignatureSet> {
        self.call(
            "signtransaction",
            json!([transaction, { "privateKey": signer.private_key }, inputs]),
        )
        .await
    }

    async fn build_transaction(
        &self,
        transaction: &UnsignedTransaction,
        signatures: &[PartialSignatureSet],
        inputs: &InputAccountMap,
    ) -> GatewayResult<String> {
        self.call("buildtransaction", json!([transaction, signatures, inputs]))
            .await
    }

    async fn send_raw_transaction(&self, raw: &str) -> GatewayResult<String> {
        self.call("sendrawtransaction", json!([raw])).await
    }

    async fn derive_multisig_address(
        &self,
        gateway: &str,
        threshold: usize,
        sorted_keys: &[String],
        cold: bool,
    ) -> GatewayResult<MultisigAccount> {
        self.call(
            "createmultisig",
            json!([gateway, threshold, sorted_keys, cold]),
        )
        .await
    }
}
