//! JSON-RPC provider client

use crate::types::{
    methods, ProviderParams, RetrievalQueryParams, RpcRequest, RpcResponse, StartTransferParams,
};
use crate::{ClientConfig, ClientError, Result};
use async_trait::async_trait;
use cid::Cid;
use filc_core::{
    ChannelId, DealProposal, ProposalResponse, ProviderAddress, ProviderClient, QueryResponse,
    StorageAsk, TransferStatus,
};
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, instrument};

/// Provider client speaking JSON-RPC to a storage gateway
pub struct RpcProviderClient {
    config: ClientConfig,
    http: Client,
    next_id: AtomicU64,
}

impl RpcProviderClient {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        let user_agent = header::HeaderValue::from_str(&config.user_agent)
            .map_err(|e| ClientError::Config(format!("invalid user agent: {}", e)))?;
        headers.insert(header::USER_AGENT, user_agent);

        if let Some(token) = &config.access_token {
            let mut auth = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ClientError::Config(format!("invalid access token: {}", e)))?;
            auth.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, auth);
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self {
            config,
            http,
            next_id: AtomicU64::new(1),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Invoke `method` and decode its result
    async fn call<P: Serialize, T: DeserializeOwned>(&self, method: &str, params: P) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);

        debug!(method, id, "Sending RPC request to {}", self.config.endpoint);
        let response = self
            .http
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: RpcResponse<T> = serde_json::from_slice(&response.bytes().await?)?;
        if let Some(err) = body.error {
            return Err(ClientError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        if body.id.is_some_and(|got| got != id) {
            return Err(ClientError::InvalidResponse(format!(
                "response id {:?} does not match request id {}",
                body.id, id
            )));
        }

        body.result
            .ok_or_else(|| ClientError::InvalidResponse(format!("{} returned no result", method)))
    }
}

#[async_trait]
impl ProviderClient for RpcProviderClient {
    #[instrument(skip(self), fields(provider = %provider))]
    async fn get_ask(&self, provider: &ProviderAddress) -> filc_core::Result<StorageAsk> {
        let params = ProviderParams {
            provider: provider.as_str(),
        };
        Ok(self.call(methods::GET_ASK, params).await?)
    }

    #[instrument(skip(self, proposal), fields(provider = %proposal.provider, root = %proposal.root))]
    async fn submit_proposal(&self, proposal: &DealProposal) -> filc_core::Result<ProposalResponse> {
        Ok(self.call(methods::SUBMIT_PROPOSAL, proposal).await?)
    }

    #[instrument(skip(self), fields(provider = %provider))]
    async fn start_transfer(
        &self,
        provider: &ProviderAddress,
        proposal: &Cid,
        root: &Cid,
    ) -> filc_core::Result<ChannelId> {
        let params = StartTransferParams {
            provider: provider.as_str(),
            proposal: proposal.to_string(),
            root: root.to_string(),
        };
        Ok(self.call(methods::START_TRANSFER, params).await?)
    }

    async fn get_transfer_status(&self, channel: &ChannelId) -> filc_core::Result<TransferStatus> {
        Ok(self.call(methods::TRANSFER_STATUS, channel).await?)
    }

    #[instrument(skip(self), fields(provider = %provider))]
    async fn retrieval_query(
        &self,
        provider: &ProviderAddress,
        root: &Cid,
    ) -> filc_core::Result<QueryResponse> {
        let params = RetrievalQueryParams {
            provider: provider.as_str(),
            root: root.to_string(),
        };
        Ok(self.call(methods::RETRIEVAL_QUERY, params).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filc_core::{CoreError, ProposalState, QueryStatus, TokenAmount, TransferStatusCode};
    use rstest::rstest;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider() -> ProviderAddress {
        "f01234".parse().unwrap()
    }

    fn root() -> Cid {
        filc_blockstore::Block::raw(b"payload".as_slice()).cid
    }

    async fn client_for(server: &MockServer) -> RpcProviderClient {
        RpcProviderClient::new(ClientConfig::new(format!("{}/rpc/v0", server.uri()))).unwrap()
    }

    fn rpc_result(result: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "result": result,
        }))
    }

    #[tokio::test]
    async fn test_get_ask() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc/v0"))
            .and(body_partial_json(json!({
                "method": "Filc.GetAsk",
                "params": [{"provider": "f01234"}],
            })))
            .respond_with(rpc_result(json!({
                "provider": "f01234",
                "price": "500000000",
                "verified_price": "0",
                "min_piece_size": 256,
                "max_piece_size": 34359738368u64,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ask = client_for(&server).await.get_ask(&provider()).await.unwrap();
        assert_eq!(ask.price, TokenAmount(500_000_000));
        assert_eq!(ask.price_for(true), TokenAmount(0));
        assert_eq!(ask.max_piece_size, 32 << 30);
    }

    #[tokio::test]
    async fn test_submit_proposal() {
        let server = MockServer::start().await;
        let proposal = DealProposal {
            provider: provider(),
            root: root(),
            price_per_epoch: TokenAmount(10),
            start_epoch_offset: 0,
            duration_epochs: 2880 * 365,
            verified: true,
        };
        let proposal_cid = proposal.proposal_cid().unwrap();

        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "method": "Filc.SubmitProposal",
                "params": [{"root": root().to_string(), "verified": true, "price_per_epoch": "10"}],
            })))
            .respond_with(rpc_result(json!({
                "state": 18,
                "message": "",
                "proposal": proposal_cid.to_string(),
            })))
            .mount(&server)
            .await;

        let response = client_for(&server).await.submit_proposal(&proposal).await.unwrap();
        assert_eq!(response.state, ProposalState::WaitingForData);
        assert_eq!(response.proposal, proposal_cid);
    }

    #[rstest]
    #[case(1, TransferStatusCode::Ongoing)]
    #[case(7, TransferStatusCode::Failing)]
    #[case(42, TransferStatusCode::Other(42))]
    #[tokio::test]
    async fn test_transfer_status(#[case] code: u64, #[case] expected: TransferStatusCode) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "Filc.TransferStatus"})))
            .respond_with(rpc_result(json!({"status": code, "message": "", "sent": 99})))
            .mount(&server)
            .await;

        let channel = ChannelId {
            initiator: "client".to_string(),
            responder: "f01234".to_string(),
            id: 3,
        };
        let status = client_for(&server)
            .await
            .get_transfer_status(&channel)
            .await
            .unwrap();
        assert_eq!(status.status, expected);
        assert_eq!(status.sent, 99);
    }

    #[tokio::test]
    async fn test_start_transfer_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "Filc.StartTransfer"})))
            .respond_with(rpc_result(json!({
                "initiator": "client",
                "responder": "f01234",
                "id": 12,
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "Filc.RetrievalQuery"})))
            .respond_with(rpc_result(json!({
                "status": 1,
                "size": 2048,
                "unseal_price": "0",
                "min_price_per_byte": "1",
                "payment_address": "f01234",
                "max_payment_interval": 1048576,
                "max_payment_interval_increase": 1048576,
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let channel = client.start_transfer(&provider(), &root(), &root()).await.unwrap();
        assert_eq!(channel.id, 12);

        let query = client.retrieval_query(&provider(), &root()).await.unwrap();
        assert_eq!(query.status, QueryStatus::Unavailable);
        assert!(!query.piece_cid_found);
    }

    #[tokio::test]
    async fn test_rpc_error_maps_to_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32000, "message": "provider offline"},
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).await.get_ask(&provider()).await.unwrap_err();
        assert!(matches!(err, CoreError::Provider(ref msg) if msg.contains("provider offline")));
    }

    #[tokio::test]
    async fn test_http_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .call::<_, serde_json::Value>(methods::GET_ASK, ProviderParams { provider: "f01" })
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 401, ref body } if body == "unauthorized"));
    }

    #[tokio::test]
    async fn test_bearer_token_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer s3cret"))
            .respond_with(rpc_result(json!({"status": 6, "sent": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let client = RpcProviderClient::new(
            ClientConfig::new(format!("{}/rpc/v0", server.uri())).with_token("s3cret"),
        )
        .unwrap();
        let channel = ChannelId {
            initiator: "a".to_string(),
            responder: "b".to_string(),
            id: 1,
        };
        let status = client.get_transfer_status(&channel).await.unwrap();
        assert_eq!(status.status, TransferStatusCode::Completed);
    }

    #[tokio::test]
    async fn test_missing_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jsonrpc": "2.0"})))
            .mount(&server)
            .await;

        let err = client_for(&server).await.get_ask(&provider()).await.unwrap_err();
        assert!(matches!(err, CoreError::Provider(_)));
    }
}
