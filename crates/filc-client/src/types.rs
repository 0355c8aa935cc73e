//! JSON-RPC envelope and parameter types

use serde::{Deserialize, Serialize};

/// Method names exposed by the provider gateway
pub mod methods {
    pub const GET_ASK: &str = "Filc.GetAsk";
    pub const SUBMIT_PROPOSAL: &str = "Filc.SubmitProposal";
    pub const START_TRANSFER: &str = "Filc.StartTransfer";
    pub const TRANSFER_STATUS: &str = "Filc.TransferStatus";
    pub const RETRIEVAL_QUERY: &str = "Filc.RetrievalQuery";
}

/// JSON-RPC 2.0 request
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a, P> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    /// Positional parameters; every method takes a single object
    pub params: (P,),
}

impl<'a, P> RpcRequest<'a, P> {
    pub fn new(id: u64, method: &'a str, params: P) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params: (params,),
        }
    }
}

/// JSON-RPC 2.0 response
#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    #[serde(default)]
    pub id: Option<u64>,
    pub result: Option<T>,
    pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ProviderParams<'a> {
    pub provider: &'a str,
}

#[derive(Debug, Serialize)]
pub struct StartTransferParams<'a> {
    pub provider: &'a str,
    pub proposal: String,
    pub root: String,
}

#[derive(Debug, Serialize)]
pub struct RetrievalQueryParams<'a> {
    pub provider: &'a str,
    pub root: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = RpcRequest::new(7, methods::GET_ASK, ProviderParams { provider: "f01234" });
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "Filc.GetAsk",
                "params": [{"provider": "f01234"}],
            })
        );
    }

    #[test]
    fn test_error_response() {
        let response: RpcResponse<u64> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"no ask"}}"#,
        )
        .unwrap();

        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().message, "no ask");
    }
}
