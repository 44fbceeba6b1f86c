//! Gateway proxy event model.
//!
//! [`Input`] is what the gateway sends for each request; [`Output`] is the
//! single result value the function returns. The gateway freely sends
//! `null` for absent strings and maps, so every inbound field falls back to
//! its empty value.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer, Serialize};

/// Identity information associated with the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Identity {
    #[serde(deserialize_with = "null_default")]
    pub api_key: String,
    #[serde(deserialize_with = "null_default")]
    pub account_id: String,
    #[serde(deserialize_with = "null_default")]
    pub user_agent: String,
    #[serde(deserialize_with = "null_default")]
    pub source_ip: String,
    #[serde(deserialize_with = "null_default")]
    pub access_key: String,
    #[serde(deserialize_with = "null_default")]
    pub caller: String,
    #[serde(deserialize_with = "null_default")]
    pub user: String,
    #[serde(deserialize_with = "null_default")]
    pub user_arn: String,
    #[serde(deserialize_with = "null_default")]
    pub cognito_identity_id: String,
    #[serde(deserialize_with = "null_default")]
    pub cognito_identity_pool_id: String,
    #[serde(deserialize_with = "null_default")]
    pub cognito_authentication_type: String,
    #[serde(deserialize_with = "null_default")]
    pub cognito_authentication_provider: String,
}

/// Contextual information provided by the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestContext {
    #[serde(deserialize_with = "null_default")]
    pub api_id: String,
    #[serde(deserialize_with = "null_default")]
    pub resource_id: String,
    #[serde(deserialize_with = "null_default")]
    pub request_id: String,
    #[serde(deserialize_with = "null_default")]
    pub http_method: String,
    #[serde(deserialize_with = "null_default")]
    pub resource_path: String,
    #[serde(deserialize_with = "null_default")]
    pub account_id: String,
    #[serde(deserialize_with = "null_default")]
    pub stage: String,
    #[serde(deserialize_with = "null_default")]
    pub identity: Identity,
}

/// Inbound proxy event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Input {
    #[serde(deserialize_with = "null_default")]
    pub http_method: String,
    #[serde(deserialize_with = "null_default")]
    pub headers: HashMap<String, String>,
    #[serde(deserialize_with = "null_default")]
    pub resource: String,
    #[serde(deserialize_with = "null_default")]
    pub path_parameters: HashMap<String, String>,
    #[serde(deserialize_with = "null_default")]
    pub path: String,
    #[serde(deserialize_with = "null_default")]
    pub query_string_parameters: HashMap<String, String>,
    #[serde(deserialize_with = "null_default")]
    pub body: String,
    #[serde(deserialize_with = "null_default")]
    pub is_base64_encoded: bool,
    #[serde(deserialize_with = "null_default")]
    pub stage_variables: HashMap<String, String>,
    #[serde(deserialize_with = "null_default")]
    pub request_context: RequestContext,
}

/// The invocation result returned to the gateway.
///
/// Produced exactly once per request by
/// [`ResponseWriter::finalize`](crate::ResponseWriter::finalize).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
