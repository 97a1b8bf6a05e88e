//! HTTP graph store client
//!
//! Talks to a remote relation store over a JSON command endpoint:
//! `POST {url}/call/{command}` with the command's parameters as the body.
//!
//! Commands used:
//! - `nav_relation` `{_id, relation, withScores}` -> `{member: score}`
//! - `relation_score` `{_id, relation, items}` -> `{member: score | null}`
//! - `update_relations` `{_id, add?, remove?, incrBy?}` with encoded members
//!
//! Requests are sent once; the configured timeout bounds each call.

use crate::config::{StoreConfig, StoreToken};
use crate::error::{StoreError, StoreResult};
use crate::store::{GraphStore, RelationMember, RelationUpdate, Score};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Remote graph store client
pub struct HttpGraphStore {
    http: Client,
    config: StoreConfig,
    token: Option<StoreToken>,
}

impl HttpGraphStore {
    /// Create a new client from configuration
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .danger_accept_invalid_certs(!config.verify_ssl)
            .user_agent(format!("shark-fin/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(StoreError::Request)?;

        Ok(Self {
            http,
            config: config.clone(),
            token: config.token.clone().filter(|t| !t.is_empty()),
        })
    }

    fn authenticate(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        }
    }

    /// Send a command and return the successful response
    async fn send(&self, command: &str, params: &Value) -> StoreResult<Response> {
        let url = self.config.command_url(command);
        let request = self.authenticate(self.http.post(&url).json(params));

        let response = request.send().await.map_err(|e| {
            warn!(command, error = %e, "Graph store request failed");
            if e.is_timeout() {
                StoreError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                }
            } else {
                StoreError::Request(e)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(StoreError::from_response(status.as_u16(), &body))
    }

    /// Send a command and parse its JSON result
    #[instrument(skip(self, params), fields(command = %command))]
    async fn call<T: DeserializeOwned>(&self, command: &str, params: &Value) -> StoreResult<T> {
        let response = self.send(command, params).await?;
        let data = response.json().await.map_err(|e| {
            StoreError::InvalidResponse(format!("Failed to parse {} response: {}", command, e))
        })?;
        debug!("Graph store call completed");
        Ok(data)
    }

    fn encode_members(members: &BTreeMap<String, Vec<RelationMember>>) -> Value {
        let encoded: Map<String, Value> = members
            .iter()
            .map(|(relation, members)| {
                let members = members.iter().map(|m| Value::String(m.encode())).collect();
                (relation.clone(), Value::Array(members))
            })
            .collect();
        Value::Object(encoded)
    }
}

/// Scores may come back as numbers or as numeric strings
fn parse_score(value: &Value) -> StoreResult<Option<Score>> {
    let score = match value {
        Value::Null => None,
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as Score)),
        Value::String(s) => s
            .parse::<Score>()
            .ok()
            .or_else(|| s.parse::<f64>().ok().map(|f| f as Score)),
        _ => None,
    };

    match (value, score) {
        (Value::Null, _) => Ok(None),
        (_, Some(score)) => Ok(Some(score)),
        (other, None) => Err(StoreError::InvalidResponse(format!(
            "score is not numeric: {}",
            other
        ))),
    }
}

#[async_trait]
impl GraphStore for HttpGraphStore {
    async fn relation_members(
        &self,
        owner: &str,
        relation: &str,
    ) -> StoreResult<HashMap<String, Score>> {
        let params = json!({
            "_id": owner,
            "relation": relation,
            "withScores": true,
        });
        let raw: HashMap<String, Value> = self.call("nav_relation", &params).await?;

        raw.into_iter()
            .map(|(member, score)| Ok((member, parse_score(&score)?.unwrap_or(0))))
            .collect()
    }

    async fn relation_score(
        &self,
        owner: &str,
        relation: &str,
        members: &[String],
    ) -> StoreResult<HashMap<String, Option<Score>>> {
        let params = json!({
            "_id": owner,
            "relation": relation,
            "items": members,
        });
        let raw: HashMap<String, Value> = self.call("relation_score", &params).await?;

        raw.into_iter()
            .map(|(member, score)| Ok((member, parse_score(&score)?)))
            .collect()
    }

    #[instrument(skip(self, update), fields(owner = %owner))]
    async fn update_relation(&self, owner: &str, update: &RelationUpdate) -> StoreResult<()> {
        if update.is_empty() {
            return Ok(());
        }

        let mut params = Map::new();
        params.insert("_id".into(), json!(owner));
        if !update.add.is_empty() {
            params.insert("add".into(), Self::encode_members(&update.add));
        }
        if !update.remove.is_empty() {
            params.insert("remove".into(), json!(update.remove));
        }
        if !update.incr_by.is_empty() {
            params.insert("incrBy".into(), Self::encode_members(&update.incr_by));
        }

        self.send("update_relations", &Value::Object(params)).await?;
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "http"
    }
}
