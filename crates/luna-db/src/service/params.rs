//! # Request Parameters
//!
//! Typed views of method payloads. Shape errors become code-22
//! `invalid parameters` responses naming the caller.

use crate::domain::errors::DbError;
use crate::domain::query::Query;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use shared_bus::Message;
use shared_types::Payload;

/// Decode the payload of `msg`.
pub(crate) fn parse<T: DeserializeOwned>(msg: &Message) -> Result<T, DbError> {
    serde_json::from_value(Value::Object(msg.payload.clone())).map_err(|err| {
        DbError::InvalidParams {
            caller: msg.sender.clone(),
            detail: err.to_string(),
        }
    })
}

fn one() -> usize {
    1
}

fn yes() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReserveIdsParams {
    #[serde(default = "one")]
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GetParams {
    pub ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FindParams {
    #[serde(default)]
    pub query: Query,
    #[serde(default)]
    pub watch: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DelParams {
    pub ids: Option<Vec<String>>,
    pub query: Option<Query>,
    #[serde(default = "yes")]
    pub purge: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PutParams {
    pub objects: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MergeParams {
    pub objects: Option<Vec<Value>>,
    pub query: Option<Query>,
    pub props: Option<Payload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PathParams {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WatchParams {
    #[serde(default)]
    pub query: Query,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchParams {
    pub operations: Option<Vec<Value>>,
}
