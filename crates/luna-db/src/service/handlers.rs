//! # Method Handlers
//!
//! One function per database method. Most return a [`Response`] that the
//! router sends; `find`, `watch` and `batch` answer the message themselves
//! because they keep working after the first response.

use super::channel::fired;
use super::params::{
    parse, BatchParams, DelParams, FindParams, GetParams, MergeParams, PathParams, PutParams,
    ReserveIdsParams, WatchParams,
};
use super::BATCH_METHODS;
use crate::domain::database::Database;
use crate::domain::document::Document;
use crate::domain::errors::DbError;
use crate::domain::store::QueryResult;
use crate::domain::value_objects::{WriteResult, MAX_RESERVE_IDS};
use parking_lot::Mutex;
use serde_json::{json, Value};
use shared_bus::{Message, Service};
use shared_types::Response;
use std::path::Path;
use std::sync::Weak;
use tracing::{debug, warn};

fn documents(docs: Vec<Document>) -> Value {
    Value::Array(docs.into_iter().map(Document::into_value).collect())
}

fn writes(results: &[WriteResult]) -> Value {
    Value::Array(
        results
            .iter()
            .map(|r| json!({ "id": r.id, "rev": r.rev }))
            .collect(),
    )
}

fn results_response(results: &[WriteResult]) -> Response {
    Response::ok().with("results", writes(results))
}

fn query_response(result: QueryResult) -> Response {
    let mut response = Response::ok().with("results", documents(result.results));
    if let Some(next) = result.next {
        response = response.with("next", next);
    }
    if let Some(count) = result.count {
        response = response.with("count", count);
    }
    response
}

pub(crate) fn reserve_ids(db: &Mutex<Database>, msg: &Message) -> Result<Response, DbError> {
    let params: ReserveIdsParams = parse(msg)?;
    if params.count > MAX_RESERVE_IDS {
        return Err(DbError::InvalidParams {
            caller: msg.sender.clone(),
            detail: format!("count {} exceeds {MAX_RESERVE_IDS}", params.count),
        });
    }
    let ids = db.lock().reserve_ids(params.count);
    Ok(Response::ok().with("ids", ids))
}

pub(crate) fn get(db: &Mutex<Database>, msg: &Message) -> Result<Response, DbError> {
    let params: GetParams = parse(msg)?;
    let ids = params.ids.ok_or(DbError::RequiredProp("ids"))?;
    let docs = db.lock().get(&ids);
    Ok(Response::ok().with("results", documents(docs)))
}

/// `/find`, optionally arming a streaming watch after the first response.
pub(crate) fn find(db: &Mutex<Database>, msg: Message) {
    if let Err(err) = try_find(db, &msg) {
        debug!(origin = %msg.origin(), error = %err, "find failed");
        msg.respond(err.into());
    }
}

fn try_find(db: &Mutex<Database>, msg: &Message) -> Result<(), DbError> {
    let params: FindParams = parse(msg)?;
    let query = params.query;

    let mut db = db.lock();
    let result = db.query(&query)?;
    msg.respond(query_response(result));

    if params.watch && query.page.is_none() {
        if let Err(err) = db.watch_changes(&msg.unique_token, query, Box::new(msg.clone())) {
            warn!(origin = %msg.origin(), error = %err, "Could not arm find watch");
        }
    }
    Ok(())
}

pub(crate) fn del(db: &Mutex<Database>, msg: &Message) -> Result<Response, DbError> {
    let params: DelParams = parse(msg)?;
    let mut db = db.lock();
    match (params.ids, params.query) {
        (_, Some(query)) => {
            let count = db.del_query(&query, params.purge)?;
            Ok(Response::ok().with("count", count))
        }
        (Some(ids), None) => Ok(results_response(&db.del(&ids, params.purge))),
        (None, None) => Err(DbError::RequiredProp("ids or query")),
    }
}

pub(crate) fn put(db: &Mutex<Database>, msg: &Message) -> Result<Response, DbError> {
    let params: PutParams = parse(msg)?;
    let objects = params.objects.ok_or(DbError::RequiredProp("objects"))?;
    let results = db.lock().put(objects)?;
    Ok(results_response(&results))
}

pub(crate) fn merge(db: &Mutex<Database>, msg: &Message) -> Result<Response, DbError> {
    let params: MergeParams = parse(msg)?;
    let results = match (params.objects, params.query, params.props) {
        (None, None, None) => return Err(DbError::MergeParamsMissing),
        (Some(objects), _, _) => db.lock().merge(objects)?,
        (None, None, Some(_)) => return Err(DbError::MergePropsWithoutQuery),
        (None, Some(_), None) => return Err(DbError::RequiredProp("'props'")),
        (None, Some(query), Some(props)) => db.lock().merge_query(&query, &props)?,
    };
    Ok(results_response(&results))
}

pub(crate) fn merge_put(db: &Mutex<Database>, msg: &Message) -> Result<Response, DbError> {
    let params: MergeParams = parse(msg)?;
    let query = params.query.ok_or(DbError::RequiredProp("query"))?;
    let props = params.props.ok_or(DbError::RequiredProp("'props'"))?;
    let results = db.lock().merge_put(&query, &props)?;
    Ok(results_response(&results))
}

pub(crate) fn dump(db: &Mutex<Database>, msg: &Message) -> Result<Response, DbError> {
    let params: PathParams = parse(msg)?;
    let path = params.path.ok_or(DbError::RequiredProp("path"))?;
    db.lock().dump(Path::new(&path))?;
    Ok(Response::ok())
}

pub(crate) fn load(db: &Mutex<Database>, msg: &Message) -> Result<Response, DbError> {
    let params: PathParams = parse(msg)?;
    let path = params.path.ok_or(DbError::RequiredProp("path"))?;
    let count = db.lock().load(Path::new(&path))?;
    Ok(Response::ok().with("count", count))
}

/// `/watch`: fire now if the query already matches, else arm a one-shot.
pub(crate) fn watch(db: &Mutex<Database>, msg: Message) {
    if let Err(err) = try_watch(db, &msg) {
        debug!(origin = %msg.origin(), error = %err, "watch failed");
        msg.respond(err.into());
    }
}

fn try_watch(db: &Mutex<Database>, msg: &Message) -> Result<(), DbError> {
    let params: WatchParams = parse(msg)?;
    let mut db = db.lock();
    if !db.evaluate(&params.query)?.is_empty() {
        msg.respond(fired());
        return Ok(());
    }
    msg.respond(Response::ok());
    db.watch_once(&msg.unique_token, params.query, Box::new(msg.clone()));
    Ok(())
}

pub(crate) fn compact(db: &Mutex<Database>, _msg: &Message) -> Result<Response, DbError> {
    db.lock().compact();
    Ok(Response::ok())
}

pub(crate) fn purge(db: &Mutex<Database>, _msg: &Message) -> Result<Response, DbError> {
    let count = db.lock().purge();
    Ok(Response::ok().with("count", count))
}

pub(crate) fn purge_status(db: &Mutex<Database>, _msg: &Message) -> Result<Response, DbError> {
    let rev = db.lock().store().last_purge_rev();
    Ok(Response::ok().with("rev", rev))
}

/// `/batch`: validate every operation, then fan them out as bus calls to
/// this same service and answer with the responses in operation order.
pub(crate) fn batch(service: &Weak<Service>, msg: Message) {
    if let Err(err) = try_batch(service, &msg) {
        debug!(origin = %msg.origin(), error = %err, "batch rejected");
        msg.respond(err.into());
    }
}

fn try_batch(service: &Weak<Service>, msg: &Message) -> Result<(), DbError> {
    let params: BatchParams = parse(msg)?;
    let operations = params.operations.ok_or(DbError::RequiredProp("operations"))?;

    let mut calls = Vec::with_capacity(operations.len());
    for (index, operation) in operations.into_iter().enumerate() {
        let Value::Object(mut operation) = operation else {
            return Err(DbError::BatchMalformedOperation { index });
        };
        let (Some(method), Some(params)) = (operation.remove("method"), operation.remove("params"))
        else {
            return Err(DbError::BatchMalformedOperation { index });
        };
        let Value::String(method) = method else {
            return Err(DbError::BatchMalformedOperation { index });
        };
        let name = method.trim_start_matches('/');
        if !BATCH_METHODS.contains(&name) {
            return Err(DbError::BatchInvalidMethod { method });
        }
        calls.push((name.to_string(), params));
    }

    let Some(service) = service.upgrade() else {
        debug!(origin = %msg.origin(), "Service gone; batch dropped");
        return Ok(());
    };
    let mut pending = Vec::with_capacity(calls.len());
    for (method, params) in calls {
        let uri = format!("luna://{}/{}", service.name(), method);
        match service.call(&uri, params) {
            Ok(call) => pending.push(call),
            Err(err) => {
                debug!(origin = %msg.origin(), error = %err, "Bus gone; batch dropped");
                return Ok(());
            }
        }
    }

    let msg = msg.clone();
    tokio::spawn(async move {
        let mut responses = Vec::with_capacity(pending.len());
        for call in pending {
            responses.push(Value::Object(call.await));
        }
        msg.respond(Response::ok().with("responses", responses));
    });
    Ok(())
}
