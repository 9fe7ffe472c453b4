//! # Database Service Flows
//!
//! Database methods driven end to end over the bus, as an application on the
//! device would issue them.

#[cfg(test)]
mod tests {
    use luna_db::{DbService, StoreConfig};
    use serde_json::{json, Value};
    use shared_bus::{BusConfig, LunaBus};
    use shared_types::Payload;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    const DB: &str = "com.webos.service.db";
    const KIND: &str = "com.example.notes:1";
    const WAIT: Duration = Duration::from_secs(2);

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Harness {
        bus: Arc<LunaBus>,
        db: DbService,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_store(StoreConfig::default())
        }

        fn with_store(store: StoreConfig) -> Self {
            let bus = LunaBus::start(BusConfig::default().strict());
            let db = DbService::start(&bus, DB, store).unwrap();
            Self { bus, db }
        }

        async fn call(&self, method: &str, args: Value) -> Payload {
            let uri = format!("luna://{DB}/{method}");
            timeout(WAIT, self.bus.call_from("com.example.notes", &uri, args))
                .await
                .unwrap()
        }

        async fn put_values(&self, values: &[i64]) -> Vec<String> {
            let objects: Vec<Value> = values
                .iter()
                .map(|a| json!({ "_kind": KIND, "a": a }))
                .collect();
            let reply = self.call("put", json!({ "objects": objects })).await;
            ids(&reply)
        }

        fn count(&self) -> usize {
            self.db.database().lock().store().count()
        }
    }

    fn ids(reply: &Payload) -> Vec<String> {
        reply["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect()
    }

    fn results(reply: &Payload) -> &Vec<Value> {
        reply["results"].as_array().unwrap()
    }

    // =============================================================================
    // DOCUMENT OPERATIONS
    // =============================================================================

    #[tokio::test]
    async fn test_notes_scenario() {
        let h = Harness::new();

        h.put_values(&[1, 2, 3, 4, 5]).await;
        assert_eq!(h.count(), 5);

        let reserved = h.call("reserveIds", json!({ "count": 2 })).await;
        let reserved = reserved["ids"].as_array().unwrap();
        assert_eq!(reserved.len(), 2);
        assert_ne!(reserved[0], reserved[1]);
        assert!(reserved.iter().all(|id| !id.as_str().unwrap().is_empty()));

        let found = h
            .call(
                "find",
                json!({ "query": { "from": KIND, "where": [{ "prop": "a", "op": "<", "val": 3 }] } }),
            )
            .await;
        assert_eq!(results(&found).len(), 2);
    }

    #[tokio::test]
    async fn test_soft_delete_visibility() {
        let h = Harness::new();
        let ids = h.put_values(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]).await;

        let deleted = h
            .call("del", json!({ "ids": &ids[..7], "purge": false }))
            .await;
        assert_eq!(results(&deleted).len(), 7);

        let live = h.call("find", json!({ "query": { "from": KIND } })).await;
        assert_eq!(results(&live).len(), 3);

        let all = h
            .call("find", json!({ "query": { "from": KIND, "incDel": true } }))
            .await;
        let all = results(&all);
        assert_eq!(all.len(), 10);
        assert_eq!(all.iter().filter(|d| d["_del"] == json!(true)).count(), 7);
    }

    #[tokio::test]
    async fn test_revisions_increase_across_writes() {
        let h = Harness::new();
        let first = h.call("put", json!({ "objects": [{ "_kind": KIND }] })).await;
        let id = first["results"][0]["id"].clone();
        let rev1 = first["results"][0]["rev"].as_u64().unwrap();

        let merged = h
            .call("merge", json!({ "objects": [{ "_id": id, "title": "t" }] }))
            .await;
        let rev2 = merged["results"][0]["rev"].as_u64().unwrap();
        assert!(rev2 > rev1);

        let got = h.call("get", json!({ "ids": [id] })).await;
        assert_eq!(results(&got)[0]["title"], json!("t"));
        assert_eq!(results(&got)[0]["_rev"], json!(rev2));
    }

    #[tokio::test]
    async fn test_merge_rejects_whole_batch_on_unknown_id() {
        let h = Harness::new();
        let ids = h.put_values(&[1]).await;

        let reply = h
            .call(
                "merge",
                json!({ "objects": [{ "_id": ids[0], "a": 99 }, { "_id": "nope", "a": 1 }] }),
            )
            .await;
        assert_eq!(reply["errorCode"], json!(-3969));

        let got = h.call("get", json!({ "ids": ids })).await;
        assert_eq!(results(&got)[0]["a"], json!(1));
    }

    #[tokio::test]
    async fn test_ordering_selection_and_descending() {
        let h = Harness::new();
        h.put_values(&[3, 1, 2]).await;

        let found = h
            .call(
                "find",
                json!({ "query": { "from": KIND, "orderBy": "a", "desc": true, "select": ["a"] } }),
            )
            .await;
        let docs = results(&found);
        let values: Vec<_> = docs.iter().map(|d| d["a"].clone()).collect();
        assert_eq!(values, vec![json!(3), json!(2), json!(1)]);
        assert!(docs.iter().all(|d| d.as_object().unwrap().len() == 1));
    }

    // =============================================================================
    // PAGING
    // =============================================================================

    #[tokio::test]
    async fn test_paging_walks_every_document() {
        let h = Harness::new();
        let values: Vec<i64> = (0..12).collect();
        h.put_values(&values).await;

        let mut seen = Vec::new();
        let mut reply = h
            .call("find", json!({ "query": { "from": KIND, "limit": 5 } }))
            .await;
        loop {
            seen.extend(results(&reply).iter().map(|d| d["a"].as_i64().unwrap()));
            let Some(next) = reply.get("next").cloned() else {
                break;
            };
            reply = h.call("find", json!({ "query": { "page": next } })).await;
        }
        assert_eq!(seen, values);
    }

    #[tokio::test]
    async fn test_zero_limit_registers_pages_when_enabled() {
        let store = StoreConfig {
            page_on_zero_limit: true,
            default_limit: 4,
            ..StoreConfig::default()
        };
        let h = Harness::with_store(store);
        h.put_values(&[1, 2, 3, 4, 5, 6]).await;

        let reply = h
            .call("find", json!({ "query": { "from": KIND, "limit": 0, "count": true } }))
            .await;
        assert!(results(&reply).is_empty());
        assert_eq!(reply["count"], json!(6));

        let next = reply.get("next").cloned().unwrap();
        let page = h.call("find", json!({ "query": { "page": next } })).await;
        assert_eq!(results(&page).len(), 4);
    }

    // =============================================================================
    // BATCH AND STORE OPERATIONS
    // =============================================================================

    #[tokio::test]
    async fn test_batch_mixes_writes_and_reads() {
        let h = Harness::new();
        let reply = h
            .call(
                "batch",
                json!({ "operations": [
                    { "method": "/put", "params": { "objects": [{ "_kind": KIND, "a": 1 }] } },
                    { "method": "merge", "params": { "query": { "from": KIND }, "props": { "b": 2 } } },
                    { "method": "find", "params": { "query": { "from": KIND } } },
                    { "method": "del", "params": { "query": { "from": KIND } } }
                ] }),
            )
            .await;

        let responses = reply["responses"].as_array().unwrap();
        assert_eq!(responses.len(), 4);
        assert_eq!(responses[2]["results"][0]["b"], json!(2));
        assert_eq!(responses[3]["count"], json!(1));
        assert_eq!(h.count(), 0);
    }

    #[tokio::test]
    async fn test_dump_purge_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");
        let h = Harness::new();
        let ids = h.put_values(&[1, 2, 3]).await;

        h.call("del", json!({ "ids": [ids[0]], "purge": false })).await;
        let dumped = h.call("dump", json!({ "path": path })).await;
        assert_eq!(dumped["returnValue"], json!(true));

        let purged = h.call("purge", json!({})).await;
        assert_eq!(purged["count"], json!(1));
        assert_eq!(h.count(), 2);

        let loaded = h.call("load", json!({ "path": path })).await;
        assert_eq!(loaded["count"], json!(3));

        let next = h.call("put", json!({ "objects": [{ "_kind": KIND }] })).await;
        let status = h.call("purgeStatus", json!({})).await;
        assert!(next["results"][0]["rev"].as_u64().unwrap() > status["rev"].as_u64().unwrap());
    }

    #[tokio::test]
    async fn test_load_rejects_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edited.json");
        let snapshot = json!([
            { "_id": "a", "_kind": KIND, "_rev": 1 },
            { "_id": "a", "_kind": KIND, "_rev": 2 }
        ]);
        std::fs::write(&path, snapshot.to_string()).unwrap();

        let h = Harness::new();
        h.put_values(&[1, 2]).await;

        let loaded = h.call("load", json!({ "path": path })).await;
        assert_eq!(loaded["returnValue"], json!(false));
        assert_eq!(loaded["errorCode"], json!(-1));
        assert_eq!(h.count(), 2);
    }
}
