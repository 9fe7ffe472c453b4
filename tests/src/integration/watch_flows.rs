//! # Watch Flows
//!
//! Standing queries on the database service:
//!
//! - `/watch` is one-shot: at most one `fired` notification per subscription
//! - `/find` with `watch: true` notifies once and then ends the subscription
//! - a cancelled subscription never sees another response

#[cfg(test)]
mod tests {
    use luna_db::{DbService, StoreConfig};
    use serde_json::{json, Value};
    use shared_bus::{BusConfig, LunaBus, Subscription, SubscriptionError, SubscriptionState};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};
    use tokio_stream::StreamExt;

    const DB: &str = "com.webos.service.db";
    const WAIT: Duration = Duration::from_secs(2);

    fn start() -> (Arc<LunaBus>, DbService) {
        let bus = LunaBus::start(BusConfig::default());
        let db = DbService::start(&bus, DB, StoreConfig::default()).unwrap();
        (bus, db)
    }

    async fn put(bus: &LunaBus, objects: Value) {
        let reply = timeout(
            WAIT,
            bus.call(&format!("luna://{DB}/put"), json!({ "objects": objects })),
        )
        .await
        .unwrap();
        assert_eq!(reply["returnValue"], json!(true));
    }

    fn watch(bus: &LunaBus, query: Value) -> Subscription {
        bus.subscribe(
            &format!("luna://{DB}/watch"),
            json!({ "query": query, "subscribe": true }),
        )
    }

    /// Let any queued deliveries run.
    async fn settle(bus: &LunaBus) {
        timeout(WAIT, bus.call(&format!("luna://{DB}/purgeStatus"), json!({})))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_watch_fires_exactly_once() {
        let (bus, _db) = start();
        let mut sub = watch(&bus, json!({ "from": "K", "where": [{ "prop": "n", "op": ">", "val": 1 }] }));

        let first = timeout(WAIT, sub.recv()).await.unwrap().unwrap();
        assert_eq!(first.payload().get("fired"), None);

        // Not a match yet.
        put(&bus, json!([{ "_kind": "K", "n": 1 }])).await;
        assert_eq!(sub.try_recv(), Ok(None));

        put(&bus, json!([{ "_kind": "K", "n": 2 }])).await;
        let fired = timeout(WAIT, sub.recv()).await.unwrap().unwrap();
        assert_eq!(fired.payload()["fired"], json!(true));

        put(&bus, json!([{ "_kind": "K", "n": 3 }])).await;
        settle(&bus).await;
        assert_eq!(sub.try_recv(), Ok(None));
    }

    #[tokio::test]
    async fn test_independent_watches() {
        let (bus, db) = start();
        let mut on_a = watch(&bus, json!({ "from": "A" }));
        let mut on_b = watch(&bus, json!({ "from": "B" }));
        timeout(WAIT, on_a.recv()).await.unwrap().unwrap();
        timeout(WAIT, on_b.recv()).await.unwrap().unwrap();
        assert_eq!(db.database().lock().watch_count(), 2);

        put(&bus, json!([{ "_kind": "A" }])).await;
        let fired = timeout(WAIT, on_a.recv()).await.unwrap().unwrap();
        assert_eq!(fired.payload()["fired"], json!(true));
        assert_eq!(on_b.try_recv(), Ok(None));
        assert_eq!(db.database().lock().watch_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_before_match_removes_watch() {
        let (bus, db) = start();
        let mut sub = watch(&bus, json!({ "from": "K" }));
        timeout(WAIT, sub.recv()).await.unwrap().unwrap();

        sub.cancel();
        let cancel = sub.recv().await.unwrap();
        assert!(cancel.is_cancel());
        assert_eq!(cancel.payload()["subscribed"], json!(false));

        settle(&bus).await;
        assert_eq!(db.database().lock().watch_count(), 0);

        put(&bus, json!([{ "_kind": "K" }])).await;
        assert_eq!(sub.try_recv(), Err(SubscriptionError::Closed));
    }

    #[tokio::test]
    async fn test_find_watch_as_stream() {
        let (bus, _db) = start();
        put(&bus, json!([{ "_kind": "K", "n": 1 }])).await;

        let mut sub = bus.subscribe(
            &format!("luna://{DB}/find"),
            json!({ "query": { "from": "K" }, "watch": true, "subscribe": true }),
        );

        let bus_for_writer = bus.clone();
        let writer = tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            put(&bus_for_writer, json!([{ "_kind": "K", "n": 2 }])).await;
        });

        let events: Vec<_> = timeout(WAIT, (&mut sub).collect::<Vec<_>>())
            .await
            .unwrap();
        writer.await.unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].payload()["results"].as_array().unwrap().len(), 1);
        assert_eq!(events[1].payload()["fired"], json!(true));
        assert!(events[2].is_cancel());
        assert_eq!(sub.state(), SubscriptionState::Cancelled);
    }

    #[tokio::test]
    async fn test_unchanged_result_does_not_notify() {
        let (bus, db) = start();
        let mut sub = bus.subscribe(
            &format!("luna://{DB}/find"),
            json!({ "query": { "from": "K" }, "watch": true, "subscribe": true }),
        );
        timeout(WAIT, sub.recv()).await.unwrap().unwrap();

        put(&bus, json!([{ "_kind": "Other" }])).await;
        settle(&bus).await;
        assert_eq!(sub.try_recv(), Ok(None));
        assert_eq!(db.database().lock().watch_count(), 1);
    }
}
