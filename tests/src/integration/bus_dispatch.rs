//! # Bus Dispatch Flows
//!
//! Services talking to each other over one [`LunaBus`]:
//!
//! 1. **Routing**: service-to-service calls carry the caller's bus id
//! 2. **Ordering**: deliveries run in issuance order, never re-entrantly
//! 3. **Unknown targets**: strict and lenient unknown-service handling
//! 4. **Subscriptions**: streaming, client cancel, service cancel, auto-cancel
//! 5. **Built-ins**: `/quit` unregisters the service

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use shared_bus::{BusConfig, BusTransport, LunaBus, Message, SubscriptionEvent, SubscriptionState};
    use shared_types::{Payload, Response};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    const WAIT: Duration = Duration::from_secs(2);

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Register `/echo` that answers with the request payload and sender.
    fn echo_service(bus: &Arc<LunaBus>, name: &str) {
        let svc = bus.create_service(name);
        svc.register("/echo", |msg: Message| {
            msg.respond(
                Response::success(Value::Object(msg.payload.clone()))
                    .with("sender", msg.sender.clone()),
            );
        })
        .unwrap();
    }

    fn bool_field(payload: &Payload, key: &str) -> Option<bool> {
        payload.get(key).and_then(Value::as_bool)
    }

    // =============================================================================
    // ROUTING
    // =============================================================================

    #[tokio::test]
    async fn test_service_to_service_call_carries_sender() {
        let bus = LunaBus::start(BusConfig::default());
        echo_service(&bus, "com.example.backend");

        let front = bus.create_service("com.example.front");
        let weak = Arc::downgrade(&front);
        front
            .register("/relay", move |msg: Message| {
                let Some(svc) = weak.upgrade() else { return };
                tokio::spawn(async move {
                    let reply = svc
                        .call_async("luna://com.example.backend/echo", json!({ "n": 7 }))
                        .await
                        .unwrap();
                    let payload = match reply {
                        Ok(payload) | Err(payload) => payload,
                    };
                    msg.respond(Response::from(payload));
                });
            })
            .unwrap();

        let reply = timeout(WAIT, bus.call("luna://com.example.front/relay", json!({})))
            .await
            .unwrap();
        assert_eq!(reply.get("n"), Some(&json!(7)));
        assert_eq!(reply.get("sender"), Some(&json!("com.example.front")));
    }

    #[tokio::test]
    async fn test_palm_scheme_and_method_normalization() {
        let bus = LunaBus::start(BusConfig::default());
        echo_service(&bus, "svc");

        let reply = timeout(WAIT, bus.call("palm://svc/echo", json!({})))
            .await
            .unwrap();
        assert_eq!(bool_field(&reply, "returnValue"), Some(true));
    }

    #[tokio::test]
    async fn test_transport_trait_object() {
        let bus = LunaBus::start(BusConfig::default());
        echo_service(&bus, "svc");
        let transport: Arc<dyn BusTransport> = bus.clone();

        let ok = transport
            .call_async("client", "luna://svc/echo", json!({}))
            .await
            .unwrap();
        assert_eq!(ok.get("sender"), Some(&json!("client")));

        let err = transport
            .call_async("client", "luna://svc/missing", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.get("errorCode"), Some(&json!(-1)));
    }

    // =============================================================================
    // ORDERING
    // =============================================================================

    #[tokio::test]
    async fn test_deliveries_follow_issuance_order() {
        let bus = LunaBus::start(BusConfig::default());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let svc = bus.create_service("svc");
        let log = seen.clone();
        svc.register("/record", move |msg: Message| {
            log.lock().push(msg.payload.get("i").cloned());
            msg.respond(Response::ok());
        })
        .unwrap();

        let calls: Vec<_> = (0..20)
            .map(|i| bus.call("luna://svc/record", json!({ "i": i })))
            .collect();
        for call in calls {
            timeout(WAIT, call).await.unwrap();
        }

        let expected: Vec<_> = (0..20).map(|i| Some(json!(i))).collect();
        assert_eq!(*seen.lock(), expected);
    }

    #[tokio::test]
    async fn test_nested_call_runs_on_a_later_turn() {
        let bus = LunaBus::start(BusConfig::default());
        let events = Arc::new(Mutex::new(Vec::new()));
        let svc = bus.create_service("svc");

        let log = events.clone();
        svc.register("/inner", move |msg: Message| {
            log.lock().push("inner");
            msg.respond(Response::ok());
        })
        .unwrap();

        let log = events.clone();
        let weak = Arc::downgrade(&svc);
        svc.register("/outer", move |msg: Message| {
            log.lock().push("outer-start");
            if let Some(svc) = weak.upgrade() {
                let _pending = svc.call("luna://svc/inner", json!({}));
            }
            log.lock().push("outer-end");
            msg.respond(Response::ok());
        })
        .unwrap();

        timeout(WAIT, bus.call("luna://svc/outer", json!({})))
            .await
            .unwrap();
        // Queued behind the nested call.
        timeout(WAIT, bus.call("luna://svc/inner", json!({})))
            .await
            .unwrap();

        assert_eq!(
            *events.lock(),
            vec!["outer-start", "outer-end", "inner", "inner"]
        );
    }

    // =============================================================================
    // UNKNOWN TARGETS
    // =============================================================================

    #[tokio::test]
    async fn test_strict_unknown_service() {
        let bus = LunaBus::start(BusConfig::default().strict());
        let reply = timeout(WAIT, bus.call("luna://com.example.nope/x", json!({})))
            .await
            .unwrap();
        assert_eq!(bool_field(&reply, "returnValue"), Some(false));
        assert_eq!(reply.get("errorCode"), Some(&json!(-1)));
        assert_eq!(
            reply.get("errorText"),
            Some(&json!("Service does not exist: com.example.nope."))
        );
    }

    #[tokio::test]
    async fn test_lenient_unknown_service() {
        let bus = LunaBus::start(BusConfig::default());
        let reply = timeout(WAIT, bus.call("luna://com.example.nope/x", json!({})))
            .await
            .unwrap();
        assert_eq!(bool_field(&reply, "returnValue"), Some(true));

        let mut sub = bus.subscribe("luna://com.example.nope/x", json!({ "subscribe": true }));
        let first = timeout(WAIT, sub.recv()).await.unwrap().unwrap();
        assert_eq!(bool_field(first.payload(), "subscribed"), Some(true));
    }

    #[tokio::test]
    async fn test_unknown_method_cancels_subscription_when_strict() {
        let bus = LunaBus::start(BusConfig::default().strict());
        echo_service(&bus, "svc");

        let mut sub = bus.subscribe("luna://svc/nope", json!({ "subscribe": true }));
        let event = timeout(WAIT, sub.recv()).await.unwrap().unwrap();
        assert!(event.is_cancel());
        assert_eq!(
            event.payload().get("errorText"),
            Some(&json!("Unknown method \"/nope\" for category \"/\""))
        );
        assert_eq!(sub.state(), SubscriptionState::Cancelled);
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test]
    async fn test_unknown_method_subscription_is_silent_when_lenient() {
        let bus = LunaBus::start(BusConfig::default());
        echo_service(&bus, "svc");

        let mut sub = bus.subscribe("luna://svc/nope", json!({ "subscribe": true }));
        let event = timeout(WAIT, sub.recv()).await.unwrap().unwrap();
        assert!(matches!(event, SubscriptionEvent::Response(_)));
        assert_eq!(event.payload()["subscribed"], json!(true));
        assert_eq!(sub.state(), SubscriptionState::Active);

        // The call path still reports the missing method.
        let reply = timeout(WAIT, bus.call("luna://svc/nope", json!({})))
            .await
            .unwrap();
        assert_eq!(reply["errorCode"], json!(-1));
        assert_eq!(sub.try_recv(), Ok(None));
    }

    // =============================================================================
    // SUBSCRIPTIONS
    // =============================================================================

    /// `/ticks` keeps every subscriber so the test can push more responses.
    fn tick_service(bus: &Arc<LunaBus>) -> (Arc<Mutex<Vec<Message>>>, Arc<Mutex<Vec<String>>>) {
        let held = Arc::new(Mutex::new(Vec::new()));
        let cancelled = Arc::new(Mutex::new(Vec::new()));
        let svc = bus.create_service("ticks");
        let keep = held.clone();
        let log = cancelled.clone();
        svc.register_with_cancel(
            "/ticks",
            move |msg: Message| {
                msg.respond(Response::ok().with("tick", 0));
                keep.lock().push(msg);
            },
            move |msg: Message| log.lock().push(msg.unique_token.clone()),
        )
        .unwrap();
        (held, cancelled)
    }

    #[tokio::test]
    async fn test_subscription_stream_and_client_cancel() {
        let bus = LunaBus::start(BusConfig::default());
        let (held, cancelled) = tick_service(&bus);

        let mut sub = bus.subscribe("luna://ticks/ticks", json!({ "subscribe": true }));
        let first = timeout(WAIT, sub.next()).await.unwrap().unwrap();
        assert_eq!(first.payload().get("tick"), Some(&json!(0)));
        assert_eq!(sub.state(), SubscriptionState::Active);

        let msg = held.lock()[0].clone();
        msg.respond(Response::ok().with("tick", 1));
        let second = timeout(WAIT, sub.next()).await.unwrap().unwrap();
        assert_eq!(second.payload().get("tick"), Some(&json!(1)));

        sub.cancel();
        msg.respond(Response::ok().with("tick", 2));

        let cancel = sub.next().await.unwrap();
        assert!(matches!(cancel, SubscriptionEvent::Cancel(_)));
        assert_eq!(sub.next().await, None);
        assert!(msg.is_closed());

        // Flush the queued cancel delivery.
        timeout(WAIT, bus.call("luna://ticks/unknown", json!({})))
            .await
            .unwrap();
        assert_eq!(*cancelled.lock(), vec![msg.unique_token.clone()]);

        let channel = bus.service("ticks").unwrap().lookup("/ticks").unwrap().1;
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_service_cancel_skips_cancel_handler() {
        let bus = LunaBus::start(BusConfig::default());
        let (held, cancelled) = tick_service(&bus);

        let mut sub = bus.subscribe("luna://ticks/ticks", json!({ "subscribe": true }));
        timeout(WAIT, sub.recv()).await.unwrap().unwrap();

        let msg = held.lock()[0].clone();
        msg.cancel(Response::ok().with("reason", "done"));

        let event = timeout(WAIT, sub.recv()).await.unwrap().unwrap();
        assert!(event.is_cancel());
        assert_eq!(event.payload().get("reason"), Some(&json!("done")));

        timeout(WAIT, bus.call("luna://ticks/unknown", json!({})))
            .await
            .unwrap();
        assert!(cancelled.lock().is_empty());
    }

    #[tokio::test]
    async fn test_auto_cancel_runs_cancel_handler() {
        let bus = LunaBus::start(BusConfig::default());
        let (held, cancelled) = tick_service(&bus);

        let mut sub = bus.subscribe("luna://ticks/ticks", json!({ "subscribe": true }));
        timeout(WAIT, sub.recv()).await.unwrap().unwrap();

        let msg = held.lock()[0].clone();
        msg.respond(Response::ok().with("subscribed", false));

        let event = timeout(WAIT, sub.recv()).await.unwrap().unwrap();
        assert!(event.is_cancel());

        timeout(WAIT, bus.call("luna://ticks/unknown", json!({})))
            .await
            .unwrap();
        assert_eq!(cancelled.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_dropping_subscription_cancels_it() {
        let bus = LunaBus::start(BusConfig::default());
        let (held, cancelled) = tick_service(&bus);

        {
            let mut sub = bus.subscribe("luna://ticks/ticks", json!({ "subscribe": true }));
            timeout(WAIT, sub.recv()).await.unwrap().unwrap();
        }

        timeout(WAIT, bus.call("luna://ticks/unknown", json!({})))
            .await
            .unwrap();
        assert_eq!(cancelled.lock().len(), 1);
        assert!(held.lock()[0].is_closed());
    }

    // =============================================================================
    // LEGACY RESPONSES
    // =============================================================================

    #[tokio::test]
    async fn test_legacy_response_inference() {
        let bus = LunaBus::start(BusConfig::default());
        let svc = bus.create_service("legacy");
        svc.register("/code-only", |msg: Message| {
            msg.respond_json(json!({ "errorCode": 5 })).unwrap();
        })
        .unwrap();
        svc.register("/plain", |msg: Message| {
            msg.respond_json(json!({ "value": 1 })).unwrap();
        })
        .unwrap();
        svc.register("/bad", |msg: Message| {
            let shape = msg.respond_json(json!([1, 2]));
            msg.respond(Response::ok().with("rejected", shape.is_err()));
        })
        .unwrap();

        let reply = timeout(WAIT, bus.call("luna://legacy/code-only", json!({})))
            .await
            .unwrap();
        assert_eq!(bool_field(&reply, "returnValue"), Some(false));
        assert_eq!(reply.get("errorText"), Some(&json!("no error message provided")));

        let reply = timeout(WAIT, bus.call("luna://legacy/plain", json!({})))
            .await
            .unwrap();
        assert_eq!(bool_field(&reply, "returnValue"), Some(true));

        let reply = timeout(WAIT, bus.call("luna://legacy/bad", json!({})))
            .await
            .unwrap();
        assert_eq!(bool_field(&reply, "rejected"), Some(true));
    }

    // =============================================================================
    // BUILT-INS
    // =============================================================================

    #[tokio::test]
    async fn test_quit_unregisters_service() {
        let bus = LunaBus::start(BusConfig::default());
        echo_service(&bus, "svc");

        let reply = timeout(WAIT, bus.call("luna://svc/quit", json!({})))
            .await
            .unwrap();
        assert_eq!(reply.get("status"), Some(&json!("quitting")));
        assert!(bus.service("svc").is_none());
    }

    #[tokio::test]
    async fn test_builtins_disabled() {
        let config = BusConfig {
            builtin_methods: false,
            ..BusConfig::default()
        };
        let bus = LunaBus::start(config);
        echo_service(&bus, "svc");

        let reply = timeout(WAIT, bus.call("luna://svc/quit", json!({})))
            .await
            .unwrap();
        assert_eq!(bool_field(&reply, "returnValue"), Some(false));
        assert!(bus.service("svc").is_some());
    }
}
