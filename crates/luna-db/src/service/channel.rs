//! Watch notifications over the bus.

use crate::ports::outbound::WatchChannel;
use serde_json::json;
use shared_bus::Message;
use shared_types::Response;

/// `{returnValue: true, fired: true, subscribe: false}`.
pub(crate) fn fired() -> Response {
    Response::success(json!({ "fired": true, "subscribe": false }))
}

impl WatchChannel for Message {
    fn fire(&self) {
        self.respond(fired());
    }

    fn terminate(&self) {
        self.respond(Response::ok().with("subscribed", false));
    }

    fn is_closed(&self) -> bool {
        Message::is_closed(self)
    }
}
