//! Integration flows, one module per area.

pub mod bus_dispatch;
pub mod db_service;
pub mod watch_flows;
