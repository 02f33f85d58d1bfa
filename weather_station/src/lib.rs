//! Weather station pipeline: polls the OpenWeatherMap current-weather endpoint
//! over a plain HTTP/1.1 connection and renders the result on an
//! embedded-graphics display.
//!
//! One cycle is strictly sequential:
//! open session -> send request -> skip headers -> parse body -> present -> close,
//! followed by a fixed sleep. Any failing step aborts the cycle; the next cycle
//! starts from scratch after the sleep.

pub mod config;
pub mod headers;
pub mod parser;
pub mod presenter;
pub mod reading;
pub mod request;
pub mod session;
pub mod station;

#[cfg(test)]
mod testing;

pub use config::Settings;
pub use reading::{Narrowing, Reading};
pub use session::{Connection, Connector, Session, TcpConnector};
pub use station::{CycleError, Station};
