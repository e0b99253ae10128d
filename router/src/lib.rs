#![forbid(unsafe_code)]

pub mod balance;
pub mod broker;
pub mod config;
pub mod error;
pub mod pricing;
pub mod router;
pub mod slicing;
pub mod state;
pub mod style;
pub mod validate;

pub use broker::{Broker, NewOrder, OrderDetail, OrderType, SimulatedBroker, TimeInForce};
pub use config::RouterConfig;
pub use error::RouterError;
pub use router::{RiskContextProvider, SmartOrderRouter};
pub use state::OrderState;
pub use style::ExecutionStyle;
