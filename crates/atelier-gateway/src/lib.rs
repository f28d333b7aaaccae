pub mod connection;
pub mod error;
pub mod identity;
pub mod registry;
pub mod relay;

mod receipts;

pub use error::GatewayError;
pub use registry::Registry;
pub use relay::Relay;
