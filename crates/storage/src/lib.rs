pub mod error;
mod key;
pub mod transport;

pub use crate::key::DestinationKey;
pub use crate::transport::{Payload, TransferEvent, TransferStream, Transport};
use std::sync::Arc;

pub type TransportHandle = Arc<dyn Transport + Send + Sync>;
