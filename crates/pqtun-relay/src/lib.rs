//! Bidirectional relay engines: [`stream`] for TCP-like connections,
//! [`datagram`] for connected UDP endpoints. Both share the reporter
//! abstraction in [`report`].

pub mod datagram;
pub mod report;
pub mod stream;

pub use datagram::{relay_datagram, MAX_DATAGRAM_SIZE};
pub use report::{ChannelReporter, Op, Reporter, Side};
pub use stream::{relay_stream, RelayConfig, RelayError};
