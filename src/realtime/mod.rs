mod backoff;
pub(crate) mod protocol;
mod socket;

pub use backoff::Backoff;
pub use socket::{ChannelHandle, RealtimeClient};
