mod case;
mod channel;
mod command;

pub use case::{Case, CaseId};
pub use channel::{Channel, ChannelEvent, ChannelOptions};
pub use command::{CaseCommand, Reply};
pub(crate) use command::Envelope;
