//! Serialized event routing: the [`ChannelManager`] handle, its worker-side
//! registry, and the command protocol between them.

mod command;
mod manager;
mod registry;

pub use command::Completion;
pub use manager::ChannelManager;
