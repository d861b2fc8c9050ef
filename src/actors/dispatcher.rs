pub mod actor;
mod handlers;
pub mod messages;

pub use actor::{Dispatcher, DispatcherHandle};
pub use messages::DispatcherCommand;
