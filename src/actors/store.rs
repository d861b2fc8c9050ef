pub mod actor;
pub mod memory;
pub mod messages;

pub use actor::{StoreActor, StoreHandle};
pub use memory::ConversationPage;
pub use messages::StoreCommand;
