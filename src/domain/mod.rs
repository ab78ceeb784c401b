pub mod chat;
pub mod directory;
pub mod event;
pub mod id;
pub mod reference;

pub use chat::{Conversation, ConversationKey, ConversationView, Message, MessageView};
pub use directory::{ProductSummary, UserSummary};
pub use event::{AnnounceData, ClientEvent, ServerEvent};
pub use id::{IdError, ObjectId};
pub use reference::{Identified, Reference};
