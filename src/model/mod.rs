//! Core data model types: identifiers, messages, conversations and the
//! other mailbox item kinds a search can return.

pub mod address;
pub mod attachment;
pub mod item;
pub mod mail;

pub use item::{ItemType, MailItem};
pub use mail::{FolderId, ItemId, TagId};
