mod action;
mod api;
mod author;
mod chat_message;
mod connection;
mod event;
mod live_payload;
mod loading;
mod session;
mod slash_commands;
mod textarea;

pub use action::*;
pub use api::*;
pub use author::*;
pub use chat_message::*;
pub use connection::*;
pub use event::*;
pub use live_payload::*;
pub use loading::*;
pub use session::*;
pub use slash_commands::*;
pub use textarea::*;
