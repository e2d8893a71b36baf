pub mod actions;
mod app_state;
mod bubble;
mod bubble_list;
pub mod events;
mod reconciler;
mod scroll;
mod sessions;

pub use app_state::*;
pub use bubble::*;
pub use bubble_list::*;
pub use reconciler::*;
pub use scroll::*;
pub use sessions::*;
