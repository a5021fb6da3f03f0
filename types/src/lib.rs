pub mod session;
pub mod audio;
pub mod events;
pub mod twilio;

pub use session::Session;
pub use events::{ClientEvent, ServerEvent};
