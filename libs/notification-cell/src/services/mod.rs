pub mod dispatch;
pub mod mailer;
pub mod notify;

pub use dispatch::*;
pub use mailer::*;
pub use notify::*;
