pub mod announcer;
pub mod dispatch;
pub mod upload;
pub mod validator;

pub use announcer::{Announcer, DispatchAnnouncer};
pub use dispatch::{Dispatcher, HttpSink, Keyed, LogSink, Sink};
pub use validator::{DispatchValidator, Validator};
