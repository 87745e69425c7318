pub(crate) mod catalog;
pub(crate) mod command;
pub(crate) mod decode;
pub(crate) mod encode;
pub(crate) mod serve;
pub(crate) mod ui;

pub use self::catalog::MessageArgs;
pub use self::command::{Args, Command, LogLevel, OutputFormat};
pub use self::decode::DecodeArgs;
pub use self::encode::EncodeArgs;
pub use self::serve::ServeArgs;
