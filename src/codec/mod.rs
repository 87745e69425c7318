mod layout;
mod signal;

pub(crate) use self::layout::SignalLayout;
pub use self::layout::{LayoutError, MAX_BIT_LENGTH};
pub use self::signal::{EncodeError, SignalCodec, SignalMap, SignalRangeError, SignalValues};
