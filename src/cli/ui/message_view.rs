use std::fmt::{self, Display, Formatter};

use crate::catalog::MessageDescriptor;
use crate::frame::FrameError;
use crate::message::DecodedMessage;

use super::painter::Painter;
use super::table::Table;

/// Renders one decoded frame with its signal values.
pub(crate) struct DecodedMessageView<'a> {
    message: &'a DecodedMessage,
    descriptor: Option<&'a MessageDescriptor>,
    painter: &'a Painter,
}

impl<'a> DecodedMessageView<'a> {
    pub(crate) fn new(
        message: &'a DecodedMessage,
        descriptor: Option<&'a MessageDescriptor>,
        painter: &'a Painter,
    ) -> Self {
        Self {
            message,
            descriptor,
            painter,
        }
    }
}

impl Display for DecodedMessageView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let message = self.message;
        let name = message.message_name().unwrap_or("<unknown>");
        write!(
            f,
            "{} {} {}",
            self.painter.muted(format!("[{}]", message.source())),
            self.painter.heading(name),
            self.painter.muted(format!(
                "device={} id={} crc={} payload={}",
                message.device_address(),
                message.message_id(),
                message.checksum_hex(),
                message.raw_payload_hex()
            ))
        )?;
        if let Some(error) = message.error() {
            return write!(f, "\n{}", self.painter.warning(error));
        }

        let rows = message
            .signals()
            .iter()
            .map(|(signal, value)| {
                let unit = self
                    .descriptor
                    .and_then(|descriptor| descriptor.signal(signal))
                    .map(|descriptor| descriptor.unit().to_string())
                    .unwrap_or_default();
                let in_range = !message
                    .range_violations()
                    .iter()
                    .any(|violation| violation.signal() == signal);
                let status = if in_range {
                    self.painter.success("ok")
                } else {
                    self.painter.warning("out of range")
                };
                vec![signal.clone(), self.painter.value(value.to_string()), unit, status]
            })
            .collect();
        let table = Table::grid(["signal", "value", "unit", "status"], rows);
        if table.is_empty() {
            return write!(f, "\n{}", self.painter.muted("(no signals)"));
        }
        write!(f, "\n{table}")
    }
}

/// Renders a frame that failed validation.
pub(crate) struct RejectedFrameView<'a> {
    source: &'a str,
    error: &'a FrameError,
    painter: &'a Painter,
}

impl<'a> RejectedFrameView<'a> {
    pub(crate) fn new(source: &'a str, error: &'a FrameError, painter: &'a Painter) -> Self {
        Self {
            source,
            error,
            painter,
        }
    }
}

impl Display for RejectedFrameView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.painter.muted(format!("[{}]", self.source)),
            self.painter.failure("rejected"),
            self.error
        )
    }
}
