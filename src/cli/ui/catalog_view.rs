use std::fmt::{self, Display, Formatter};

use crate::catalog::{CatalogInfo, MessageCatalog, MessageDescriptor, SignalDescriptor};

use super::painter::Painter;
use super::table::Table;

/// Renders the catalog summary and its message list.
pub(crate) struct CatalogView<'a> {
    catalog: &'a MessageCatalog,
    info: CatalogInfo,
    painter: &'a Painter,
}

impl<'a> CatalogView<'a> {
    pub(crate) fn new(catalog: &'a MessageCatalog, painter: &'a Painter) -> Self {
        Self {
            catalog,
            info: catalog.info(),
            painter,
        }
    }
}

impl Display for CatalogView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let summary = Table::key_value(
            self.painter,
            vec![
                ("source", self.painter.value(self.info.source_name())),
                ("messages", self.painter.value(self.info.total_messages().to_string())),
                ("loaded_at", self.info.loaded_at().to_string()),
            ],
        );
        let rows = self
            .catalog
            .messages()
            .iter()
            .map(|message| {
                vec![
                    message.id().to_string(),
                    self.painter.value(message.name()),
                    message.byte_length().to_string(),
                    message.signals().len().to_string(),
                ]
            })
            .collect();
        let messages = Table::grid(["id", "name", "bytes", "signals"], rows);

        write!(f, "{}", self.painter.heading("Catalog:"))?;
        write!(f, "\n{summary}")?;
        writeln!(f)?;
        write!(f, "\n{}", self.painter.heading("Messages:"))?;
        write!(f, "\n{messages}")
    }
}

/// Renders one message with the layout of every signal.
pub(crate) struct MessageDetailView<'a> {
    message: &'a MessageDescriptor,
    painter: &'a Painter,
}

impl<'a> MessageDetailView<'a> {
    pub(crate) fn new(message: &'a MessageDescriptor, painter: &'a Painter) -> Self {
        Self { message, painter }
    }
}

impl Display for MessageDetailView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut fields = vec![
            ("id", self.painter.value(self.message.id().to_string())),
            ("name", self.painter.value(self.message.name())),
            ("bytes", self.message.byte_length().to_string()),
        ];
        if !self.message.comment().is_empty() {
            fields.push(("comment", self.message.comment().to_string()));
        }
        let summary = Table::key_value(self.painter, fields);
        let rows = self.message.signals().iter().map(signal_row).collect();
        let signals = Table::grid(
            [
                "signal", "start", "bits", "order", "signed", "scale", "offset", "min", "max",
                "unit",
            ],
            rows,
        );

        write!(f, "{}", self.painter.heading("Message:"))?;
        write!(f, "\n{summary}")?;
        writeln!(f)?;
        write!(f, "\n{}", self.painter.heading("Signals:"))?;
        write!(f, "\n{signals}")
    }
}

fn signal_row(signal: &SignalDescriptor) -> Vec<String> {
    let bound = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |value| value.to_string());
    vec![
        signal.name().to_string(),
        signal.start_bit().to_string(),
        signal.bit_length().to_string(),
        signal.byte_order().to_string(),
        if signal.is_signed() { "yes" } else { "no" }.to_string(),
        signal.scale().to_string(),
        signal.offset().to_string(),
        bound(signal.minimum()),
        bound(signal.maximum()),
        signal.unit().to_string(),
    ]
}
