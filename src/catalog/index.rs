use std::collections::{BTreeMap, HashMap, HashSet};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::model::MessageDescriptor;
use super::source::CatalogSource;
use crate::codec::{LayoutError, SignalLayout};
use crate::error::CatalogError;
use crate::frame::{MAX_MESSAGE_ID, PAYLOAD_LEN};
use crate::utils::rfc3339_now;

/// Validation settings applied while building a catalog.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct CatalogOptions {
    /// Rejects messages whose signals share payload bits instead of warning.
    pub strict: bool,
}

/// Immutable index from message id to message descriptor.
///
/// Built once from a [`CatalogSource`]; lookups never mutate and need no
/// locking.
#[derive(Debug)]
pub struct MessageCatalog {
    source_name: String,
    messages: Vec<MessageDescriptor>,
    /// Signal layouts per message, parallel to `messages` and to each message's signals.
    layouts: Vec<Vec<SignalLayout>>,
    by_id: HashMap<u32, usize>,
    by_name: HashMap<String, usize>,
    loaded_at: String,
}

impl MessageCatalog {
    /// Reads and validates every message from `source`.
    ///
    /// # Errors
    ///
    /// Returns an error when the source fails, ids or names repeat, or a
    /// signal is malformed.
    ///
    /// ```
    /// use busgate::{CatalogOptions, JsonCatalogSource, MessageCatalog};
    ///
    /// let source = JsonCatalogSource::from_json(
    ///     "inline",
    ///     r#"{ "messages": [ { "id": 100, "name": "Status", "signals": [
    ///         { "name": "state", "start_bit": 0, "length": 4 } ] } ] }"#,
    /// );
    /// let catalog = MessageCatalog::load(&source, CatalogOptions::default())?;
    /// assert_eq!(Some("Status"), catalog.lookup(100).map(|message| message.name()));
    /// assert!(catalog.lookup(101).is_none());
    /// # Ok::<(), busgate::CatalogError>(())
    /// ```
    #[instrument(skip_all, level = "info", fields(source = source.name(), strict = options.strict))]
    pub fn load(source: &dyn CatalogSource, options: CatalogOptions) -> Result<Self, CatalogError> {
        let messages = source.read_messages()?;
        let catalog = Self::from_messages(source.name(), messages, options)?;
        info!(messages = catalog.len(), "message catalog loaded");
        Ok(catalog)
    }

    /// Builds a catalog from already-parsed descriptors.
    ///
    /// # Errors
    ///
    /// Returns an error when ids or names repeat or a signal is malformed.
    pub fn from_messages(
        source_name: impl Into<String>,
        messages: Vec<MessageDescriptor>,
        options: CatalogOptions,
    ) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::with_capacity(messages.len());
        let mut by_name = HashMap::with_capacity(messages.len());
        let mut layouts = Vec::with_capacity(messages.len());

        for (index, message) in messages.iter().enumerate() {
            layouts.push(validate_message(message, options)?);

            if by_id.insert(message.id(), index).is_some() {
                return Err(CatalogError::DuplicateMessageId { id: message.id() });
            }
            if by_name.insert(message.name().to_string(), index).is_some() {
                return Err(CatalogError::DuplicateMessageName {
                    name: message.name().to_string(),
                });
            }
            if message.id() > u32::from(MAX_MESSAGE_ID) {
                debug!(
                    id = message.id(),
                    name = message.name(),
                    "message id is wider than the frame header can address"
                );
            }
        }

        Ok(Self {
            source_name: source_name.into(),
            messages,
            layouts,
            by_id,
            by_name,
            loaded_at: rfc3339_now(),
        })
    }

    /// Returns the descriptor registered for `id`.
    #[must_use]
    pub fn lookup(&self, id: u32) -> Option<&MessageDescriptor> {
        self.by_id.get(&id).map(|index| &self.messages[*index])
    }

    /// Returns the descriptor registered for `id` with its signal layouts.
    pub(crate) fn lookup_with_layouts(
        &self,
        id: u32,
    ) -> Option<(&MessageDescriptor, &[SignalLayout])> {
        self.by_id.get(&id).map(|index| self.entry(*index))
    }

    /// Returns the descriptor registered under `name`.
    #[must_use]
    pub fn lookup_by_name(&self, name: &str) -> Option<&MessageDescriptor> {
        self.by_name.get(name).map(|index| &self.messages[*index])
    }

    /// Resolves a message by id or name.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownMessage`] when nothing matches.
    pub fn resolve(&self, reference: &MessageRef) -> Result<&MessageDescriptor, CatalogError> {
        self.resolve_with_layouts(reference)
            .map(|(descriptor, _layouts)| descriptor)
    }

    /// Resolves a message by id or name, together with its signal layouts.
    pub(crate) fn resolve_with_layouts(
        &self,
        reference: &MessageRef,
    ) -> Result<(&MessageDescriptor, &[SignalLayout]), CatalogError> {
        let index = match reference {
            MessageRef::Id(id) => self.by_id.get(id),
            MessageRef::Name(name) => self.by_name.get(name.as_str()),
        };
        index
            .map(|index| self.entry(*index))
            .ok_or_else(|| CatalogError::UnknownMessage {
                reference: reference.to_string(),
            })
    }

    fn entry(&self, index: usize) -> (&MessageDescriptor, &[SignalLayout]) {
        (&self.messages[index], self.layouts[index].as_slice())
    }

    /// Returns the descriptors in source order.
    #[must_use]
    pub fn messages(&self) -> &[MessageDescriptor] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Returns the name of the source this catalog was built from.
    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Summarises the catalog contents.
    #[must_use]
    pub fn info(&self) -> CatalogInfo {
        CatalogInfo {
            source_name: self.source_name.clone(),
            total_messages: self.messages.len(),
            messages: self
                .messages
                .iter()
                .map(|message| (message.id(), message.name().to_string()))
                .collect(),
            loaded_at: self.loaded_at.clone(),
        }
    }
}

/// A message named on the command line, either by numeric id or by name.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum MessageRef {
    Id(u32),
    Name(String),
}

impl FromStr for MessageRef {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
            Some(digits) => u32::from_str_radix(digits, 16).ok(),
            None => value.parse().ok(),
        };
        Ok(parsed.map_or_else(|| Self::Name(value.to_string()), Self::Id))
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// Summary of a loaded catalog.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct CatalogInfo {
    source_name: String,
    total_messages: usize,
    messages: BTreeMap<u32, String>,
    loaded_at: String,
}

impl CatalogInfo {
    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    #[must_use]
    pub fn total_messages(&self) -> usize {
        self.total_messages
    }

    /// Returns message names keyed by id.
    #[must_use]
    pub fn messages(&self) -> &BTreeMap<u32, String> {
        &self.messages
    }

    /// Returns when the catalog was built, as RFC 3339 UTC.
    #[must_use]
    pub fn loaded_at(&self) -> &str {
        &self.loaded_at
    }
}

fn validate_message(
    message: &MessageDescriptor,
    options: CatalogOptions,
) -> Result<Vec<SignalLayout>, CatalogError> {
    let byte_length = message.byte_length();
    if byte_length == 0 || usize::from(byte_length) > PAYLOAD_LEN {
        return Err(CatalogError::InvalidByteLength {
            message: message.name().to_string(),
            byte_length,
        });
    }

    let mut signal_names = HashSet::with_capacity(message.signals().len());
    let mut occupied: HashMap<usize, &str> = HashMap::new();
    let mut layouts = Vec::with_capacity(message.signals().len());
    for signal in message.signals() {
        if !signal_names.insert(signal.name()) {
            return Err(CatalogError::DuplicateSignalName {
                message: message.name().to_string(),
                signal: signal.name().to_string(),
            });
        }
        if !signal.scale().is_finite() || signal.scale() == 0.0 || !signal.offset().is_finite() {
            return Err(CatalogError::InvalidScale {
                message: message.name().to_string(),
                signal: signal.name().to_string(),
            });
        }
        if let (Some(minimum), Some(maximum)) = (signal.minimum(), signal.maximum())
            && minimum > maximum
        {
            return Err(CatalogError::InvalidBounds {
                message: message.name().to_string(),
                signal: signal.name().to_string(),
            });
        }

        let layout = SignalLayout::new(signal, usize::from(byte_length))
            .map_err(|error| layout_error(message, error))?;
        for bit in layout.occupied_bits() {
            let Some(previous) = occupied.insert(bit, signal.name()) else {
                continue;
            };
            if options.strict {
                return Err(CatalogError::OverlappingSignals {
                    message: message.name().to_string(),
                    first: previous.to_string(),
                    second: signal.name().to_string(),
                });
            }
            warn!(
                message = message.name(),
                first = previous,
                second = signal.name(),
                bit,
                "signals share payload bits"
            );
            break;
        }
        layouts.push(layout);
    }
    Ok(layouts)
}

fn layout_error(message: &MessageDescriptor, error: LayoutError) -> CatalogError {
    match error {
        LayoutError::InvalidBitLength { signal, bit_length } => CatalogError::InvalidBitLength {
            message: message.name().to_string(),
            signal,
            bit_length,
        },
        LayoutError::OutOfBounds {
            signal,
            start_bit,
            bit_length,
            payload_len: _,
        } => CatalogError::SignalOutOfBounds {
            message: message.name().to_string(),
            signal,
            start_bit,
            bit_length,
            byte_length: message.byte_length(),
        },
    }
}

/// Shared, swappable reference to the active catalog.
///
/// Readers take a cheap snapshot with [`Self::current`]; a reload builds a
/// new catalog and installs it with [`Self::replace`] without disturbing
/// in-flight lookups.
#[derive(Debug, Clone)]
pub struct CatalogHandle {
    inner: Arc<RwLock<Arc<MessageCatalog>>>,
}

impl CatalogHandle {
    #[must_use]
    pub fn new(catalog: MessageCatalog) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(catalog))),
        }
    }

    /// Returns the catalog snapshot currently in use.
    #[must_use]
    pub fn current(&self) -> Arc<MessageCatalog> {
        Arc::clone(&self.inner.read())
    }

    /// Installs `catalog` and returns the one it replaced.
    pub fn replace(&self, catalog: MessageCatalog) -> Arc<MessageCatalog> {
        let replacement = Arc::new(catalog);
        info!(
            source = replacement.source_name(),
            messages = replacement.len(),
            "message catalog replaced"
        );
        std::mem::replace(&mut *self.inner.write(), replacement)
    }
}
