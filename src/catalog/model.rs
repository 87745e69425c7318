use bon::Builder;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Fraction of a signal's scale allowed past a declared bound.
const BOUND_TOLERANCE: f64 = 1e-6;

/// Bit numbering used to lay a signal out inside a payload.
#[derive(
    Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ByteOrder {
    /// Flat LSB-first bit index; `start_bit` is the signal's least significant bit.
    #[default]
    LittleEndian,
    /// MSB-first walk; `start_bit` is the signal's most significant bit.
    BigEndian,
}

/// Layout and scaling of one named signal inside a message payload.
#[derive(Debug, Clone, PartialEq, Builder, Serialize)]
#[builder(on(String, into))]
pub struct SignalDescriptor {
    name: String,
    start_bit: u16,
    bit_length: u8,
    #[builder(default)]
    byte_order: ByteOrder,
    #[builder(default)]
    is_signed: bool,
    #[builder(default = 1.0)]
    scale: f64,
    #[builder(default)]
    offset: f64,
    minimum: Option<f64>,
    maximum: Option<f64>,
    #[builder(default)]
    unit: String,
    #[builder(default)]
    comment: String,
}

impl SignalDescriptor {
    /// Returns the signal name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the start bit in the numbering of [`Self::byte_order`].
    #[must_use]
    pub fn start_bit(&self) -> u16 {
        self.start_bit
    }

    /// Returns the width in bits.
    #[must_use]
    pub fn bit_length(&self) -> u8 {
        self.bit_length
    }

    #[must_use]
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.is_signed
    }

    #[must_use]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[must_use]
    pub fn offset(&self) -> f64 {
        self.offset
    }

    #[must_use]
    pub fn minimum(&self) -> Option<f64> {
        self.minimum
    }

    #[must_use]
    pub fn maximum(&self) -> Option<f64> {
        self.maximum
    }

    /// Returns the engineering unit, empty when unitless.
    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    #[must_use]
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Returns whether `value` lies inside the declared bounds.
    ///
    /// Missing bounds are open. Each bound is widened by a millionth of the
    /// scale so a raw value sitting on a limit still passes after scaling.
    #[must_use]
    pub fn accepts(&self, value: f64) -> bool {
        let tolerance = self.scale.abs() * BOUND_TOLERANCE;
        self.minimum.is_none_or(|minimum| value >= minimum - tolerance)
            && self.maximum.is_none_or(|maximum| value <= maximum + tolerance)
    }
}

/// One catalog entry: a message id and its ordered signals.
#[derive(Debug, Clone, PartialEq, Builder, Serialize)]
#[builder(on(String, into))]
pub struct MessageDescriptor {
    id: u32,
    name: String,
    #[builder(default = 8)]
    byte_length: u8,
    #[builder(default)]
    signals: Vec<SignalDescriptor>,
    #[builder(default)]
    comment: String,
}

impl MessageDescriptor {
    /// Returns the numeric message id used as the catalog key.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the payload length in bytes.
    #[must_use]
    pub fn byte_length(&self) -> u8 {
        self.byte_length
    }

    /// Returns the signals in declaration order.
    #[must_use]
    pub fn signals(&self) -> &[SignalDescriptor] {
        &self.signals
    }

    /// Finds a signal by name.
    #[must_use]
    pub fn signal(&self, name: &str) -> Option<&SignalDescriptor> {
        self.signals.iter().find(|signal| signal.name == name)
    }

    #[must_use]
    pub fn comment(&self) -> &str {
        &self.comment
    }
}
