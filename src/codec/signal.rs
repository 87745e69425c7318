use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{instrument, trace};

use super::layout::{LayoutError, SignalLayout};
use crate::catalog::{MessageDescriptor, SignalDescriptor};

/// Physical signal values keyed by signal name.
pub type SignalMap = BTreeMap<String, f64>;

/// A physical value outside the bounds declared for its signal.
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
#[error("signal `{signal}` value {value} is outside [{}, {}]", bound(*minimum), bound(*maximum))]
pub struct SignalRangeError {
    signal: String,
    value: f64,
    minimum: Option<f64>,
    maximum: Option<f64>,
}

impl SignalRangeError {
    fn new(descriptor: &SignalDescriptor, value: f64) -> Self {
        Self {
            signal: descriptor.name().to_string(),
            value,
            minimum: descriptor.minimum(),
            maximum: descriptor.maximum(),
        }
    }

    /// Returns the offending signal name.
    #[must_use]
    pub fn signal(&self) -> &str {
        &self.signal
    }

    /// Returns the offending physical value.
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }
}

fn bound(value: Option<f64>) -> String {
    value.map_or_else(|| "-inf/inf".to_string(), |value| value.to_string())
}

/// Errors returned when signal values cannot be packed into a payload.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EncodeError {
    /// A value names a signal the message does not declare.
    #[error("message `{message}` has no signal `{signal}`")]
    UnknownSignal { message: String, signal: String },
    /// A declared signal has no value.
    #[error("message `{message}` requires a value for signal `{signal}`")]
    MissingSignal { message: String, signal: String },
    /// The value is NaN or infinite.
    #[error("signal `{signal}` value {value} is not finite")]
    NonFiniteValue { signal: String, value: f64 },
    /// The value lies outside the declared bounds.
    #[error(transparent)]
    OutOfRange(#[from] SignalRangeError),
    /// The scaled raw value does not fit the signal's bit width.
    #[error(
        "signal `{signal}` raw value {raw} does not fit {bit_length} {} bits",
        if *signed { "signed" } else { "unsigned" }
    )]
    ValueTooWide {
        signal: String,
        raw: f64,
        bit_length: u8,
        signed: bool,
    },
    /// The signal layout does not fit the message payload.
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

/// Result of decoding one payload against a message descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SignalValues {
    values: SignalMap,
    range_errors: Vec<SignalRangeError>,
}

impl SignalValues {
    /// Returns every decoded physical value.
    #[must_use]
    pub fn values(&self) -> &SignalMap {
        &self.values
    }

    /// Returns one decoded value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Returns the values that fell outside their declared bounds.
    ///
    /// These values are still present in [`Self::values`].
    #[must_use]
    pub fn range_errors(&self) -> &[SignalRangeError] {
        &self.range_errors
    }

    /// Splits into values and range reports.
    #[must_use]
    pub fn into_parts(self) -> (SignalMap, Vec<SignalRangeError>) {
        (self.values, self.range_errors)
    }
}

/// Generic bit-level signal codec driven by message descriptors.
pub struct SignalCodec;

impl SignalCodec {
    /// Decodes every signal declared by `descriptor` from `payload`.
    ///
    /// Out-of-range values are reported alongside the value and never stop
    /// the remaining signals from decoding.
    ///
    /// # Errors
    ///
    /// Returns an error when a signal's bit range does not fit `payload`.
    ///
    /// ```
    /// use busgate::{MessageDescriptor, SignalCodec, SignalDescriptor};
    ///
    /// let message = MessageDescriptor::builder()
    ///     .id(100)
    ///     .name("Voltage")
    ///     .signals(vec![
    ///         SignalDescriptor::builder()
    ///             .name("dc_voltage")
    ///             .start_bit(0)
    ///             .bit_length(16)
    ///             .scale(0.1)
    ///             .build(),
    ///     ])
    ///     .build();
    ///
    /// let decoded = SignalCodec::decode(&[0x10, 0x27, 0, 0, 0, 0, 0, 0], &message)?;
    /// assert_eq!(Some(1000.0), decoded.get("dc_voltage"));
    /// # Ok::<(), busgate::LayoutError>(())
    /// ```
    pub fn decode(payload: &[u8], descriptor: &MessageDescriptor) -> Result<SignalValues, LayoutError> {
        let layouts = descriptor
            .signals()
            .iter()
            .map(|signal| SignalLayout::new(signal, payload.len()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::decode_with_layouts(payload, descriptor, &layouts)
    }

    /// Decodes with layouts computed ahead of time, one per declared signal.
    #[instrument(skip_all, level = "trace", fields(message = descriptor.name()))]
    pub(crate) fn decode_with_layouts(
        payload: &[u8],
        descriptor: &MessageDescriptor,
        layouts: &[SignalLayout],
    ) -> Result<SignalValues, LayoutError> {
        debug_assert_eq!(descriptor.signals().len(), layouts.len());
        let mut decoded = SignalValues::default();
        for (signal, layout) in descriptor.signals().iter().zip(layouts) {
            layout.check_fits(signal, payload.len())?;
            let raw = layout.extract(payload);
            let value = to_integer(raw, layout.bit_length(), signal.is_signed()) * signal.scale()
                + signal.offset();

            if !signal.accepts(value) {
                trace!(signal = signal.name(), value, "decoded value outside declared bounds");
                decoded.range_errors.push(SignalRangeError::new(signal, value));
            }
            decoded.values.insert(signal.name().to_string(), value);
        }
        Ok(decoded)
    }

    /// Packs a complete set of signal values into a zeroed payload.
    ///
    /// Every declared signal must have a value; bytes not covered by any
    /// signal stay zero.
    ///
    /// # Errors
    ///
    /// Returns the first problem found; nothing is written on error.
    ///
    /// ```
    /// use busgate::{MessageDescriptor, SignalCodec, SignalDescriptor, SignalMap};
    ///
    /// let message = MessageDescriptor::builder()
    ///     .id(100)
    ///     .name("Voltage")
    ///     .signals(vec![
    ///         SignalDescriptor::builder()
    ///             .name("dc_voltage")
    ///             .start_bit(0)
    ///             .bit_length(16)
    ///             .scale(0.1)
    ///             .build(),
    ///     ])
    ///     .build();
    ///
    /// let values = SignalMap::from([("dc_voltage".to_string(), 1000.0)]);
    /// let payload = SignalCodec::encode(&values, &message)?;
    /// assert_eq!(vec![0x10, 0x27, 0, 0, 0, 0, 0, 0], payload);
    /// # Ok::<(), busgate::EncodeError>(())
    /// ```
    pub fn encode(values: &SignalMap, descriptor: &MessageDescriptor) -> Result<Vec<u8>, EncodeError> {
        let payload_len = usize::from(descriptor.byte_length());
        let layouts = descriptor
            .signals()
            .iter()
            .map(|signal| SignalLayout::new(signal, payload_len))
            .collect::<Result<Vec<_>, _>>()?;
        Self::encode_with_layouts(values, descriptor, &layouts)
    }

    /// Encodes with layouts computed ahead of time, one per declared signal.
    pub(crate) fn encode_with_layouts(
        values: &SignalMap,
        descriptor: &MessageDescriptor,
        layouts: &[SignalLayout],
    ) -> Result<Vec<u8>, EncodeError> {
        debug_assert_eq!(descriptor.signals().len(), layouts.len());
        if let Some(error) = unknown_signals(values, descriptor).next() {
            return Err(error);
        }

        let mut payload = vec![0_u8; usize::from(descriptor.byte_length())];
        let mut packed = Vec::with_capacity(layouts.len());
        for (signal, layout) in descriptor.signals().iter().zip(layouts) {
            let Some(value) = values.get(signal.name()).copied() else {
                return Err(EncodeError::MissingSignal {
                    message: descriptor.name().to_string(),
                    signal: signal.name().to_string(),
                });
            };
            layout.check_fits(signal, payload.len())?;
            let raw = to_raw(signal, layout.bit_length(), value)?;
            packed.push((layout, raw));
        }

        for (layout, raw) in packed {
            layout.pack(&mut payload, raw);
        }
        Ok(payload)
    }

    /// Collects every problem that would stop `values` from encoding.
    ///
    /// An empty result means [`Self::encode`] will succeed.
    #[must_use]
    pub fn check_values(values: &SignalMap, descriptor: &MessageDescriptor) -> Vec<EncodeError> {
        let mut problems: Vec<EncodeError> = unknown_signals(values, descriptor).collect();
        for signal in descriptor.signals() {
            let Some(value) = values.get(signal.name()).copied() else {
                problems.push(EncodeError::MissingSignal {
                    message: descriptor.name().to_string(),
                    signal: signal.name().to_string(),
                });
                continue;
            };
            let checked = SignalLayout::new(signal, usize::from(descriptor.byte_length()))
                .map_err(EncodeError::from)
                .and_then(|layout| to_raw(signal, layout.bit_length(), value));
            if let Err(error) = checked {
                problems.push(error);
            }
        }
        problems
    }
}

fn unknown_signals<'a>(
    values: &'a SignalMap,
    descriptor: &'a MessageDescriptor,
) -> impl Iterator<Item = EncodeError> + 'a {
    values
        .keys()
        .filter(|name| descriptor.signal(name).is_none())
        .map(|name| EncodeError::UnknownSignal {
            message: descriptor.name().to_string(),
            signal: name.clone(),
        })
}

fn to_integer(raw: u64, bit_length: u8, signed: bool) -> f64 {
    if !signed {
        return raw as f64;
    }
    let unused = 64 - u32::from(bit_length);
    // Two's complement over bit_length bits via arithmetic shift.
    (((raw << unused) as i64) >> unused) as f64
}

fn to_raw(signal: &SignalDescriptor, bit_length: u8, value: f64) -> Result<u64, EncodeError> {
    if !value.is_finite() {
        return Err(EncodeError::NonFiniteValue {
            signal: signal.name().to_string(),
            value,
        });
    }
    if !signal.accepts(value) {
        return Err(SignalRangeError::new(signal, value).into());
    }

    let raw = ((value - signal.offset()) / signal.scale()).round();
    let (low, high) = if signal.is_signed() {
        let half = 2_f64.powi(i32::from(bit_length) - 1);
        (-half, half)
    } else {
        (0.0, 2_f64.powi(i32::from(bit_length)))
    };
    if !(low..high).contains(&raw) {
        return Err(EncodeError::ValueTooWide {
            signal: signal.name().to_string(),
            raw,
            bit_length,
            signed: signal.is_signed(),
        });
    }

    let bits = if signal.is_signed() {
        (raw as i64) as u64
    } else {
        raw as u64
    };
    Ok(mask(bits, bit_length))
}

fn mask(bits: u64, bit_length: u8) -> u64 {
    if bit_length >= 64 {
        bits
    } else {
        bits & ((1_u64 << bit_length) - 1)
    }
}
