//! HCI events
//!
//! Events are sent from the controller to the host. An event packet is the event code, the
//! length of the parameter, and then the parameter. The events that this library processes are
//! converted into an [`EventsData`], every other event is kept as
//! [`EventsData::Unsupported`] so that it can still be forwarded to the user.

pub mod parameters;

use crate::errors::Error;
use alloc::vec::Vec;
use core::fmt;
use parameters::*;

/// "chews-off" bytes from the front of a parameter
///
/// Unlike indexing, this returns early with an `EventError` when `$packet` does not have enough
/// bytes.
macro_rules! chew {
    ( $packet:ident, $size:expr ) => {{
        let size: usize = $size;

        if $packet.len() < size {
            return Err($crate::events::EventError::ParameterTooShort);
        }

        let (chewed, rest) = $packet.split_at(size);

        $packet = rest;

        chewed
    }};
    ( $packet:ident ) => {
        chew!($packet, 1)[0]
    };
}

macro_rules! chew_u16 {
    ( $packet:ident ) => {{
        let bytes = chew!($packet, 2);

        <u16>::from_le_bytes([bytes[0], bytes[1]])
    }};
}

macro_rules! chew_baddr {
    ( $packet:ident ) => {
        $crate::BluetoothDeviceAddress::try_from_slice(chew!($packet, 6))
            .ok_or($crate::events::EventError::ParameterTooShort)?
    };
}

macro_rules! chew_handle {
    ( $packet:ident ) => {
        $crate::ConnectionHandle::try_from(chew_u16!($packet))
            .map_err(|_| $crate::events::EventError::InvalidConnectionHandle)?
    };
}

macro_rules! chew_status {
    ( $packet:ident ) => {
        $crate::errors::Error::from(chew!($packet))
    };
}

pub(crate) use {chew, chew_baddr, chew_handle, chew_status, chew_u16};

/// The event codes processed by this library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Events {
    DisconnectionComplete,
    CommandComplete,
    CommandStatus,
    HardwareError,
    NumberOfCompletedPackets,
    DataBufferOverflow,
    LeMeta(LeMeta),
}

impl Events {
    /// The code of the LE meta event
    pub const LE_META_CODE: u8 = 0x3E;

    /// Get the event code
    pub const fn get_event_code(&self) -> u8 {
        match self {
            Events::DisconnectionComplete => 0x05,
            Events::CommandComplete => 0x0E,
            Events::CommandStatus => 0x0F,
            Events::HardwareError => 0x10,
            Events::NumberOfCompletedPackets => 0x13,
            Events::DataBufferOverflow => 0x1A,
            Events::LeMeta(_) => Self::LE_META_CODE,
        }
    }

    /// Check if the event is masked by `Set Event Mask` (or `LE Set Event Mask`)
    ///
    /// The Command Complete, Command Status, and Number Of Completed Packets events cannot be
    /// masked by the host.
    pub fn is_maskable(&self) -> bool {
        !matches!(
            self,
            Events::CommandComplete | Events::CommandStatus | Events::NumberOfCompletedPackets
        )
    }
}

impl fmt::Display for Events {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Events::DisconnectionComplete => f.write_str("disconnection complete"),
            Events::CommandComplete => f.write_str("command complete"),
            Events::CommandStatus => f.write_str("command status"),
            Events::HardwareError => f.write_str("hardware error"),
            Events::NumberOfCompletedPackets => f.write_str("number of completed packets"),
            Events::DataBufferOverflow => f.write_str("data buffer overflow"),
            Events::LeMeta(sub) => write!(f, "LE meta - {}", sub),
        }
    }
}

/// The LE meta sub events processed by this library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeMeta {
    ConnectionComplete,
    AdvertisingReport,
    ConnectionUpdateComplete,
}

impl LeMeta {
    /// Get the sub event code
    pub const fn get_sub_event_code(&self) -> u8 {
        match self {
            LeMeta::ConnectionComplete => 0x01,
            LeMeta::AdvertisingReport => 0x02,
            LeMeta::ConnectionUpdateComplete => 0x03,
        }
    }

    /// Get the bit of this event within the LE event mask
    pub const fn get_mask_bit(&self) -> u64 {
        1 << (self.get_sub_event_code() - 1)
    }
}

impl fmt::Display for LeMeta {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LeMeta::ConnectionComplete => f.write_str("connection complete"),
            LeMeta::AdvertisingReport => f.write_str("advertising report"),
            LeMeta::ConnectionUpdateComplete => f.write_str("connection update complete"),
        }
    }
}

/// A decoded event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventsData {
    DisconnectionComplete(DisconnectionCompleteData),
    CommandComplete(CommandCompleteData),
    CommandStatus(CommandStatusData),
    HardwareError(HardwareErrorData),
    NumberOfCompletedPackets(Vec<NumberOfCompletedPacketsData>),
    DataBufferOverflow(DataBufferOverflowData),
    LeMeta(LeMetaData),
    /// An event that is not processed by this library
    ///
    /// This is the event code and the raw parameter of the event.
    Unsupported { event_code: u8, parameter: Vec<u8> },
}

impl EventsData {
    /// Decode an event from its code and parameter
    ///
    /// The `parameter` is the parameter of the event packet (the bytes after the event code and
    /// the length).
    ///
    /// # Error
    /// An error is returned if the parameter is not valid for an event that this library
    /// processes. Unknown events are never an error, they are returned as `Unsupported`.
    pub fn try_from_packet(event_code: u8, parameter: &[u8]) -> Result<Self, EventError> {
        let data = match event_code {
            0x05 => EventsData::DisconnectionComplete(DisconnectionCompleteData::try_from_parameter(parameter)?),
            0x0E => EventsData::CommandComplete(CommandCompleteData::try_from_parameter(parameter)?),
            0x0F => EventsData::CommandStatus(CommandStatusData::try_from_parameter(parameter)?),
            0x10 => EventsData::HardwareError(HardwareErrorData::try_from_parameter(parameter)?),
            0x13 => EventsData::NumberOfCompletedPackets(NumberOfCompletedPacketsData::try_from_parameter(parameter)?),
            0x1A => EventsData::DataBufferOverflow(DataBufferOverflowData::try_from_parameter(parameter)?),
            Events::LE_META_CODE => EventsData::LeMeta(LeMetaData::try_from_parameter(parameter)?),
            _ => {
                log::trace!("(HCI) event code {:#04x} is not processed by this library", event_code);

                EventsData::Unsupported {
                    event_code,
                    parameter: parameter.to_vec(),
                }
            }
        };

        Ok(data)
    }

    /// Get the event
    ///
    /// `None` is returned for an unsupported event.
    pub fn get_event_name(&self) -> Option<Events> {
        match self {
            EventsData::DisconnectionComplete(_) => Some(Events::DisconnectionComplete),
            EventsData::CommandComplete(_) => Some(Events::CommandComplete),
            EventsData::CommandStatus(_) => Some(Events::CommandStatus),
            EventsData::HardwareError(_) => Some(Events::HardwareError),
            EventsData::NumberOfCompletedPackets(_) => Some(Events::NumberOfCompletedPackets),
            EventsData::DataBufferOverflow(_) => Some(Events::DataBufferOverflow),
            EventsData::LeMeta(LeMetaData::ConnectionComplete(_)) => Some(Events::LeMeta(LeMeta::ConnectionComplete)),
            EventsData::LeMeta(LeMetaData::AdvertisingReport(_)) => Some(Events::LeMeta(LeMeta::AdvertisingReport)),
            EventsData::LeMeta(LeMetaData::ConnectionUpdateComplete(_)) => {
                Some(Events::LeMeta(LeMeta::ConnectionUpdateComplete))
            }
            EventsData::LeMeta(LeMetaData::Unsupported { .. }) | EventsData::Unsupported { .. } => None,
        }
    }

    /// Get the connection handle associated with the event
    pub fn get_handle(&self) -> Option<crate::ConnectionHandle> {
        match self {
            EventsData::DisconnectionComplete(d) => Some(d.connection_handle),
            EventsData::LeMeta(LeMetaData::ConnectionComplete(d)) => Some(d.connection_handle),
            EventsData::LeMeta(LeMetaData::ConnectionUpdateComplete(d)) => Some(d.connection_handle),
            _ => None,
        }
    }
}

/// Data of a LE meta event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeMetaData {
    ConnectionComplete(LeConnectionCompleteData),
    AdvertisingReport(Vec<LeAdvertisingReportData>),
    ConnectionUpdateComplete(LeConnectionUpdateCompleteData),
    /// A LE sub event that is not processed by this library
    Unsupported { sub_event_code: u8, parameter: Vec<u8> },
}

impl LeMetaData {
    fn try_from_parameter(mut parameter: &[u8]) -> Result<Self, EventError> {
        let sub_event_code = chew!(parameter);

        let data = match sub_event_code {
            0x01 => LeMetaData::ConnectionComplete(LeConnectionCompleteData::try_from_parameter(parameter)?),
            0x02 => LeMetaData::AdvertisingReport(LeAdvertisingReportData::try_from_parameter(parameter)?),
            0x03 => LeMetaData::ConnectionUpdateComplete(LeConnectionUpdateCompleteData::try_from_parameter(
                parameter,
            )?),
            _ => LeMetaData::Unsupported {
                sub_event_code,
                parameter: parameter.to_vec(),
            },
        };

        Ok(data)
    }
}

/// Error for an invalid event parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventError {
    /// The parameter ended before all the fields of the event were read
    ParameterTooShort,
    /// The parameter contained bytes after the fields of the event
    TrailingBytes(usize),
    InvalidConnectionHandle,
    /// A field contained a value that is reserved
    InvalidValue { field: &'static str, value: u8 },
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EventError::ParameterTooShort => f.write_str("event parameter is too short"),
            EventError::TrailingBytes(cnt) => write!(f, "event parameter has {} unexpected trailing bytes", cnt),
            EventError::InvalidConnectionHandle => f.write_str("event contains an invalid connection handle"),
            EventError::InvalidValue { field, value } => write!(f, "invalid value {:#x} for field {}", value, field),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EventError {}

/// Check that the entire parameter was consumed
pub(crate) fn finished(parameter: &[u8]) -> Result<(), EventError> {
    if parameter.is_empty() {
        Ok(())
    } else {
        Err(EventError::TrailingBytes(parameter.len()))
    }
}

/// Get the status code from the start of a return parameter
///
/// Nearly every command complete event contains the status as the first byte of the return
/// parameter.
pub fn status_of(return_parameter: &[u8]) -> Error {
    return_parameter
        .first()
        .map(|code| Error::from(*code))
        .unwrap_or(Error::MissingErrorCode)
}
