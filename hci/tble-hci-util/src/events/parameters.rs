//! Event parameters
//!
//! These are the parameters of the events processed by this library.

use super::{chew, chew_baddr, chew_handle, chew_status, chew_u16, finished, EventError};
use crate::errors::Error;
use crate::{BluetoothDeviceAddress, ConnectionHandle};
use alloc::vec::Vec;

/// Command Complete event data
///
/// The `command_opcode` is `None` when the controller sent a command complete event that is not
/// associated with any command (the 'NOP' opcode of zero). These are used by a controller to only
/// update the number of command packets the host can send to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCompleteData {
    pub number_of_hci_command_packets: u8,
    pub command_opcode: Option<u16>,
    pub return_parameter: Vec<u8>,
}

impl CommandCompleteData {
    pub(super) fn try_from_parameter(mut parameter: &[u8]) -> Result<Self, EventError> {
        let number_of_hci_command_packets = chew!(parameter);

        let opcode = chew_u16!(parameter);

        Ok(CommandCompleteData {
            number_of_hci_command_packets,
            command_opcode: (opcode != 0).then_some(opcode),
            return_parameter: parameter.to_vec(),
        })
    }

    /// Get the status of the command
    ///
    /// This is the first byte of the return parameter, `MissingErrorCode` is returned if the
    /// return parameter is empty.
    pub fn status(&self) -> Error {
        super::status_of(&self.return_parameter)
    }
}

/// Command Status event data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStatusData {
    pub status: Error,
    pub number_of_hci_command_packets: u8,
    pub command_opcode: Option<u16>,
}

impl CommandStatusData {
    pub(super) fn try_from_parameter(mut parameter: &[u8]) -> Result<Self, EventError> {
        let status = chew_status!(parameter);

        let number_of_hci_command_packets = chew!(parameter);

        let opcode = chew_u16!(parameter);

        finished(parameter)?;

        Ok(CommandStatusData {
            status,
            number_of_hci_command_packets,
            command_opcode: (opcode != 0).then_some(opcode),
        })
    }
}

/// Disconnection Complete event data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectionCompleteData {
    pub status: Error,
    pub connection_handle: ConnectionHandle,
    pub reason: Error,
}

impl DisconnectionCompleteData {
    pub(super) fn try_from_parameter(mut parameter: &[u8]) -> Result<Self, EventError> {
        let status = chew_status!(parameter);

        let connection_handle = chew_handle!(parameter);

        let reason = chew_status!(parameter);

        finished(parameter)?;

        Ok(DisconnectionCompleteData {
            status,
            connection_handle,
            reason,
        })
    }
}

/// Hardware Error event data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareErrorData {
    pub hardware_code: u8,
}

impl HardwareErrorData {
    pub(super) fn try_from_parameter(mut parameter: &[u8]) -> Result<Self, EventError> {
        let hardware_code = chew!(parameter);

        finished(parameter)?;

        Ok(HardwareErrorData { hardware_code })
    }
}

/// An entry of the Number Of Completed Packets event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberOfCompletedPacketsData {
    pub connection_handle: ConnectionHandle,
    pub completed_packets: u16,
}

impl NumberOfCompletedPacketsData {
    pub(super) fn try_from_parameter(mut parameter: &[u8]) -> Result<Vec<Self>, EventError> {
        let count = chew!(parameter) as usize;

        let mut handles = Vec::with_capacity(count);

        // the parameter lists all the handles followed by all the counts
        for _ in 0..count {
            handles.push(chew_handle!(parameter));
        }

        let mut entries = Vec::with_capacity(count);

        for connection_handle in handles {
            entries.push(NumberOfCompletedPacketsData {
                connection_handle,
                completed_packets: chew_u16!(parameter),
            })
        }

        finished(parameter)?;

        Ok(entries)
    }
}

/// Data Buffer Overflow event data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataBufferOverflowData {
    /// 0 for a SCO link, 1 for an ACL link
    pub link_type: u8,
}

impl DataBufferOverflowData {
    pub(super) fn try_from_parameter(mut parameter: &[u8]) -> Result<Self, EventError> {
        let link_type = chew!(parameter);

        finished(parameter)?;

        Ok(DataBufferOverflowData { link_type })
    }
}

/// The role of this device within a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeConnectionRole {
    Central,
    Peripheral,
}

impl LeConnectionRole {
    fn try_from_raw(raw: u8) -> Result<Self, EventError> {
        match raw {
            0x00 => Ok(LeConnectionRole::Central),
            0x01 => Ok(LeConnectionRole::Peripheral),
            value => Err(EventError::InvalidValue { field: "role", value }),
        }
    }
}

/// The address type of a connected (or advertising) device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeAddressType {
    PublicDeviceAddress,
    RandomDeviceAddress,
    PublicIdentityAddress,
    RandomIdentityAddress,
}

impl LeAddressType {
    fn try_from_raw(raw: u8) -> Result<Self, EventError> {
        match raw {
            0x00 => Ok(LeAddressType::PublicDeviceAddress),
            0x01 => Ok(LeAddressType::RandomDeviceAddress),
            0x02 => Ok(LeAddressType::PublicIdentityAddress),
            0x03 => Ok(LeAddressType::RandomIdentityAddress),
            value => Err(EventError::InvalidValue {
                field: "address type",
                value,
            }),
        }
    }

    /// Get the raw value
    pub fn get_raw_val(&self) -> u8 {
        match self {
            LeAddressType::PublicDeviceAddress => 0x00,
            LeAddressType::RandomDeviceAddress => 0x01,
            LeAddressType::PublicIdentityAddress => 0x02,
            LeAddressType::RandomIdentityAddress => 0x03,
        }
    }
}

/// LE Connection Complete event data
///
/// The intervals are in their raw form. The connection interval is in units of 1.25
/// milliseconds and the supervision timeout is in units of 10 milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeConnectionCompleteData {
    pub status: Error,
    pub connection_handle: ConnectionHandle,
    pub role: LeConnectionRole,
    pub peer_address_type: LeAddressType,
    pub peer_address: BluetoothDeviceAddress,
    pub connection_interval: u16,
    pub peripheral_latency: u16,
    pub supervision_timeout: u16,
    pub central_clock_accuracy: u8,
}

impl LeConnectionCompleteData {
    pub(super) fn try_from_parameter(mut parameter: &[u8]) -> Result<Self, EventError> {
        let status = chew_status!(parameter);
        let connection_handle = chew_handle!(parameter);
        let role = LeConnectionRole::try_from_raw(chew!(parameter))?;
        let peer_address_type = LeAddressType::try_from_raw(chew!(parameter))?;
        let peer_address = chew_baddr!(parameter);
        let connection_interval = chew_u16!(parameter);
        let peripheral_latency = chew_u16!(parameter);
        let supervision_timeout = chew_u16!(parameter);
        let central_clock_accuracy = chew!(parameter);

        finished(parameter)?;

        Ok(LeConnectionCompleteData {
            status,
            connection_handle,
            role,
            peer_address_type,
            peer_address,
            connection_interval,
            peripheral_latency,
            supervision_timeout,
            central_clock_accuracy,
        })
    }
}

/// The kind of advertising packet that was received
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeAdvertisingEventType {
    ConnectableAndScannableUndirected,
    ConnectableDirected,
    ScannableUndirected,
    NonConnectableUndirected,
    ScanResponse,
}

impl LeAdvertisingEventType {
    fn try_from_raw(raw: u8) -> Result<Self, EventError> {
        match raw {
            0x00 => Ok(LeAdvertisingEventType::ConnectableAndScannableUndirected),
            0x01 => Ok(LeAdvertisingEventType::ConnectableDirected),
            0x02 => Ok(LeAdvertisingEventType::ScannableUndirected),
            0x03 => Ok(LeAdvertisingEventType::NonConnectableUndirected),
            0x04 => Ok(LeAdvertisingEventType::ScanResponse),
            value => Err(EventError::InvalidValue {
                field: "advertising event type",
                value,
            }),
        }
    }
}

/// A single report of the LE Advertising Report event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeAdvertisingReportData {
    pub event_type: LeAdvertisingEventType,
    pub address_type: LeAddressType,
    pub address: BluetoothDeviceAddress,
    pub data: Vec<u8>,
    /// `None` when the controller could not measure the RSSI
    pub rssi: Option<i8>,
}

impl LeAdvertisingReportData {
    /// The largest amount of data within a single report
    pub const MAX_DATA_LEN: usize = 31;

    pub(super) fn try_from_parameter(mut parameter: &[u8]) -> Result<Vec<Self>, EventError> {
        let count = chew!(parameter) as usize;

        // Each field is listed in order for every report (all event types, then all address
        // types, and so forth) so the reports are assembled in passes.
        let mut event_types = Vec::with_capacity(count);
        let mut address_types = Vec::with_capacity(count);
        let mut addresses = Vec::with_capacity(count);
        let mut data_lengths = Vec::with_capacity(count);

        for _ in 0..count {
            event_types.push(LeAdvertisingEventType::try_from_raw(chew!(parameter))?);
        }

        for _ in 0..count {
            address_types.push(LeAddressType::try_from_raw(chew!(parameter))?);
        }

        for _ in 0..count {
            addresses.push(chew_baddr!(parameter));
        }

        for _ in 0..count {
            let len = chew!(parameter) as usize;

            if len > Self::MAX_DATA_LEN {
                return Err(EventError::InvalidValue {
                    field: "advertising data length",
                    value: len as u8,
                });
            }

            data_lengths.push(len);
        }

        let mut data = Vec::with_capacity(count);

        for len in data_lengths {
            data.push(chew!(parameter, len).to_vec());
        }

        let mut reports = Vec::with_capacity(count);

        for (((event_type, address_type), address), data) in event_types
            .into_iter()
            .zip(address_types)
            .zip(addresses)
            .zip(data)
        {
            let raw_rssi = chew!(parameter) as i8;

            reports.push(LeAdvertisingReportData {
                event_type,
                address_type,
                address,
                data,
                rssi: (raw_rssi != 127).then_some(raw_rssi),
            })
        }

        finished(parameter)?;

        Ok(reports)
    }
}

/// LE Connection Update Complete event data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeConnectionUpdateCompleteData {
    pub status: Error,
    pub connection_handle: ConnectionHandle,
    pub connection_interval: u16,
    pub peripheral_latency: u16,
    pub supervision_timeout: u16,
}

impl LeConnectionUpdateCompleteData {
    pub(super) fn try_from_parameter(mut parameter: &[u8]) -> Result<Self, EventError> {
        let status = chew_status!(parameter);
        let connection_handle = chew_handle!(parameter);
        let connection_interval = chew_u16!(parameter);
        let peripheral_latency = chew_u16!(parameter);
        let supervision_timeout = chew_u16!(parameter);

        finished(parameter)?;

        Ok(LeConnectionUpdateCompleteData {
            status,
            connection_handle,
            connection_interval,
            peripheral_latency,
            supervision_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn le_connection_complete() {
        let parameter = [
            0x00, // status
            0x01, 0x00, // handle
            0x01, // role
            0x00, // peer address type
            0x66, 0x55, 0x44, 0x33, 0x22, 0x11, // peer address
            0x18, 0x00, // interval
            0x00, 0x00, // latency
            0xC8, 0x00, // timeout
            0x00, // clock accuracy
        ];

        let data = LeConnectionCompleteData::try_from_parameter(&parameter).unwrap();

        assert_eq!(Error::NoError, data.status);
        assert_eq!(1, data.connection_handle.get_raw_handle());
        assert_eq!(LeConnectionRole::Peripheral, data.role);
        assert_eq!(BluetoothDeviceAddress([0x66, 0x55, 0x44, 0x33, 0x22, 0x11]), data.peer_address);
        assert_eq!(0x18, data.connection_interval);
        assert_eq!(0xC8, data.supervision_timeout);

        assert_eq!(
            Err(EventError::ParameterTooShort),
            LeConnectionCompleteData::try_from_parameter(&parameter[..10])
        );
    }

    #[test]
    fn advertising_reports() {
        let parameter = [
            0x02, // two reports
            0x00, 0x04, // event types
            0x00, 0x01, // address types
            1, 2, 3, 4, 5, 6, // first address
            7, 8, 9, 10, 11, 12, // second address
            0x03, 0x00, // data lengths
            0x02, 0x01, 0x06, // data of the first
            0xC4, // rssi of the first (-60)
            0x7F, // rssi of the second (unavailable)
        ];

        let reports = LeAdvertisingReportData::try_from_parameter(&parameter).unwrap();

        assert_eq!(2, reports.len());
        assert_eq!(alloc::vec![0x02, 0x01, 0x06], reports[0].data);
        assert_eq!(Some(-60), reports[0].rssi);
        assert_eq!(LeAdvertisingEventType::ScanResponse, reports[1].event_type);
        assert!(reports[1].data.is_empty());
        assert_eq!(None, reports[1].rssi);
    }

    #[test]
    fn number_of_completed_packets() {
        let parameter = [0x02, 0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x04, 0x00];

        let entries = NumberOfCompletedPacketsData::try_from_parameter(&parameter).unwrap();

        assert_eq!(1, entries[0].connection_handle.get_raw_handle());
        assert_eq!(2, entries[1].connection_handle.get_raw_handle());
        assert_eq!(3, entries[0].completed_packets);
        assert_eq!(4, entries[1].completed_packets);
    }
}
