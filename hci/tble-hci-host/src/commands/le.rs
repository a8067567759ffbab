//! LE Controller Commands
//!
//! These are the LE commands used for advertising, scanning, and creating connections. The
//! success of most of these commands changes one of the link states, see the module
//! [`link`](crate::link).

/// Set the LE event mask on the controller
///
/// The LE events are only sent to the host if the *LE Meta* event is also enabled by the command
/// [*Set Event Mask*](crate::commands::cb::set_event_mask).
pub mod set_event_mask {
    use crate::commands::{expect_complete, CommandParameter};
    use crate::{Host, SendCommandError};
    use tble_hci_interface::correlator::{CommandError, CommandResponse};
    use tble_hci_util::events::LeMeta;
    use tble_hci_util::opcodes::{HciCommand, LEController};

    const COMMAND: HciCommand = HciCommand::LEController(LEController::SetEventMask);

    /// The LE event mask
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LeEventMask(u64);

    impl LeEventMask {
        /// Create a `LeEventMask` that only enables the events within `events`
        pub fn new<'a, I>(events: I) -> Self
        where
            I: IntoIterator<Item = &'a LeMeta>,
        {
            LeEventMask(events.into_iter().fold(0, |mask, event| mask | event.get_mask_bit()))
        }

        pub fn get_raw_mask(&self) -> u64 {
            self.0
        }
    }

    impl Default for LeEventMask {
        fn default() -> Self {
            LeEventMask(0x1F)
        }
    }

    impl CommandParameter for LeEventMask {
        type Return = ();

        fn get_command(&self) -> HciCommand {
            COMMAND
        }

        fn get_parameter(&self) -> Vec<u8> {
            self.0.to_le_bytes().to_vec()
        }

        fn try_from_response(response: CommandResponse) -> Result<(), CommandError> {
            expect_complete(response).map(|_| ())
        }
    }

    /// Send the command
    pub async fn send<'a, I>(host: &Host, events: I) -> Result<(), SendCommandError>
    where
        I: IntoIterator<Item = &'a LeMeta>,
    {
        host.send_command(LeEventMask::new(events)).await
    }
}

/// Read the size of the LE ACL data buffers of the controller
pub mod read_buffer_size {
    use crate::commands::{expect_complete, return_u16, CommandParameter};
    use crate::{Host, SendCommandError};
    use tble_hci_interface::correlator::{CommandError, CommandResponse};
    use tble_hci_util::opcodes::{HciCommand, LEController};

    const COMMAND: HciCommand = HciCommand::LEController(LEController::ReadBufferSize);

    /// Buffer size information
    ///
    /// This is the information about a specific buffer in the Controller. The field `len` is the
    /// maximum size of a HCI packet's payload that can be stored in the buffer, and field `cnt` is
    /// the number of HCI packets that can be stored within the buffer.
    ///
    /// A `len` of zero means the controller does not have separate LE buffers, and the buffers
    /// for ACL data of BR/EDR are shared with LE.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BufferSize {
        pub len: u16,
        pub cnt: u8,
    }

    #[derive(Debug, Clone, Copy, Default)]
    pub struct Parameter;

    impl CommandParameter for Parameter {
        type Return = BufferSize;

        fn get_command(&self) -> HciCommand {
            COMMAND
        }

        fn get_parameter(&self) -> Vec<u8> {
            Vec::new()
        }

        fn try_from_response(response: CommandResponse) -> Result<BufferSize, CommandError> {
            let parameter = expect_complete(response)?;

            let len = return_u16(&parameter, 0)?;

            let cnt = *parameter.get(2).ok_or(CommandError::Malformed)?;

            Ok(BufferSize { len, cnt })
        }
    }

    /// Send the command
    pub async fn send(host: &Host) -> Result<BufferSize, SendCommandError> {
        host.send_command(Parameter).await
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn buffer_size_return() {
            let response = CommandResponse::Complete {
                opcode: COMMAND.into_opcode(),
                return_parameter: vec![0x00, 0xFB, 0x00, 0x08],
            };

            assert_eq!(
                Ok(BufferSize { len: 251, cnt: 8 }),
                Parameter::try_from_response(response)
            );
        }
    }
}

/// Set the parameters used for advertising
///
/// A success moves the advertiser from idle to configured. This command is disallowed by the
/// controller while advertising is enabled.
pub mod set_advertising_parameters {
    use crate::commands::{expect_complete, CommandParameter};
    use crate::link::LinkEffect;
    use crate::{Host, SendCommandError};
    use tble_hci_interface::correlator::{CommandError, CommandResponse};
    use tble_hci_util::le::{
        AdvertisingChannelMap, AdvertisingFilterPolicy, AdvertisingInterval, AdvertisingType, OwnAddressType,
        PeerAddressType,
    };
    use tble_hci_util::opcodes::{HciCommand, LEController};
    use tble_hci_util::BluetoothDeviceAddress;

    const COMMAND: HciCommand = HciCommand::LEController(LEController::SetAdvertisingParameters);

    /// The advertising parameters
    ///
    /// The peer address fields are only used for directed advertising.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct AdvertisingParameters {
        pub minimum_advertising_interval: AdvertisingInterval,
        pub maximum_advertising_interval: AdvertisingInterval,
        pub advertising_type: AdvertisingType,
        pub own_address_type: OwnAddressType,
        pub peer_address_type: PeerAddressType,
        pub peer_address: BluetoothDeviceAddress,
        pub advertising_channel_map: AdvertisingChannelMap,
        pub advertising_filter_policy: AdvertisingFilterPolicy,
    }

    impl CommandParameter for AdvertisingParameters {
        type Return = ();

        fn get_command(&self) -> HciCommand {
            COMMAND
        }

        fn get_parameter(&self) -> Vec<u8> {
            let mut parameter = Vec::with_capacity(15);

            parameter.extend_from_slice(&self.minimum_advertising_interval.get_raw_val().to_le_bytes());

            parameter.extend_from_slice(&self.maximum_advertising_interval.get_raw_val().to_le_bytes());

            parameter.push(self.advertising_type.get_raw_val());

            parameter.push(self.own_address_type.get_raw_val());

            parameter.push(self.peer_address_type.get_raw_val());

            parameter.extend_from_slice(self.peer_address.as_ref());

            parameter.push(self.advertising_channel_map.get_raw_val());

            parameter.push(self.advertising_filter_policy.get_raw_val());

            parameter
        }

        fn link_effect(&self) -> LinkEffect {
            LinkEffect::AdvertisingParameters
        }

        fn try_from_response(response: CommandResponse) -> Result<(), CommandError> {
            expect_complete(response).map(|_| ())
        }
    }

    /// Send the command
    pub async fn send(host: &Host, parameters: AdvertisingParameters) -> Result<(), SendCommandError> {
        host.send_command(parameters).await
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn parameter_layout() {
            let parameters = AdvertisingParameters {
                minimum_advertising_interval: AdvertisingInterval::try_from_raw(0x0020).unwrap(),
                maximum_advertising_interval: AdvertisingInterval::try_from_raw(0x0030).unwrap(),
                advertising_type: AdvertisingType::NonConnectableUndirected,
                own_address_type: OwnAddressType::RandomDeviceAddress,
                ..Default::default()
            };

            assert_eq!(
                vec![0x20, 0x00, 0x30, 0x00, 0x03, 0x01, 0x00, 0, 0, 0, 0, 0, 0, 0x07, 0x00],
                parameters.get_parameter()
            );
        }
    }
}

/// Set the data within advertising PDUs
pub mod set_advertising_data {
    use crate::commands::{expect_complete, CommandParameter};
    use crate::{Host, SendCommandError};
    use tble_hci_interface::correlator::{CommandError, CommandResponse};
    use tble_hci_util::le::AdvertisingData;
    use tble_hci_util::opcodes::{HciCommand, LEController};

    const COMMAND: HciCommand = HciCommand::LEController(LEController::SetAdvertisingData);

    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct Parameter(pub AdvertisingData);

    impl CommandParameter for Parameter {
        type Return = ();

        fn get_command(&self) -> HciCommand {
            COMMAND
        }

        fn get_parameter(&self) -> Vec<u8> {
            self.0.to_parameter().to_vec()
        }

        fn try_from_response(response: CommandResponse) -> Result<(), CommandError> {
            expect_complete(response).map(|_| ())
        }
    }

    /// Send the command
    pub async fn send(host: &Host, data: AdvertisingData) -> Result<(), SendCommandError> {
        host.send_command(Parameter(data)).await
    }
}

/// Set the data sent in response to a scan request
pub mod set_scan_response_data {
    use crate::commands::{expect_complete, CommandParameter};
    use crate::{Host, SendCommandError};
    use tble_hci_interface::correlator::{CommandError, CommandResponse};
    use tble_hci_util::le::AdvertisingData;
    use tble_hci_util::opcodes::{HciCommand, LEController};

    const COMMAND: HciCommand = HciCommand::LEController(LEController::SetScanResponseData);

    #[derive(Debug, Clone, Default, PartialEq, Eq)]
    pub struct Parameter(pub AdvertisingData);

    impl CommandParameter for Parameter {
        type Return = ();

        fn get_command(&self) -> HciCommand {
            COMMAND
        }

        fn get_parameter(&self) -> Vec<u8> {
            self.0.to_parameter().to_vec()
        }

        fn try_from_response(response: CommandResponse) -> Result<(), CommandError> {
            expect_complete(response).map(|_| ())
        }
    }

    /// Send the command
    pub async fn send(host: &Host, data: AdvertisingData) -> Result<(), SendCommandError> {
        host.send_command(Parameter(data)).await
    }
}

/// Enable or disable advertising
pub mod set_advertising_enable {
    use crate::commands::{expect_complete, CommandParameter};
    use crate::link::LinkEffect;
    use crate::{Host, SendCommandError};
    use tble_hci_interface::correlator::{CommandError, CommandResponse};
    use tble_hci_util::opcodes::{HciCommand, LEController};

    const COMMAND: HciCommand = HciCommand::LEController(LEController::SetAdvertisingEnable);

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Parameter {
        pub enable: bool,
    }

    impl CommandParameter for Parameter {
        type Return = ();

        fn get_command(&self) -> HciCommand {
            COMMAND
        }

        fn get_parameter(&self) -> Vec<u8> {
            vec![self.enable as u8]
        }

        fn link_effect(&self) -> LinkEffect {
            LinkEffect::AdvertisingEnable(self.enable)
        }

        fn try_from_response(response: CommandResponse) -> Result<(), CommandError> {
            expect_complete(response).map(|_| ())
        }
    }

    /// Send the command
    pub async fn send(host: &Host, enable: bool) -> Result<(), SendCommandError> {
        host.send_command(Parameter { enable }).await
    }
}

/// Set the parameters used for scanning
pub mod set_scan_parameters {
    use crate::commands::{expect_complete, CommandParameter};
    use crate::link::LinkEffect;
    use crate::{Host, SendCommandError};
    use tble_hci_interface::correlator::{CommandError, CommandResponse};
    use tble_hci_util::le::{OwnAddressType, ScanType, ScanningFilterPolicy, ScanningInterval, ScanningWindow};
    use tble_hci_util::opcodes::{HciCommand, LEController};

    const COMMAND: HciCommand = HciCommand::LEController(LEController::SetScanParameters);

    /// The scan parameters
    ///
    /// The scan window must not be larger than the scan interval, otherwise the controller
    /// rejects the command.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ScanningParameters {
        pub scan_type: ScanType,
        pub scan_interval: ScanningInterval,
        pub scan_window: ScanningWindow,
        pub own_address_type: OwnAddressType,
        pub scanning_filter_policy: ScanningFilterPolicy,
    }

    impl CommandParameter for ScanningParameters {
        type Return = ();

        fn get_command(&self) -> HciCommand {
            COMMAND
        }

        fn get_parameter(&self) -> Vec<u8> {
            let mut parameter = Vec::with_capacity(7);

            parameter.push(self.scan_type.get_raw_val());

            parameter.extend_from_slice(&self.scan_interval.get_raw_val().to_le_bytes());

            parameter.extend_from_slice(&self.scan_window.get_raw_val().to_le_bytes());

            parameter.push(self.own_address_type.get_raw_val());

            parameter.push(self.scanning_filter_policy.get_raw_val());

            parameter
        }

        fn link_effect(&self) -> LinkEffect {
            LinkEffect::ScanParameters
        }

        fn try_from_response(response: CommandResponse) -> Result<(), CommandError> {
            expect_complete(response).map(|_| ())
        }
    }

    /// Send the command
    pub async fn send(host: &Host, parameters: ScanningParameters) -> Result<(), SendCommandError> {
        host.send_command(parameters).await
    }
}

/// Enable or disable scanning
pub mod set_scan_enable {
    use crate::commands::{expect_complete, CommandParameter};
    use crate::link::LinkEffect;
    use crate::{Host, SendCommandError};
    use tble_hci_interface::correlator::{CommandError, CommandResponse};
    use tble_hci_util::opcodes::{HciCommand, LEController};

    const COMMAND: HciCommand = HciCommand::LEController(LEController::SetScanEnable);

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Parameter {
        pub enable: bool,
        /// Have the controller filter duplicate advertising reports
        pub filter_duplicates: bool,
    }

    impl CommandParameter for Parameter {
        type Return = ();

        fn get_command(&self) -> HciCommand {
            COMMAND
        }

        fn get_parameter(&self) -> Vec<u8> {
            vec![self.enable as u8, self.filter_duplicates as u8]
        }

        fn link_effect(&self) -> LinkEffect {
            LinkEffect::ScanEnable(self.enable)
        }

        fn try_from_response(response: CommandResponse) -> Result<(), CommandError> {
            expect_complete(response).map(|_| ())
        }
    }

    /// Send the command
    pub async fn send(host: &Host, enable: bool, filter_duplicates: bool) -> Result<(), SendCommandError> {
        host.send_command(Parameter {
            enable,
            filter_duplicates,
        })
        .await
    }
}

/// Create a connection to an advertising device
///
/// The controller responds with a Command Status event. A connection is not established until
/// the controller sends the LE Connection Complete event, this is reported by a
/// [`HostEvent::Connected`](crate::HostEvent::Connected).
pub mod create_connection {
    use crate::commands::{expect_status, CommandParameter};
    use crate::link::LinkEffect;
    use crate::{Host, SendCommandError};
    use tble_hci_interface::correlator::{CommandError, CommandResponse};
    use tble_hci_util::le::{
        ConnectionInterval, OwnAddressType, PeerAddressType, ScanningInterval, ScanningWindow, SupervisionTimeout,
    };
    use tble_hci_util::opcodes::{HciCommand, LEController};
    use tble_hci_util::BluetoothDeviceAddress;

    const COMMAND: HciCommand = HciCommand::LEController(LEController::CreateConnection);

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub enum InitiatorFilterPolicy {
        #[default]
        DoNotUseFilterList,
        UseFilterList,
    }

    impl InitiatorFilterPolicy {
        fn val(&self) -> u8 {
            match *self {
                InitiatorFilterPolicy::DoNotUseFilterList => 0x00,
                InitiatorFilterPolicy::UseFilterList => 0x01,
            }
        }
    }

    /// The parameters for creating a connection
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct ConnectionParameters {
        pub scan_interval: ScanningInterval,
        pub scan_window: ScanningWindow,
        pub initiator_filter_policy: InitiatorFilterPolicy,
        pub peer_address_type: PeerAddressType,
        pub peer_address: BluetoothDeviceAddress,
        pub own_address_type: OwnAddressType,
        pub minimum_connection_interval: ConnectionInterval,
        pub maximum_connection_interval: ConnectionInterval,
        pub max_latency: u16,
        pub supervision_timeout: SupervisionTimeout,
        pub minimum_ce_length: u16,
        pub maximum_ce_length: u16,
    }

    impl ConnectionParameters {
        /// Command parameters for connecting to a specific device
        pub fn new(peer_address_type: PeerAddressType, peer_address: BluetoothDeviceAddress) -> Self {
            ConnectionParameters {
                peer_address_type,
                peer_address,
                ..Default::default()
            }
        }
    }

    impl CommandParameter for ConnectionParameters {
        type Return = ();

        fn get_command(&self) -> HciCommand {
            COMMAND
        }

        fn get_parameter(&self) -> Vec<u8> {
            let mut parameter = vec![0u8; 25];

            parameter[0..2].copy_from_slice(&self.scan_interval.get_raw_val().to_le_bytes());

            parameter[2..4].copy_from_slice(&self.scan_window.get_raw_val().to_le_bytes());

            parameter[4] = self.initiator_filter_policy.val();

            parameter[5] = self.peer_address_type.get_raw_val();

            parameter[6..12].copy_from_slice(self.peer_address.as_ref());

            parameter[12] = self.own_address_type.get_raw_val();

            parameter[13..15].copy_from_slice(&self.minimum_connection_interval.get_raw_val().to_le_bytes());

            parameter[15..17].copy_from_slice(&self.maximum_connection_interval.get_raw_val().to_le_bytes());

            parameter[17..19].copy_from_slice(&self.max_latency.to_le_bytes());

            parameter[19..21].copy_from_slice(&self.supervision_timeout.get_raw_val().to_le_bytes());

            parameter[21..23].copy_from_slice(&self.minimum_ce_length.to_le_bytes());

            parameter[23..25].copy_from_slice(&self.maximum_ce_length.to_le_bytes());

            parameter
        }

        fn link_effect(&self) -> LinkEffect {
            LinkEffect::CreateConnection
        }

        fn try_from_response(response: CommandResponse) -> Result<(), CommandError> {
            expect_status(response)
        }
    }

    /// Send the LE Create Connection command
    ///
    /// The returned future completes when the controller sends back the Command Status event.
    pub async fn send(host: &Host, parameters: ConnectionParameters) -> Result<(), SendCommandError> {
        host.send_command(parameters).await
    }

}

/// Cancel the creation of a connection
///
/// A success moves the initiator back to idle. The controller then sends a LE Connection Complete
/// event with the status *Unknown Connection Identifier*, this event is absorbed by the host.
pub mod create_connection_cancel {
    use crate::commands::{expect_complete, CommandParameter};
    use crate::link::LinkEffect;
    use crate::{Host, SendCommandError};
    use tble_hci_interface::correlator::{CommandError, CommandResponse};
    use tble_hci_util::opcodes::{HciCommand, LEController};

    const COMMAND: HciCommand = HciCommand::LEController(LEController::CreateConnectionCancel);

    #[derive(Debug, Clone, Copy, Default)]
    pub struct Parameter;

    impl CommandParameter for Parameter {
        type Return = ();

        fn get_command(&self) -> HciCommand {
            COMMAND
        }

        fn get_parameter(&self) -> Vec<u8> {
            Vec::new()
        }

        fn link_effect(&self) -> LinkEffect {
            LinkEffect::CreateConnectionCancel
        }

        fn try_from_response(response: CommandResponse) -> Result<(), CommandError> {
            expect_complete(response).map(|_| ())
        }
    }

    /// Send the command
    pub async fn send(host: &Host) -> Result<(), SendCommandError> {
        host.send_command(Parameter).await
    }
}
