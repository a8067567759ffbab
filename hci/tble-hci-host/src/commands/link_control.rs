//! Link Control Commands

/// Disconnect a remote device
pub mod disconnect {
    use crate::commands::{expect_status, CommandParameter};
    use crate::link::LinkEffect;
    use crate::{Host, SendCommandError};
    use tble_hci_interface::correlator::{CommandError, CommandResponse};
    use tble_hci_util::errors::Error;
    use tble_hci_util::opcodes::{HciCommand, LinkControl};
    use tble_hci_util::ConnectionHandle;

    const COMMAND: HciCommand = HciCommand::LinkControl(LinkControl::Disconnect);

    /// These are the error codes that are given as reasons for disconnecting
    ///
    /// These enumerations are the acceptable error codes to be used as reasons for
    /// triggering the disconnect.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum DisconnectReason {
        AuthenticationFailure,
        RemoteUserTerminatedConnection,
        RemoteDeviceTerminatedConnectionDueToLowResources,
        RemoteDeviceTerminatedConnectionDueToPowerOff,
        UnsupportedRemoteFeature,
        PairingWithUnitKeyNotSupported,
        UnacceptableConnectionParameters,
    }

    impl DisconnectReason {
        fn get_val(&self) -> u8 {
            match *self {
                DisconnectReason::AuthenticationFailure => 0x05,
                DisconnectReason::RemoteUserTerminatedConnection => 0x13,
                DisconnectReason::RemoteDeviceTerminatedConnectionDueToLowResources => 0x14,
                DisconnectReason::RemoteDeviceTerminatedConnectionDueToPowerOff => 0x15,
                DisconnectReason::UnsupportedRemoteFeature => 0x1A,
                DisconnectReason::PairingWithUnitKeyNotSupported => 0x29,
                DisconnectReason::UnacceptableConnectionParameters => 0x3B,
            }
        }
    }

    impl From<DisconnectReason> for Error {
        fn from(reason: DisconnectReason) -> Self {
            Error::from(reason.get_val())
        }
    }

    impl Default for DisconnectReason {
        fn default() -> Self {
            DisconnectReason::RemoteUserTerminatedConnection
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DisconnectParameters {
        pub connection_handle: ConnectionHandle,
        pub disconnect_reason: DisconnectReason,
    }

    impl CommandParameter for DisconnectParameters {
        type Return = ();

        fn get_command(&self) -> HciCommand {
            COMMAND
        }

        fn get_parameter(&self) -> Vec<u8> {
            let [b0, b1] = self.connection_handle.get_raw_handle().to_le_bytes();

            vec![b0, b1, self.disconnect_reason.get_val()]
        }

        fn link_effect(&self) -> LinkEffect {
            LinkEffect::Disconnect(self.connection_handle)
        }

        fn try_from_response(response: CommandResponse) -> Result<(), CommandError> {
            expect_status(response)
        }
    }

    /// Disconnect the device
    ///
    /// The returned future completes when the controller responds with a Command Status event.
    /// This does not mean the remote device is disconnected, the disconnection is reported by a
    /// [`HostEvent::Disconnected`](crate::HostEvent::Disconnected).
    pub async fn send(host: &Host, parameter: DisconnectParameters) -> Result<(), SendCommandError> {
        host.send_command(parameter).await
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn parameter_layout() {
            let parameter = DisconnectParameters {
                connection_handle: ConnectionHandle::try_from(0x0123).unwrap(),
                disconnect_reason: DisconnectReason::default(),
            };

            assert_eq!(vec![0x23, 0x01, 0x13], parameter.get_parameter());

            assert_eq!(Error::RemoteUserTerminatedConnection, Error::from(parameter.disconnect_reason));
        }
    }
}
