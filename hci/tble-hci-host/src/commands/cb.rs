//! Controller and Baseband Commands

/// Reset the controller
///
/// A successful reset aborts every other pending command, returns the advertiser, scanner, and
/// initiator to idle, and closes every connection.
pub mod reset {
    use crate::commands::{expect_complete, CommandParameter};
    use crate::link::LinkEffect;
    use crate::{Host, SendCommandError};
    use tble_hci_interface::correlator::{CommandError, CommandResponse};
    use tble_hci_util::opcodes::{ControllerAndBaseband, HciCommand};

    const COMMAND: HciCommand = HciCommand::ControllerAndBaseband(ControllerAndBaseband::Reset);

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
            LinkEffect::Reset
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

/// Set the event mask on the controller
///
/// This command sends a mask to the Controller to enable the selected events. Afterward the
/// Controller will only send the selected events to the Host.
///
/// # LE Events
/// This command has a 'global' flag for enabling or disabling all LE events. Any time a
/// [`LeMeta`] is within the list of events to enable it will enable this flag. However, the
/// specific LE event contained within the `LeMeta` is not enabled by this function. To deliberately
/// enable a LE event the global flag must be set by this command and the individual mask for the
/// event must be set using the command [*LE Set Event Mask*].
///
/// # Events Never Masked
/// The events *Command Complete*, *Command Status*, and *Number of Completed Packets* cannot be
/// masked. They are ignored if they are within the list of events.
///
/// [`LeMeta`]: tble_hci_util::events::Events::LeMeta
/// [*LE Set Event Mask*]: crate::commands::le::set_event_mask
pub mod set_event_mask {
    use crate::commands::{expect_complete, CommandParameter};
    use crate::{Host, SendCommandError};
    use tble_hci_interface::correlator::{CommandError, CommandResponse};
    use tble_hci_util::events::Events;
    use tble_hci_util::opcodes::{ControllerAndBaseband, HciCommand};

    const COMMAND: HciCommand = HciCommand::ControllerAndBaseband(ControllerAndBaseband::SetEventMask);

    /// The mask set by the controller after it is reset
    pub const DEFAULT_MASK: u64 = 0x1FFF_FFFF_FFFF;

    /// Get the mask bit for an event
    ///
    /// # Note
    /// Zero is returned if an event is not maskable.
    pub(crate) fn event_to_mask_bit(event: &Events) -> u64 {
        match *event {
            Events::DisconnectionComplete => 1 << 4,
            Events::HardwareError => 1 << 15,
            Events::DataBufferOverflow => 1 << 25,
            Events::LeMeta(_) => 1 << 61,
            Events::CommandComplete | Events::CommandStatus | Events::NumberOfCompletedPackets => 0,
        }
    }

    /// The event mask
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EventMask(u64);

    impl EventMask {
        /// Create an `EventMask` that only enables the events within `events`
        pub fn new<'a, I>(events: I) -> Self
        where
            I: IntoIterator<Item = &'a Events>,
        {
            EventMask(events.into_iter().fold(0, |mask, event| mask | event_to_mask_bit(event)))
        }

        /// Create an `EventMask` with all events disabled
        pub fn disable_all() -> Self {
            EventMask(0)
        }

        pub fn get_raw_mask(&self) -> u64 {
            self.0
        }
    }

    impl Default for EventMask {
        fn default() -> Self {
            EventMask(DEFAULT_MASK)
        }
    }

    impl CommandParameter for EventMask {
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
        I: IntoIterator<Item = &'a Events>,
    {
        host.send_command(EventMask::new(events)).await
    }

}
