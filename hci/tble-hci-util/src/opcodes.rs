//! HCI Command Opcodes
//!
//! Opcodes are composed of a group identifier (the OGF) and an individual command identifier
//! specific to the group (the OCF). The OCF is the lower 10 bits of the opcode and the OGF is the
//! upper six bits.
//!
//! Instead of using group and command codes to create an opcode, the enum `HciCommand` should be
//! used to create an opcode. `HciCommand` is an enumeration of all the HCI commands known to this
//! library, an opcode can be acquired by the method `into_opcode`.
//!
//! ```
//! # use tble_hci_util::opcodes::{HciCommand, ControllerAndBaseband};
//! assert_eq!(0xC03, HciCommand::ControllerAndBaseband(ControllerAndBaseband::Reset).into_opcode());
//! ```

use core::fmt;

/// Enumerations of the various HCI command opcodes.
///
/// HciCommand consists of the HCI command groups containing the HCI commands within the group.
/// Vendor specific commands are not enumerated, any OCF within the vendor specific group is
/// accepted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum HciCommand {
    LinkControl(LinkControl),
    LinkPolicy(LinkPolicy),
    ControllerAndBaseband(ControllerAndBaseband),
    InformationParameters(InformationParameters),
    StatusParameters(StatusParameters),
    Testing(Testing),
    LEController(LEController),
    VendorSpecific(u16),
}

impl HciCommand {
    /// Get the opcode for this command
    pub const fn into_opcode(self) -> u16 {
        self.into_opcode_pair().into_opcode()
    }

    /// Get the `OpCodePair` for this command
    pub const fn into_opcode_pair(self) -> OpCodePair {
        match self {
            HciCommand::LinkControl(ocf) => ocf.into_opcode_pair(),
            HciCommand::LinkPolicy(ocf) => ocf.into_opcode_pair(),
            HciCommand::ControllerAndBaseband(ocf) => ocf.into_opcode_pair(),
            HciCommand::InformationParameters(ocf) => ocf.into_opcode_pair(),
            HciCommand::StatusParameters(ocf) => ocf.into_opcode_pair(),
            HciCommand::Testing(ocf) => ocf.into_opcode_pair(),
            HciCommand::LEController(ocf) => ocf.into_opcode_pair(),
            HciCommand::VendorSpecific(ocf) => OpCodePair {
                ogf: VENDOR_SPECIFIC_OGF,
                ocf: ocf & 0x3FF,
            },
        }
    }

    /// Try to convert a raw opcode into a `HciCommand`
    pub fn try_from_opcode(opcode: u16) -> Result<Self, OpcodeError> {
        HciCommand::try_from(OpCodePair::from_opcode(opcode))
    }

    /// Check if this is one of the radio test commands
    ///
    /// The LE receiver/transmitter tests and the test end command can take considerably longer
    /// for a controller to complete than other commands.
    pub fn is_radio_test(&self) -> bool {
        matches!(
            self,
            HciCommand::LEController(LEController::ReceiverTest)
                | HciCommand::LEController(LEController::TransmitterTest)
                | HciCommand::LEController(LEController::TestEnd)
                | HciCommand::Testing(_)
        )
    }
}

impl fmt::Display for HciCommand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let pair = self.into_opcode_pair();

        match self {
            HciCommand::LinkControl(c) => write!(f, "link control - {}", c)?,
            HciCommand::LinkPolicy(c) => write!(f, "link policy - {}", c)?,
            HciCommand::ControllerAndBaseband(c) => write!(f, "controller and baseband - {}", c)?,
            HciCommand::InformationParameters(c) => write!(f, "information parameters - {}", c)?,
            HciCommand::StatusParameters(c) => write!(f, "status parameters - {}", c)?,
            HciCommand::Testing(c) => write!(f, "testing - {}", c)?,
            HciCommand::LEController(c) => write!(f, "LE controller - {}", c)?,
            HciCommand::VendorSpecific(_) => f.write_str("vendor specific")?,
        }

        write!(f, " ({:#x}:{:#x})", pair.ogf, pair.ocf)
    }
}

/// An type for the pair of OGF (OpCode Group Field) and OCF (OpCode Command Field)
///
/// The main use for this is for converting from the `HciCommand` enumeration into the numerical
/// values to be passed over the interface to the controller.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct OpCodePair {
    pub ogf: u16,
    pub ocf: u16,
}

impl OpCodePair {
    /// Get the OpCode Group Field value
    pub fn get_ogf(&self) -> u16 {
        self.ogf
    }

    /// Get the OpCode Command Field value
    pub fn get_ocf(&self) -> u16 {
        self.ocf
    }

    /// Convert the OpCodePair into the opcode
    ///
    /// The returned value is in host byte order, it must be converted to little endian when it is
    /// placed within a command packet.
    pub const fn into_opcode(self) -> u16 {
        (self.ocf & 0x3FF) | (self.ogf << 10)
    }

    /// Convert an opcode (in host byte order) into an `OpCodePair`
    pub const fn from_opcode(opcode: u16) -> Self {
        OpCodePair {
            ogf: opcode >> 10,
            ocf: opcode & 0x3FF,
        }
    }
}

impl From<HciCommand> for OpCodePair {
    fn from(cmd: HciCommand) -> OpCodePair {
        cmd.into_opcode_pair()
    }
}

impl TryFrom<OpCodePair> for HciCommand {
    type Error = OpcodeError;

    fn try_from(pair: OpCodePair) -> Result<Self, Self::Error> {
        let ocf = pair.ocf;

        match pair.ogf {
            LinkControl::OGF => LinkControl::try_from_ocf(ocf).map(HciCommand::LinkControl),
            LinkPolicy::OGF => LinkPolicy::try_from_ocf(ocf).map(HciCommand::LinkPolicy),
            ControllerAndBaseband::OGF => {
                ControllerAndBaseband::try_from_ocf(ocf).map(HciCommand::ControllerAndBaseband)
            }
            InformationParameters::OGF => {
                InformationParameters::try_from_ocf(ocf).map(HciCommand::InformationParameters)
            }
            StatusParameters::OGF => StatusParameters::try_from_ocf(ocf).map(HciCommand::StatusParameters),
            Testing::OGF => Testing::try_from_ocf(ocf).map(HciCommand::Testing),
            LEController::OGF => LEController::try_from_ocf(ocf).map(HciCommand::LEController),
            VENDOR_SPECIFIC_OGF => Ok(HciCommand::VendorSpecific(ocf)),
            ogf => Err(OpcodeError::UnknownGroup(ogf)),
        }
    }
}

/// The group field of vendor specific commands
pub const VENDOR_SPECIFIC_OGF: u16 = 0x3F;

/// Error for an opcode that does not map to a command known to this library
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OpcodeError {
    UnknownGroup(u16),
    UnknownCommand { group: &'static str, ocf: u16 },
}

impl fmt::Display for OpcodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OpcodeError::UnknownGroup(ogf) => write!(f, "unknown OpCode Group Field value: {:#x}", ogf),
            OpcodeError::UnknownCommand { group, ocf } => {
                write!(f, "OpCode Group Field '{}' doesn't have the Op Code Field {:#x}", group, ocf)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for OpcodeError {}

/// Create an enumeration for a group of commands
///
/// This generates the enum, the conversions to and from the OCF, and the `Display`
/// implementation for each command group.
macro_rules! command_group {
    (
        $(#[$doc:meta])*
        $group:ident, $ogf:literal, $group_name:literal {
            $( $(#[$cmd_doc:meta])* $cmd:ident = $ocf:literal, $name:literal; )*
        }
    ) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
        #[non_exhaustive]
        pub enum $group {
            $( $(#[$cmd_doc])* $cmd, )*
        }

        impl $group {
            pub const OGF: u16 = $ogf;

            const fn into_opcode_pair(self) -> OpCodePair {
                OpCodePair {
                    ogf: $group::OGF,
                    ocf: match self {
                        $( $group::$cmd => $ocf, )*
                    },
                }
            }

            fn try_from_ocf(ocf: u16) -> Result<Self, OpcodeError> {
                match ocf {
                    $( $ocf => Ok($group::$cmd), )*
                    _ => Err(OpcodeError::UnknownCommand { group: $group_name, ocf }),
                }
            }
        }

        impl fmt::Display for $group {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                match self {
                    $( $group::$cmd => f.write_str($name), )*
                }
            }
        }
    };
}

command_group! {
    /// Link control commands
    LinkControl, 0x01, "Link Control" {
        Inquiry = 0x01, "inquiry";
        InquiryCancel = 0x02, "inquiry cancel";
        PeriodicInquiryMode = 0x03, "periodic inquiry mode";
        ExitPeriodicInquiryMode = 0x04, "exit periodic inquiry mode";
        CreateConnection = 0x05, "create connection";
        Disconnect = 0x06, "disconnect";
        AddScoConnection = 0x07, "add SCO connection";
        AcceptConnectionRequest = 0x09, "accept connection request";
        RejectConnectionRequest = 0x0A, "reject connection request";
        LinkKeyRequestReply = 0x0B, "link key request reply";
        LinkKeyRequestNegativeReply = 0x0C, "link key request negative reply";
        PinCodeRequestReply = 0x0D, "PIN code request reply";
        PinCodeRequestNegativeReply = 0x0E, "PIN code request negative reply";
        ChangeConnectionPacketType = 0x0F, "change connection packet type";
        AuthenticationRequested = 0x11, "authentication requested";
        SetConnectionEncryption = 0x13, "set connection encryption";
        ChangeConnectionLinkKey = 0x15, "change connection link key";
        CentralLinkKey = 0x17, "central link key";
        RemoteNameRequest = 0x19, "remote name request";
        ReadRemoteSupportedFeatures = 0x1B, "read remote supported features";
        ReadRemoteVersionInformation = 0x1D, "read remote version information";
        ReadClockOffset = 0x1F, "read clock offset";
    }
}

command_group! {
    /// Link policy commands
    LinkPolicy, 0x02, "Link Policy" {
        HoldMode = 0x01, "hold mode";
        SniffMode = 0x03, "sniff mode";
        ExitSniffMode = 0x04, "exit sniff mode";
        ParkState = 0x05, "park state";
        ExitParkState = 0x06, "exit park state";
        QosSetup = 0x07, "QoS setup";
        RoleDiscovery = 0x09, "role discovery";
        SwitchRole = 0x0B, "switch role";
        ReadLinkPolicySettings = 0x0C, "read link policy settings";
    }
}

command_group! {
    /// Controller and baseband commands
    ControllerAndBaseband, 0x03, "Controller and Baseband" {
        SetEventMask = 0x01, "set event mask";
        Reset = 0x03, "reset";
        SetEventFilter = 0x05, "set event filter";
        Flush = 0x08, "flush";
        ReadPinType = 0x09, "read PIN type";
        WritePinType = 0x0A, "write PIN type";
        CreateNewUnitKey = 0x0B, "create new unit key";
        ReadStoredLinkKey = 0x0D, "read stored link key";
        WriteStoredLinkKey = 0x11, "write stored link key";
        DeleteStoredLinkKey = 0x12, "delete stored link key";
        WriteLocalName = 0x13, "write local name";
        ReadLocalName = 0x14, "read local name";
        ReadConnectionAcceptTimeout = 0x15, "read connection accept timeout";
        WriteConnectionAcceptTimeout = 0x16, "write connection accept timeout";
        ReadPageTimeout = 0x17, "read page timeout";
        WritePageTimeout = 0x18, "write page timeout";
        ReadScanEnable = 0x19, "read scan enable";
        WriteScanEnable = 0x1A, "write scan enable";
        ReadPageScanActivity = 0x1B, "read page scan activity";
        WritePageScanActivity = 0x1C, "write page scan activity";
        ReadInquiryScanActivity = 0x1D, "read inquiry scan activity";
        WriteInquiryScanActivity = 0x1E, "write inquiry scan activity";
        ReadAuthenticationEnable = 0x1F, "read authentication enable";
        WriteAuthenticationEnable = 0x20, "write authentication enable";
        ReadEncryptionMode = 0x21, "read encryption mode";
        WriteEncryptionMode = 0x22, "write encryption mode";
        ReadClassOfDevice = 0x23, "read class of device";
        WriteClassOfDevice = 0x24, "write class of device";
        ReadVoiceSetting = 0x25, "read voice setting";
        WriteVoiceSetting = 0x26, "write voice setting";
        ReadAutomaticFlushTimeout = 0x27, "read automatic flush timeout";
        WriteAutomaticFlushTimeout = 0x28, "write automatic flush timeout";
        ReadNumBroadcastRetransmissions = 0x29, "read num broadcast retransmissions";
        WriteNumBroadcastRetransmissions = 0x2A, "write num broadcast retransmissions";
        ReadHoldModeActivity = 0x2B, "read hold mode activity";
        WriteHoldModeActivity = 0x2C, "write hold mode activity";
        ReadTransmitPowerLevel = 0x2D, "read transmit power level";
        ReadSynchronousFlowControlEnable = 0x2E, "read synchronous flow control enable";
        WriteSynchronousFlowControlEnable = 0x2F, "write synchronous flow control enable";
        SetControllerToHostFlowControl = 0x31, "set controller to host flow control";
        HostBufferSize = 0x33, "host buffer size";
        HostNumberOfCompletedPackets = 0x35, "host number of completed packets";
        ReadLinkSupervisionTimeout = 0x36, "read link supervision timeout";
        WriteLinkSupervisionTimeout = 0x37, "write link supervision timeout";
        ReadNumberOfSupportedIac = 0x38, "read number of supported IAC";
        ReadCurrentIacLap = 0x39, "read current IAC LAP";
        WriteCurrentIacLap = 0x3A, "write current IAC LAP";
        ReadPageScanPeriodMode = 0x3B, "read page scan period mode";
        WritePageScanPeriodMode = 0x3C, "write page scan period mode";
        ReadPageScanMode = 0x3D, "read page scan mode";
        WritePageScanMode = 0x3E, "write page scan mode";
        SetEventMaskPage2 = 0x63, "set event mask page 2";
    }
}

command_group! {
    /// Information parameter commands
    InformationParameters, 0x04, "Information Parameters" {
        ReadLocalVersionInformation = 0x01, "read local version information";
        ReadLocalSupportedCommands = 0x02, "read local supported commands";
        ReadLocalSupportedFeatures = 0x03, "read local supported features";
        ReadBufferSize = 0x05, "read buffer size";
        #[allow(non_camel_case_types)]
        ReadBD_ADDR = 0x09, "read BD_ADDR";
    }
}

command_group! {
    /// Status parameter commands
    StatusParameters, 0x05, "Status Parameters" {
        ReadFailedContactCounter = 0x01, "read failed contact counter";
        ResetFailedContactCounter = 0x02, "reset failed contact counter";
        ReadLinkQuality = 0x03, "read link quality";
        ReadRSSI = 0x05, "read RSSI";
        ReadChannelMap = 0x06, "read channel map";
    }
}

command_group! {
    /// Testing commands
    Testing, 0x06, "Testing" {
        ReadLoopbackMode = 0x01, "read loopback mode";
        WriteLoopbackMode = 0x02, "write loopback mode";
        EnableDeviceUnderTestMode = 0x03, "enable device under test mode";
    }
}

command_group! {
    /// Bluetooth LE commands
    LEController, 0x08, "LE Controller" {
        SetEventMask = 0x01, "set event mask";
        ReadBufferSize = 0x02, "read buffer size";
        ReadLocalSupportedFeatures = 0x03, "read local supported features";
        SetRandomAddress = 0x05, "set random address";
        SetAdvertisingParameters = 0x06, "set advertising parameters";
        ReadAdvertisingChannelTxPower = 0x07, "read advertising channel tx power";
        SetAdvertisingData = 0x08, "set advertising data";
        SetScanResponseData = 0x09, "set scan response data";
        SetAdvertisingEnable = 0x0A, "set advertising enable";
        SetScanParameters = 0x0B, "set scan parameters";
        SetScanEnable = 0x0C, "set scan enable";
        CreateConnection = 0x0D, "create connection";
        CreateConnectionCancel = 0x0E, "create connection cancel";
        ReadFilterListSize = 0x0F, "read filter list size";
        ClearFilterList = 0x10, "clear filter list";
        AddDeviceToFilterList = 0x11, "add device to filter list";
        RemoveDeviceFromFilterList = 0x12, "remove device from filter list";
        ConnectionUpdate = 0x13, "connection update";
        SetHostChannelClassification = 0x14, "set host channel classification";
        ReadChannelMap = 0x15, "read channel map";
        ReadRemoteFeatures = 0x16, "read remote features";
        Encrypt = 0x17, "encrypt";
        Rand = 0x18, "rand";
        EnableEncryption = 0x19, "enable encryption";
        LongTermKeyRequestReply = 0x1A, "long term key request reply";
        LongTermKeyRequestNegativeReply = 0x1B, "long term key request negative reply";
        ReadSupportedStates = 0x1C, "read supported states";
        ReceiverTest = 0x1D, "receiver test";
        TransmitterTest = 0x1E, "transmitter test";
        TestEnd = 0x1F, "test end";
        RemoteConnectionParameterRequestReply = 0x20, "remote connection parameter request reply";
        RemoteConnectionParameterRequestNegativeReply = 0x21, "remote connection parameter request negative reply";
        SetDataLength = 0x22, "set data length";
        ReadSuggestedDefaultDataLength = 0x23, "read suggested default data length";
        WriteSuggestedDefaultDataLength = 0x24, "write suggested default data length";
        ReadLocalP256PublicKey = 0x25, "read local P-256 public key";
        GenerateDhKey = 0x26, "generate DH key";
        AddDeviceToResolvingList = 0x27, "add device to resolving list";
        RemoveDeviceFromResolvingList = 0x28, "remove device from resolving list";
        ClearResolvingList = 0x29, "clear resolving list";
        ReadResolvingListSize = 0x2A, "read resolving list size";
        ReadPeerResolvableAddress = 0x2B, "read peer resolvable address";
        ReadLocalResolvableAddress = 0x2C, "read local resolvable address";
        SetAddressResolutionEnable = 0x2D, "set address resolution enable";
        SetResolvablePrivateAddressTimeout = 0x2E, "set resolvable private address timeout";
        ReadMaximumDataLength = 0x2F, "read maximum data length";
    }
}
