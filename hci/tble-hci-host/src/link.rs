//! The link layer state machines of the host
//!
//! The host keeps track of the state of the advertiser, the scanner, the initiator, and every
//! connection. These states are only ever changed by something the controller confirmed, either
//! the successful response of a command or an event. Submitting a command never changes a state.
//!
//! ```text
//! advertiser:  Idle -> Configured -> Advertising -> Idle
//! scanner:     Idle -> Configured -> Scanning    -> Idle
//! initiator:   Idle -> Initiating -> Idle
//! connection:  Connected -> Disconnecting -> (closed)
//! ```
//!
//! An event that does not fit the current state is reported as a [`Diagnostic`] and otherwise
//! ignored.

use crate::stream::{Diagnostic, HostEvent};
use std::collections::BTreeMap;
use std::fmt;
use tble_hci_interface::correlator::CommandResponse;
use tble_hci_util::errors::Error;
use tble_hci_util::events::parameters::{
    DisconnectionCompleteData, LeAddressType, LeAdvertisingReportData, LeConnectionCompleteData, LeConnectionRole,
    LeConnectionUpdateCompleteData,
};
use tble_hci_util::events::{Events, LeMeta};
use tble_hci_util::{BluetoothDeviceAddress, ConnectionHandle};

/// The state of a role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LinkRole {
    Idle,
    /// The parameters of the role were set
    Configured,
    Advertising,
    Scanning,
    Initiating,
    Connected,
    Disconnecting,
}

impl fmt::Display for LinkRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LinkRole::Idle => f.write_str("idle"),
            LinkRole::Configured => f.write_str("configured"),
            LinkRole::Advertising => f.write_str("advertising"),
            LinkRole::Scanning => f.write_str("scanning"),
            LinkRole::Initiating => f.write_str("initiating"),
            LinkRole::Connected => f.write_str("connected"),
            LinkRole::Disconnecting => f.write_str("disconnecting"),
        }
    }
}

/// What a successful command does to the link states
///
/// Every command submitted to the controller is tagged with its effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEffect {
    None,
    Reset,
    AdvertisingParameters,
    AdvertisingEnable(bool),
    ScanParameters,
    ScanEnable(bool),
    CreateConnection,
    CreateConnectionCancel,
    Disconnect(ConnectionHandle),
}

/// Information on a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub handle: ConnectionHandle,
    pub role: LeConnectionRole,
    pub peer_address_type: LeAddressType,
    pub peer_address: BluetoothDeviceAddress,
    /// The connection interval, in units of 1.25 milliseconds
    pub connection_interval: u16,
    pub peripheral_latency: u16,
    /// The supervision timeout, in units of 10 milliseconds
    pub supervision_timeout: u16,
}

impl From<&LeConnectionCompleteData> for ConnectionInfo {
    fn from(data: &LeConnectionCompleteData) -> Self {
        ConnectionInfo {
            handle: data.connection_handle,
            role: data.role,
            peer_address_type: data.peer_address_type,
            peer_address: data.peer_address,
            connection_interval: data.connection_interval,
            peripheral_latency: data.peripheral_latency,
            supervision_timeout: data.supervision_timeout,
        }
    }
}

struct ConnectionState {
    info: ConnectionInfo,
    role: LinkRole,
}

/// The link states of the host
pub struct LinkStates {
    advertiser: LinkRole,
    scanner: LinkRole,
    initiator: LinkRole,
    /// Set when *LE Create Connection Cancel* succeeded, the controller follows with a failed
    /// connection complete event
    cancelled_connection: bool,
    connections: BTreeMap<ConnectionHandle, ConnectionState>,
}

impl Default for LinkStates {
    fn default() -> Self {
        LinkStates {
            advertiser: LinkRole::Idle,
            scanner: LinkRole::Idle,
            initiator: LinkRole::Idle,
            cancelled_connection: false,
            connections: BTreeMap::new(),
        }
    }
}

impl LinkStates {
    pub fn new() -> Self {
        LinkStates::default()
    }

    pub fn advertiser(&self) -> LinkRole {
        self.advertiser
    }

    pub fn scanner(&self) -> LinkRole {
        self.scanner
    }

    pub fn initiator(&self) -> LinkRole {
        self.initiator
    }

    /// Get the state of a connection
    ///
    /// `None` is returned if there is no connection with `handle`.
    pub fn connection(&self, handle: ConnectionHandle) -> Option<LinkRole> {
        self.connections.get(&handle).map(|c| c.role)
    }

    /// Get the information on a connection
    pub fn connection_info(&self, handle: ConnectionHandle) -> Option<&ConnectionInfo> {
        self.connections.get(&handle).map(|c| &c.info)
    }

    /// Iterate over the handles of the open connections
    pub fn handles(&self) -> impl Iterator<Item = ConnectionHandle> + '_ {
        self.connections.keys().copied()
    }

    fn set_advertiser(&mut self, role: LinkRole, events: &mut Vec<HostEvent>) {
        if self.advertiser != role {
            log::info!("(HCI) advertiser {} -> {}", self.advertiser, role);

            self.advertiser = role;

            events.push(HostEvent::AdvertisingStateChanged(role));
        }
    }

    fn set_scanner(&mut self, role: LinkRole, events: &mut Vec<HostEvent>) {
        if self.scanner != role {
            log::info!("(HCI) scanner {} -> {}", self.scanner, role);

            self.scanner = role;

            events.push(HostEvent::ScanStateChanged(role));
        }
    }

    fn set_initiator(&mut self, role: LinkRole, events: &mut Vec<HostEvent>) {
        if self.initiator != role {
            log::info!("(HCI) initiator {} -> {}", self.initiator, role);

            self.initiator = role;

            events.push(HostEvent::InitiatorStateChanged(role));
        }
    }

    /// Apply the effect of a command that the controller responded to
    ///
    /// Nothing is changed unless the status of the response is success.
    pub fn on_command_response(&mut self, effect: LinkEffect, response: &CommandResponse) -> Vec<HostEvent> {
        let mut events = Vec::new();

        if !response.get_status().is_ok() {
            return events;
        }

        match effect {
            LinkEffect::None => (),
            LinkEffect::Reset => {
                self.reset(&mut events);
            }
            LinkEffect::AdvertisingParameters => {
                if self.advertiser == LinkRole::Idle {
                    self.set_advertiser(LinkRole::Configured, &mut events)
                }
            }
            LinkEffect::AdvertisingEnable(true) => self.set_advertiser(LinkRole::Advertising, &mut events),
            LinkEffect::AdvertisingEnable(false) => {
                if self.advertiser == LinkRole::Advertising {
                    self.set_advertiser(LinkRole::Idle, &mut events)
                }
            }
            LinkEffect::ScanParameters => {
                if self.scanner == LinkRole::Idle {
                    self.set_scanner(LinkRole::Configured, &mut events)
                }
            }
            LinkEffect::ScanEnable(true) => self.set_scanner(LinkRole::Scanning, &mut events),
            LinkEffect::ScanEnable(false) => {
                if self.scanner == LinkRole::Scanning {
                    self.set_scanner(LinkRole::Idle, &mut events)
                }
            }
            LinkEffect::CreateConnection => {
                // a new connection attempt supersedes a cancelled one
                self.cancelled_connection = false;

                self.set_initiator(LinkRole::Initiating, &mut events)
            }
            LinkEffect::CreateConnectionCancel => {
                if self.initiator == LinkRole::Initiating {
                    self.cancelled_connection = true;

                    self.set_initiator(LinkRole::Idle, &mut events)
                }
            }
            LinkEffect::Disconnect(handle) => match self.connections.get_mut(&handle) {
                Some(connection) if connection.role == LinkRole::Connected => {
                    log::info!("(HCI) disconnecting connection {}", handle);

                    connection.role = LinkRole::Disconnecting;
                }
                _ => log::warn!("(HCI) disconnect accepted for connection {} that is not connected", handle),
            },
        }

        events
    }

    /// Process a LE Connection Complete event
    pub fn on_connection_complete(&mut self, data: &LeConnectionCompleteData) -> Vec<HostEvent> {
        const EVENT: Events = Events::LeMeta(LeMeta::ConnectionComplete);

        let mut events = Vec::new();

        let handle = data.connection_handle;

        if !data.status.is_ok() {
            if self.cancelled_connection && data.status == Error::UnknownConnectionIdentifier {
                log::debug!("(HCI) connection complete of the cancelled connection");

                self.cancelled_connection = false;
            } else if self.initiator == LinkRole::Initiating {
                log::info!("(HCI) connection failed, {}", data.status);

                self.set_initiator(LinkRole::Idle, &mut events);
            } else if self.advertiser == LinkRole::Advertising {
                // directed advertising ends with a failed connection
                log::info!("(HCI) advertising ended without a connection, {}", data.status);

                self.set_advertiser(LinkRole::Idle, &mut events);
            } else {
                self.unexpected(Diagnostic::unexpected(EVENT), &mut events);
            }

            return events;
        }

        if self.connections.contains_key(&handle) {
            self.unexpected(Diagnostic::unexpected_for(EVENT, handle), &mut events);

            return events;
        }

        match data.role {
            LeConnectionRole::Central if self.initiator == LinkRole::Initiating => {
                self.set_initiator(LinkRole::Idle, &mut events)
            }
            LeConnectionRole::Peripheral if self.advertiser == LinkRole::Advertising => {
                self.set_advertiser(LinkRole::Idle, &mut events)
            }
            _ => {
                self.unexpected(Diagnostic::unexpected_for(EVENT, handle), &mut events);

                return events;
            }
        }

        let info = ConnectionInfo::from(data);

        log::info!("(HCI) connected to {} with handle {}", info.peer_address, handle);

        self.connections.insert(
            handle,
            ConnectionState {
                info: info.clone(),
                role: LinkRole::Connected,
            },
        );

        events.push(HostEvent::Connected(info));

        events
    }

    /// Process a Disconnection Complete event
    pub fn on_disconnection_complete(&mut self, data: &DisconnectionCompleteData) -> Vec<HostEvent> {
        let mut events = Vec::new();

        let handle = data.connection_handle;

        let Some(connection) = self.connections.get_mut(&handle) else {
            self.unexpected(
                Diagnostic::unexpected_for(Events::DisconnectionComplete, handle),
                &mut events,
            );

            return events;
        };

        if !data.status.is_ok() {
            log::warn!("(HCI) disconnection of {} failed, {}", handle, data.status);

            connection.role = LinkRole::Connected;

            return events;
        }

        self.connections.remove(&handle);

        log::info!("(HCI) disconnected {}, {}", handle, data.reason);

        events.push(HostEvent::Disconnected {
            handle,
            reason: data.reason,
        });

        events
    }

    /// Process a LE Connection Update Complete event
    pub fn on_connection_update(&mut self, data: &LeConnectionUpdateCompleteData) -> Vec<HostEvent> {
        let mut events = Vec::new();

        match self.connections.get_mut(&data.connection_handle) {
            Some(connection) => {
                if data.status.is_ok() {
                    connection.info.connection_interval = data.connection_interval;
                    connection.info.peripheral_latency = data.peripheral_latency;
                    connection.info.supervision_timeout = data.supervision_timeout;
                }
            }
            None => self.unexpected(
                Diagnostic::unexpected_for(
                    Events::LeMeta(LeMeta::ConnectionUpdateComplete),
                    data.connection_handle,
                ),
                &mut events,
            ),
        }

        events
    }

    /// Process an advertising report
    pub fn on_advertising_report(&mut self, report: LeAdvertisingReportData) -> Vec<HostEvent> {
        let mut events = Vec::new();

        if self.scanner == LinkRole::Scanning {
            events.push(HostEvent::AdvertisingReport(report));
        } else {
            self.unexpected(
                Diagnostic::unexpected(Events::LeMeta(LeMeta::AdvertisingReport)),
                &mut events,
            );
        }

        events
    }

    /// Process a controller reset
    ///
    /// Every role is returned to idle and every connection is closed.
    pub fn on_controller_reset(&mut self) -> Vec<HostEvent> {
        let mut events = Vec::new();

        self.reset(&mut events);

        events
    }

    fn reset(&mut self, events: &mut Vec<HostEvent>) {
        self.set_advertiser(LinkRole::Idle, events);
        self.set_scanner(LinkRole::Idle, events);
        self.set_initiator(LinkRole::Idle, events);

        self.cancelled_connection = false;

        if !self.connections.is_empty() {
            log::info!("(HCI) closing {} connections for a controller reset", self.connections.len());

            self.connections.clear();
        }

        events.push(HostEvent::ControllerReset);
    }

    fn unexpected(&self, diagnostic: Diagnostic, events: &mut Vec<HostEvent>) {
        log::warn!("(HCI) {}, ignoring it", diagnostic);

        events.push(HostEvent::Diagnostic(diagnostic));
    }
}

impl fmt::Debug for LinkStates {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LinkStates")
            .field("advertiser", &self.advertiser)
            .field("scanner", &self.scanner)
            .field("initiator", &self.initiator)
            .field(
                "connections",
                &self.connections.iter().map(|(h, c)| (*h, c.role)).collect::<Vec<_>>(),
            )
            .finish()
    }
}
