//! The driver task of the host
//!
//! The driver owns the transport to the controller. It is the only thing that reads from or
//! writes to the transport, and it is the only thing that processes what the controller sends.
//! The driver never waits on the application, everything is forwarded to the application through
//! channels that do not block.

use crate::link::LinkEffect;
use crate::stream::{Diagnostic, HostEvent};
use crate::{ConnectionEnds, Outbound, Shared};
use std::fmt;
use std::sync::Arc;
use tble_hci_interface::correlator::{CommandError, CommandResponse, Correlation, Correlator};
use tble_hci_interface::framing::Framed;
use tble_hci_interface::reassembler::Reassembler;
use tble_hci_interface::transport::{self, PacketReader, PacketWriter, Transport, TransportError};
use tble_hci_util::acl::HciAclData;
use tble_hci_util::codec::{CodecError, EventPacket, HciPacket, Malformed};
use tble_hci_util::events::parameters::{DisconnectionCompleteData, LeConnectionCompleteData};
use tble_hci_util::events::{Events, EventsData, LeMetaData};
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Error of the driver
///
/// The driver only exits with an error when the transport fails.
#[derive(Debug)]
pub enum DriverError {
    /// The controller closed the transport
    TransportClosed,
    /// An I/O error of the transport
    Io(std::io::Error),
}

impl DriverError {
    /// Try to log the error
    ///
    /// The error is returned if it is not something that happens during the normal operation of
    /// the host. The closure of the transport by the other end is only logged.
    pub fn try_log(self) -> Result<(), Self> {
        match self {
            DriverError::TransportClosed => {
                log::info!("(HCI) transport closed by the controller");

                Ok(())
            }
            e @ DriverError::Io(_) => Err(e),
        }
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DriverError::TransportClosed => f.write_str("transport closed"),
            DriverError::Io(e) => write!(f, "transport I/O error, {}", e),
        }
    }
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DriverError::TransportClosed => None,
            DriverError::Io(e) => Some(e),
        }
    }
}

impl From<TransportError> for DriverError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Closed => DriverError::TransportClosed,
            TransportError::Io(e) => DriverError::Io(e),
        }
    }
}

/// The driver of the host
///
/// This is created by [`Host::new`](crate::Host::new).
pub struct Driver<T: Transport> {
    reader: PacketReader<ReadHalf<T>>,
    writer: PacketWriter<WriteHalf<T>>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    reassembler: Reassembler,
    shared: Arc<Shared>,
}

impl<T: Transport> Driver<T> {
    pub(crate) fn new(transport: T, outbound: mpsc::UnboundedReceiver<Outbound>, shared: Arc<Shared>) -> Self {
        let (reader, writer) = transport::split(transport);

        Driver {
            reader,
            writer,
            outbound,
            reassembler: Reassembler::new(),
            shared,
        }
    }

    /// Run the driver
    ///
    /// This runs until the host is closed (`Ok` is returned) or the transport fails. When this
    /// returns every pending command is resolved with [`CommandError::Closed`] and every
    /// connection is closed.
    pub async fn run(mut self) -> Result<(), DriverError> {
        log::debug!("(HCI) driver started");

        let result = loop {
            let deadline = self.shared.correlator().next_deadline();

            let timer = async move {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => core::future::pending().await,
                }
            };

            tokio::select! {
                framed = self.reader.next() => match framed {
                    Ok(framed) => self.on_framed(framed),
                    Err(e) => break Err(DriverError::from(e)),
                },
                outbound = self.outbound.recv() => match outbound {
                    Some(Outbound::Packet(packet)) => {
                        if let Err(e) = self.writer.send(&packet).await {
                            break Err(e.into());
                        }
                    }
                    Some(Outbound::Close) | None => {
                        if let Err(e) = self.writer.shutdown().await {
                            log::warn!("(HCI) failed to shut down the transport, {}", e);
                        }

                        break Ok(());
                    }
                },
                _ = timer => self.on_timer(),
                _ = self.shared.deadline_changed.notified() => (),
            }
        };

        self.close();

        result
    }

    fn close(&mut self) {
        let mut correlator = self.shared.correlator();

        let aborted = correlator.abort_all_with(CommandError::Closed);

        // dropping the event sender ends every event stream
        crate::lock(&self.shared.events).take();

        drop(correlator);

        self.shared.connections().clear();

        self.reassembler.clear();

        log::info!("(HCI) driver exited, {} pending commands were closed", aborted);
    }

    fn malformed(&self, error: CodecError) {
        log::error!("(HCI) dropping packet, {}", error);

        self.shared.emit(HostEvent::Diagnostic(Diagnostic::MalformedPacket(error)));
    }

    fn on_framed(&mut self, framed: Framed) {
        let bytes = match framed {
            Framed::Packet(bytes) => bytes,
            Framed::UnknownIndicator(indicator) => {
                return self.malformed(Malformed::UnknownPacketType(indicator).into());
            }
        };

        match HciPacket::decode(&bytes) {
            Err(e) => self.malformed(e),
            Ok(HciPacket::Event(event)) => self.on_event_packet(event),
            Ok(HciPacket::Acl(data)) => self.on_acl_data(data),
            Ok(HciPacket::Sco(sco)) => {
                log::debug!("(HCI) dropping SCO data for connection {}", sco.get_handle());
            }
            Ok(HciPacket::Command(command)) => {
                log::warn!(
                    "(HCI) dropping command packet ({}) sent by the controller",
                    command.get_opcode()
                );
            }
        }
    }

    fn on_event_packet(&mut self, event: EventPacket) {
        match event.to_events_data() {
            Ok(data) => self.on_event(data),
            Err(e) => self.malformed(e.into()),
        }
    }

    fn on_event(&mut self, data: EventsData) {
        log::trace!("(HCI) received event {:?}", data);

        match data {
            EventsData::CommandComplete(data) => {
                let response = data.command_opcode.map(|opcode| CommandResponse::Complete {
                    opcode,
                    return_parameter: data.return_parameter,
                });

                self.on_command_response(response, data.number_of_hci_command_packets, Events::CommandComplete)
            }
            EventsData::CommandStatus(data) => {
                let response = data.command_opcode.map(|opcode| CommandResponse::Status {
                    opcode,
                    status: data.status,
                });

                self.on_command_response(response, data.number_of_hci_command_packets, Events::CommandStatus)
            }
            EventsData::DisconnectionComplete(data) => self.on_disconnection_complete(&data),
            EventsData::HardwareError(data) => {
                log::error!("(HCI) controller hardware error {:#04x}", data.hardware_code);

                self.on_controller_reset()
            }
            EventsData::NumberOfCompletedPackets(completed) => {
                for data in completed {
                    log::trace!(
                        "(HCI) {} packets completed on connection {}",
                        data.completed_packets,
                        data.connection_handle
                    );
                }
            }
            EventsData::DataBufferOverflow(data) => {
                log::warn!("(HCI) controller data buffer overflow for link type {:#04x}", data.link_type);
            }
            EventsData::LeMeta(LeMetaData::ConnectionComplete(data)) => self.on_connection_complete(&data),
            EventsData::LeMeta(LeMetaData::AdvertisingReport(reports)) => {
                let mut links = self.shared.links();

                let events: Vec<HostEvent> = reports
                    .into_iter()
                    .flat_map(|report| links.on_advertising_report(report))
                    .collect();

                drop(links);

                self.shared.emit_all(events)
            }
            EventsData::LeMeta(LeMetaData::ConnectionUpdateComplete(data)) => {
                let events = self.shared.links().on_connection_update(&data);

                self.shared.emit_all(events)
            }
            unsupported @ (EventsData::LeMeta(LeMetaData::Unsupported { .. }) | EventsData::Unsupported { .. }) => {
                log::debug!("(HCI) forwarding unsupported event");

                self.shared.emit(HostEvent::Unsupported(unsupported))
            }
        }
    }

    fn on_command_response(&mut self, response: Option<CommandResponse>, num_hci_command_packets: u8, event: Events) {
        let mut correlator = self.shared.correlator();

        let mut events = Vec::new();

        match correlator.on_response(response, num_hci_command_packets) {
            Correlation::Matched(matched) => {
                log::debug!(
                    "(HCI) command {} completed with status {}",
                    matched.id,
                    matched.response.get_status()
                );

                events = self.shared.links().on_command_response(matched.tag, &matched.response);

                if matched.tag == LinkEffect::Reset && matched.response.get_status().is_ok() {
                    let aborted = correlator.abort_all();

                    log::info!("(HCI) controller reset, {} pending commands were aborted", aborted);

                    self.shared.connections().clear();

                    self.reassembler.clear();
                }

                matched.deliver();
            }
            Correlation::CreditOnly => (),
            Correlation::Late(opcode) => events.push(HostEvent::Diagnostic(Diagnostic::LateCompletion { opcode })),
            Correlation::Duplicate(opcode) => {
                events.push(HostEvent::Diagnostic(Diagnostic::DuplicateCompletion { opcode }))
            }
            Correlation::Unexpected(opcode) => events.push(HostEvent::Diagnostic(Diagnostic::UnexpectedEvent {
                event,
                opcode: Some(opcode),
                handle: None,
            })),
        }

        self.dispatch(&mut correlator);

        drop(correlator);

        self.shared.emit_all(events)
    }

    /// Queue the next command for sending
    fn dispatch(&self, correlator: &mut Correlator<LinkEffect>) {
        if let Some(packet) = correlator.next_dispatch() {
            // the receiver is owned by this driver
            let _ = self.shared.send_outbound(packet);
        }
    }

    fn on_timer(&mut self) {
        let mut correlator = self.shared.correlator();

        let expired = correlator.expire(Instant::now());

        log::trace!("(HCI) {} commands timed out", expired.len());

        // a held back command may be sendable even when nothing timed out
        self.dispatch(&mut correlator);
    }

    fn on_controller_reset(&mut self) {
        let mut correlator = self.shared.correlator();

        let aborted = correlator.abort_all();

        let events = self.shared.links().on_controller_reset();

        drop(correlator);

        self.shared.connections().clear();

        self.reassembler.clear();

        log::info!("(HCI) controller reset, {} pending commands were aborted", aborted);

        self.shared.emit_all(events)
    }

    fn on_connection_complete(&mut self, data: &LeConnectionCompleteData) {
        let events = self.shared.links().on_connection_complete(data);

        for event in events.iter() {
            if let HostEvent::Connected(info) = event {
                self.shared.connections().insert(info.handle, ConnectionEnds::new());
            }
        }

        self.shared.emit_all(events)
    }

    fn on_disconnection_complete(&mut self, data: &DisconnectionCompleteData) {
        let handle = data.connection_handle;

        let mut links = self.shared.links();

        let events = links.on_disconnection_complete(data);

        let is_closed = links.connection(handle).is_none();

        drop(links);

        if is_closed {
            // dropping the sender ends the receiving of the connection
            self.shared.connections().remove(&handle);

            if self.reassembler.discard(handle) {
                log::debug!("(HCI) discarded a partial PDU of disconnected connection {}", handle);
            }
        }

        self.shared.emit_all(events)
    }

    fn on_acl_data(&mut self, data: HciAclData) {
        let handle = data.get_handle();

        let connections = self.shared.connections();

        let Some(ends) = connections.get(&handle) else {
            log::warn!("(HCI) dropping ACL data for unknown connection {}", handle);

            return;
        };

        let mut events = Vec::new();

        for result in self.reassembler.receive(data).into_results() {
            if let Err(e) = result {
                log::error!("(HCI) {}", e);

                events.push(HostEvent::DataLoss(e));
            }

            // the connection may have been dropped by the application
            let _ = ends.sender.send(result);
        }

        drop(connections);

        self.shared.emit_all(events)
    }
}

impl<T: Transport> fmt::Debug for Driver<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Driver")
    }
}
