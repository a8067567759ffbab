//! Events of the host
//!
//! These are the events that are given to the application through an [`EventStream`]. They are
//! produced by the driver task as it processes what was received from the controller.

use crate::link::{ConnectionInfo, LinkRole};
use futures::stream::{BoxStream, Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tble_hci_interface::reassembler::ReassemblyError;
use tble_hci_util::codec::CodecError;
use tble_hci_util::errors::Error;
use tble_hci_util::events::parameters::LeAdvertisingReportData;
use tble_hci_util::events::{Events, EventsData};
use tble_hci_util::ConnectionHandle;
use tokio::sync::broadcast;

/// An event of the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// The state of the advertiser changed
    AdvertisingStateChanged(LinkRole),
    /// The state of the scanner changed
    ScanStateChanged(LinkRole),
    /// The state of the initiator changed
    InitiatorStateChanged(LinkRole),
    /// A report received while scanning
    AdvertisingReport(LeAdvertisingReportData),
    /// A new connection was established
    Connected(ConnectionInfo),
    /// A connection was closed
    Disconnected { handle: ConnectionHandle, reason: Error },
    /// A partially received PDU was lost
    DataLoss(ReassemblyError),
    /// The controller was reset
    ///
    /// Every pending command was aborted, every role is idle, and every connection is closed.
    ControllerReset,
    /// An event this library does not process
    Unsupported(EventsData),
    /// An anomaly in what was received from the controller
    Diagnostic(Diagnostic),
    /// The subscriber fell behind and missed this number of events
    Lagged(u64),
}

/// A non-fatal anomaly
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// A packet from the controller could not be decoded and was dropped
    MalformedPacket(CodecError),
    /// An event that is not expected in the current state
    UnexpectedEvent {
        event: Events,
        opcode: Option<u16>,
        handle: Option<ConnectionHandle>,
    },
    /// A response for a command that was already resolved
    DuplicateCompletion { opcode: u16 },
    /// A response for a command that timed out
    LateCompletion { opcode: u16 },
}

impl Diagnostic {
    pub(crate) fn unexpected(event: Events) -> Self {
        Diagnostic::UnexpectedEvent {
            event,
            opcode: None,
            handle: None,
        }
    }

    pub(crate) fn unexpected_for(event: Events, handle: ConnectionHandle) -> Self {
        Diagnostic::UnexpectedEvent {
            event,
            opcode: None,
            handle: Some(handle),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Diagnostic::MalformedPacket(e) => fmt::Display::fmt(e, f),
            Diagnostic::UnexpectedEvent { event, opcode, handle } => {
                write!(f, "unexpected {} event", event)?;

                if let Some(opcode) = opcode {
                    write!(f, " for opcode {:#06x}", opcode)?;
                }

                if let Some(handle) = handle {
                    write!(f, " for connection {}", handle)?;
                }

                Ok(())
            }
            Diagnostic::DuplicateCompletion { opcode } => write!(f, "duplicate completion for opcode {:#06x}", opcode),
            Diagnostic::LateCompletion { opcode } => write!(f, "late completion for opcode {:#06x}", opcode),
        }
    }
}

/// A stream of [`HostEvent`]s
///
/// This is created by [`Host::subscribe`](crate::Host::subscribe). The stream starts with the
/// events produced after it was created and ends when the driver task exits.
pub struct EventStream {
    inner: BoxStream<'static, HostEvent>,
}

impl EventStream {
    pub(crate) fn new(receiver: broadcast::Receiver<HostEvent>) -> Self {
        let inner = futures::stream::unfold(receiver, |mut receiver| async move {
            match receiver.recv().await {
                Ok(event) => Some((event, receiver)),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    log::warn!("(HCI) event subscriber missed {} events", missed);

                    Some((HostEvent::Lagged(missed), receiver))
                }
                Err(broadcast::error::RecvError::Closed) => None,
            }
        })
        .boxed();

        EventStream { inner }
    }
}

impl Stream for EventStream {
    type Item = HostEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("EventStream")
    }
}
