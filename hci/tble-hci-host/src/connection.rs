//! Data transfer over a connection

use crate::commands::link_control::disconnect::{self, DisconnectParameters, DisconnectReason};
use crate::link::LinkRole;
use crate::{Host, SendCommandError};
use std::fmt;
use tble_hci_interface::reassembler::{fragment, ReassemblyError};
use tble_hci_util::codec::HciPacket;
use tble_hci_util::ConnectionHandle;
use tokio::sync::mpsc;

/// Error for sending data over a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionError {
    /// The connection is not open (or it is disconnecting)
    Disconnected(ConnectionHandle),
    /// The host is closed
    Closed,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectionError::Disconnected(handle) => write!(f, "connection {} is not connected", handle),
            ConnectionError::Closed => f.write_str("host is closed"),
        }
    }
}

impl std::error::Error for ConnectionError {}

/// A connection to a remote device
///
/// This is used for sending and receiving PDUs over a connection. PDUs are fragmented into HCI
/// ACL data packets when sent, and received HCI ACL data packets are reassembled into PDUs.
pub struct Connection {
    handle: ConnectionHandle,
    receiver: mpsc::UnboundedReceiver<Result<Vec<u8>, ReassemblyError>>,
    host: Host,
}

impl Connection {
    pub(crate) fn new(
        handle: ConnectionHandle,
        receiver: mpsc::UnboundedReceiver<Result<Vec<u8>, ReassemblyError>>,
        host: Host,
    ) -> Self {
        Connection { handle, receiver, host }
    }

    pub fn get_handle(&self) -> ConnectionHandle {
        self.handle
    }

    /// Send a PDU
    ///
    /// The PDU is fragmented into HCI ACL data packets no larger than
    /// [`max_acl_data_length`](Host::max_acl_data_length). The fragments of a PDU are never
    /// interleaved with the fragments of another PDU of the same connection.
    pub fn send(&self, pdu: &[u8]) -> Result<(), ConnectionError> {
        if self.host.link_state(self.handle) != Some(LinkRole::Connected) {
            return Err(ConnectionError::Disconnected(self.handle));
        }

        let packets: Vec<Vec<u8>> = fragment(self.handle, pdu, self.host.max_acl_data_length())
            .map(|data| HciPacket::Acl(data).encode())
            .collect();

        log::trace!(
            "(HCI) sending a PDU of {} bytes in {} fragments on connection {}",
            pdu.len(),
            packets.len(),
            self.handle
        );

        // holding the lock keeps the fragments of concurrent sends from interleaving
        let _connections = self.host.shared.connections();

        packets.into_iter().try_for_each(|packet| {
            self.host
                .shared
                .send_outbound(packet)
                .map_err(|_| ConnectionError::Closed)
        })
    }

    /// Receive a PDU
    ///
    /// `None` is returned once the connection is disconnected and every PDU received before the
    /// disconnection was received. An error is returned for a partially received PDU that was
    /// lost.
    pub async fn recv(&mut self) -> Option<Result<Vec<u8>, ReassemblyError>> {
        self.receiver.recv().await
    }

    /// Disconnect the connection
    ///
    /// This completes when the controller accepted the disconnection. The disconnection itself
    /// is reported with a [`HostEvent::Disconnected`](crate::HostEvent::Disconnected), at which
    /// point [`recv`](Connection::recv) returns `None`.
    pub async fn disconnect(&self, reason: DisconnectReason) -> Result<(), SendCommandError> {
        disconnect::send(
            &self.host,
            DisconnectParameters {
                connection_handle: self.handle,
                disconnect_reason: reason,
            },
        )
        .await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Connection").field("handle", &self.handle).finish()
    }
}
