//! Reassembly and fragmentation of ACL data
//!
//! A higher layer PDU (an L2CAP basic frame) may be larger than the maximum payload of a HCI ACL
//! data packet supported by the controller, so it is sent as a *first* fragment followed by any
//! number of *continuing* fragments. The total size of the PDU is not part of the HCI header, it
//! is derived from the L2CAP length field within the first two bytes of the PDU (the length of
//! the L2CAP payload, not counting the four byte basic header).
//!
//! Reassembly is done per connection handle. Fragments of different connections may be
//! interleaved, but the fragments of one connection must be in order.

use std::collections::HashMap;
use std::fmt;
use tble_hci_util::acl::{AclBroadcastFlag, AclPacketBoundary, HciAclData};
use tble_hci_util::ConnectionHandle;

/// The size of the L2CAP basic header
const BASIC_HEADER_SIZE: usize = 4;

/// Error for a fragment that does not fit the reassembly of a connection
///
/// Whenever one of these errors occurs, the partially reassembled PDU is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblyError {
    /// A continuing fragment was received without a prior first fragment
    UnexpectedContinuation(ConnectionHandle),
    /// More data was received than the PDU declared
    Overrun {
        handle: ConnectionHandle,
        expected: usize,
        received: usize,
    },
    /// A start fragment (or complete PDU) was received before the previous PDU was complete
    Interrupted { handle: ConnectionHandle, buffered: usize },
}

impl ReassemblyError {
    pub fn get_handle(&self) -> ConnectionHandle {
        match self {
            ReassemblyError::UnexpectedContinuation(handle)
            | ReassemblyError::Overrun { handle, .. }
            | ReassemblyError::Interrupted { handle, .. } => *handle,
        }
    }
}

impl fmt::Display for ReassemblyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReassemblyError::UnexpectedContinuation(handle) => write!(
                f,
                "continuing fragment without a first fragment for connection {}",
                handle
            ),
            ReassemblyError::Overrun {
                handle,
                expected,
                received,
            } => write!(
                f,
                "received {} bytes for a PDU of {} bytes on connection {}",
                received, expected, handle
            ),
            ReassemblyError::Interrupted { handle, buffered } => write!(
                f,
                "new PDU started on connection {} before the previous one was complete ({} bytes lost)",
                handle, buffered
            ),
        }
    }
}

impl std::error::Error for ReassemblyError {}

/// The output of [`Reassembler::receive`]
///
/// A single fragment can both complete a PDU and cause a prior partial PDU to be lost (a
/// complete PDU interrupting a partial one), so both are reported.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Reassembled {
    /// A partially reassembled PDU was lost
    pub lost: Option<ReassemblyError>,
    /// A complete PDU
    pub pdu: Option<Vec<u8>>,
}

impl Reassembled {
    /// Convert into the results in the order they occurred
    pub fn into_results(self) -> impl Iterator<Item = Result<Vec<u8>, ReassemblyError>> {
        self.lost.map(Err).into_iter().chain(self.pdu.map(Ok))
    }
}

struct Partial {
    buffer: Vec<u8>,
}

impl Partial {
    /// The total length of the PDU, known once the L2CAP length field is buffered
    fn expected_len(&self) -> Option<usize> {
        match self.buffer.as_slice() {
            [l0, l1, ..] => Some(<u16>::from_le_bytes([*l0, *l1]) as usize + BASIC_HEADER_SIZE),
            _ => None,
        }
    }
}

/// Reassembles ACL data into PDUs
#[derive(Default)]
pub struct Reassembler {
    partials: HashMap<ConnectionHandle, Partial>,
}

impl Reassembler {
    pub fn new() -> Self {
        Reassembler::default()
    }

    /// Receive a fragment
    pub fn receive(&mut self, fragment: HciAclData) -> Reassembled {
        let handle = fragment.get_handle();

        let boundary = fragment.get_packet_boundary_flag();

        let mut reassembled = Reassembled::default();

        match boundary {
            AclPacketBoundary::CompleteL2capPdu => {
                reassembled.lost = self.interrupt(handle);

                reassembled.pdu = Some(fragment.into_payload());
            }
            AclPacketBoundary::FirstNonFlushable | AclPacketBoundary::FirstAutoFlushable => {
                reassembled.lost = self.interrupt(handle);

                let partial = Partial {
                    buffer: fragment.into_payload(),
                };

                self.partials.insert(handle, partial);

                reassembled.pdu = self.check_complete(handle, &mut reassembled.lost);
            }
            AclPacketBoundary::ContinuingFragment => match self.partials.get_mut(&handle) {
                None => {
                    log::trace!("(HCI) continuing fragment on connection {} with nothing to continue", handle);

                    reassembled.lost = Some(ReassemblyError::UnexpectedContinuation(handle));
                }
                Some(partial) => {
                    partial.buffer.extend_from_slice(fragment.get_payload());

                    reassembled.pdu = self.check_complete(handle, &mut reassembled.lost);
                }
            },
        }

        reassembled
    }

    fn interrupt(&mut self, handle: ConnectionHandle) -> Option<ReassemblyError> {
        self.partials
            .remove(&handle)
            .map(|partial| ReassemblyError::Interrupted {
                handle,
                buffered: partial.buffer.len(),
            })
    }

    fn check_complete(&mut self, handle: ConnectionHandle, lost: &mut Option<ReassemblyError>) -> Option<Vec<u8>> {
        let partial = self.partials.get(&handle)?;

        let expected = partial.expected_len()?;

        let received = partial.buffer.len();

        if received < expected {
            return None;
        }

        let partial = self.partials.remove(&handle)?;

        if received == expected {
            Some(partial.buffer)
        } else {
            *lost = Some(ReassemblyError::Overrun {
                handle,
                expected,
                received,
            });

            None
        }
    }

    /// Discard the partial PDU of a connection
    ///
    /// This is used when a connection is closed. `true` is returned if there was a partial PDU.
    pub fn discard(&mut self, handle: ConnectionHandle) -> bool {
        self.partials.remove(&handle).is_some()
    }

    /// Discard every partial PDU
    pub fn clear(&mut self) {
        self.partials.clear()
    }

    /// Check if a PDU is partially reassembled for a connection
    pub fn is_assembling(&self, handle: ConnectionHandle) -> bool {
        self.partials.contains_key(&handle)
    }
}

impl fmt::Debug for Reassembler {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map()
            .entries(self.partials.iter().map(|(handle, partial)| (handle, partial.buffer.len())))
            .finish()
    }
}

/// Fragment a PDU
///
/// The returned iterator outputs HCI ACL data packets with a payload no larger than `max_len`.
/// The first packet is marked as the first (non-flushable) fragment and every other packet is
/// marked as a continuing fragment. An empty PDU is a single empty first fragment.
///
/// A `max_len` of zero is treated as one.
pub fn fragment(handle: ConnectionHandle, pdu: &[u8], max_len: usize) -> Fragments<'_> {
    let max_len = max_len.clamp(1, HciAclData::MAX_PAYLOAD_SIZE);

    Fragments {
        handle,
        pdu,
        max_len,
        offset: 0,
    }
}

/// Iterator returned by [`fragment`]
pub struct Fragments<'a> {
    handle: ConnectionHandle,
    pdu: &'a [u8],
    max_len: usize,
    offset: usize,
}

impl Iterator for Fragments<'_> {
    type Item = HciAclData;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.offset == 0;

        if !first && self.offset >= self.pdu.len() {
            return None;
        }

        if first && self.pdu.is_empty() {
            // the empty PDU is output once
            self.offset = 1;
        }

        let start = self.offset.min(self.pdu.len());

        let end = (start + self.max_len).min(self.pdu.len());

        self.offset = end.max(self.offset);

        let boundary = if first {
            AclPacketBoundary::FirstNonFlushable
        } else {
            AclPacketBoundary::ContinuingFragment
        };

        HciAclData::new(
            self.handle,
            boundary,
            AclBroadcastFlag::NoBroadcast,
            self.pdu[start..end].to_vec(),
        )
        .ok()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.offset == 0 {
            self.pdu.len().div_ceil(self.max_len).max(1)
        } else {
            self.pdu.len().saturating_sub(self.offset).div_ceil(self.max_len)
        };

        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(raw: u16) -> ConnectionHandle {
        ConnectionHandle::try_from(raw).unwrap()
    }

    fn acl(raw_handle: u16, boundary: AclPacketBoundary, payload: &[u8]) -> HciAclData {
        HciAclData::new(handle(raw_handle), boundary, AclBroadcastFlag::NoBroadcast, payload.to_vec()).unwrap()
    }

    #[test]
    fn first_and_continuing() {
        let mut reassembler = Reassembler::new();

        // L2CAP length of 6 makes the PDU 10 bytes
        let a = [0x06, 0x00, 0x40, 0x00, 1, 2];
        let b = [3, 4, 5, 6];

        assert_eq!(
            Reassembled::default(),
            reassembler.receive(acl(1, AclPacketBoundary::FirstNonFlushable, &a))
        );

        assert!(reassembler.is_assembling(handle(1)));

        let reassembled = reassembler.receive(acl(1, AclPacketBoundary::ContinuingFragment, &b));

        assert_eq!(None, reassembled.lost);
        assert_eq!(Some([a.as_slice(), b.as_slice()].concat()), reassembled.pdu);
        assert!(!reassembler.is_assembling(handle(1)));
    }

    #[test]
    fn continuation_without_start() {
        let mut reassembler = Reassembler::new();

        let reassembled = reassembler.receive(acl(1, AclPacketBoundary::ContinuingFragment, &[1, 2, 3]));

        assert_eq!(Some(ReassemblyError::UnexpectedContinuation(handle(1))), reassembled.lost);
        assert_eq!(None, reassembled.pdu);
    }

    #[test]
    fn complete_pdu_interrupts_partial() {
        let mut reassembler = Reassembler::new();

        reassembler.receive(acl(2, AclPacketBoundary::FirstNonFlushable, &[0x10, 0x00, 0x40]));

        let results: Vec<_> = reassembler
            .receive(acl(2, AclPacketBoundary::CompleteL2capPdu, &[0x00, 0x00, 0x40, 0x00]))
            .into_results()
            .collect();

        assert_eq!(
            vec![
                Err(ReassemblyError::Interrupted {
                    handle: handle(2),
                    buffered: 3
                }),
                Ok(vec![0x00, 0x00, 0x40, 0x00])
            ],
            results
        );
    }

    #[test]
    fn overrun() {
        let mut reassembler = Reassembler::new();

        reassembler.receive(acl(3, AclPacketBoundary::FirstAutoFlushable, &[0x01, 0x00, 0x40, 0x00]));

        let reassembled = reassembler.receive(acl(3, AclPacketBoundary::ContinuingFragment, &[1, 2]));

        assert_eq!(
            Some(ReassemblyError::Overrun {
                handle: handle(3),
                expected: 5,
                received: 6
            }),
            reassembled.lost
        );

        assert!(!reassembler.is_assembling(handle(3)));
    }

    #[test]
    fn interleaved_connections() {
        let mut reassembler = Reassembler::new();

        reassembler.receive(acl(1, AclPacketBoundary::FirstNonFlushable, &[0x01, 0x00]));
        reassembler.receive(acl(2, AclPacketBoundary::FirstNonFlushable, &[0x02, 0x00]));

        let two = reassembler.receive(acl(2, AclPacketBoundary::ContinuingFragment, &[0x40, 0x00, 7, 8]));
        let one = reassembler.receive(acl(1, AclPacketBoundary::ContinuingFragment, &[0x40, 0x00, 9]));

        assert_eq!(Some(vec![0x02, 0x00, 0x40, 0x00, 7, 8]), two.pdu);
        assert_eq!(Some(vec![0x01, 0x00, 0x40, 0x00, 9]), one.pdu);
    }

    #[test]
    fn discard_partial() {
        let mut reassembler = Reassembler::new();

        reassembler.receive(acl(1, AclPacketBoundary::FirstNonFlushable, &[0x08]));

        assert!(reassembler.discard(handle(1)));
        assert!(!reassembler.discard(handle(1)));
    }

    #[test]
    fn fragmentation() {
        let pdu: Vec<u8> = (0..60).collect();

        let fragments: Vec<_> = fragment(handle(5), &pdu, 27).collect();

        assert_eq!(3, fragments.len());
        assert_eq!(AclPacketBoundary::FirstNonFlushable, fragments[0].get_packet_boundary_flag());
        assert_eq!(AclPacketBoundary::ContinuingFragment, fragments[1].get_packet_boundary_flag());
        assert_eq!(AclPacketBoundary::ContinuingFragment, fragments[2].get_packet_boundary_flag());
        assert_eq!(6, fragments[2].get_payload().len());
        assert!(fragments.iter().all(|f| f.get_handle() == handle(5)));

        let joined: Vec<u8> = fragments.iter().flat_map(|f| f.get_payload().iter().copied()).collect();

        assert_eq!(pdu, joined);
    }

    #[test]
    fn fragment_edge_cases() {
        let empty: Vec<_> = fragment(handle(1), &[], 27).collect();

        assert_eq!(1, empty.len());
        assert!(empty[0].get_payload().is_empty());

        assert_eq!(1, fragment(handle(1), &[0; 27], 27).count());
        assert_eq!(3, fragment(handle(1), &[0; 3], 0).count());
        assert_eq!((3, Some(3)), fragment(handle(1), &[0; 3], 1).size_hint());
    }

    #[test]
    fn fragments_reassemble() {
        let mut pdu = vec![0x20, 0x00, 0x04, 0x00];

        pdu.extend(0..0x20u8);

        let mut reassembler = Reassembler::new();

        let pdus: Vec<_> = fragment(handle(9), &pdu, 10)
            .filter_map(|f| reassembler.receive(f).pdu)
            .collect();

        assert_eq!(vec![pdu], pdus);
    }
}
