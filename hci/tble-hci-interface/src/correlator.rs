//! Command flow control and correlation of command responses
//!
//! The HCI only allows the host to send as many commands as the controller has indicated within
//! the *Num_HCI_Command_Packets* field of the last Command Complete or Command Status event. This
//! library takes the classic approach of only ever having a single command outstanding. Commands
//! submitted while another command is waiting on the controller are queued in the order they
//! were submitted (regardless of their opcode), and the queue is bounded.
//!
//! The controller responds to every command with either a Command Complete or a Command Status
//! event containing the opcode of the command. The [`Correlator`] matches these events back to
//! the command that was sent, and hands the response to the submitter through a oneshot channel.
//!
//! # Anomalies
//! Not every response can be matched. A response for a command that already timed out is a
//! *late* response and is discarded (at most one late response is expected per timed out
//! command). A late response is only expected for as long as the timeout of the command that
//! timed out, and until then a new command with the same opcode is held back in the queue so that
//! the late response cannot be taken as its response. A response for an opcode that was just resolved with nothing else pending for it
//! is a *duplicate*, and any other response is *unexpected*. None of these are fatal.
//!
//! # Tags
//! Every command carries a tag of type `T` that is given back when the command is matched with
//! its response. The host uses the tag to know what a successful command does to its state.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Duration;
use tble_hci_util::errors::Error;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Identifier of a submitted command
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CommandId(u64);

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The response of the controller to a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResponse {
    /// The command completed, this contains the return parameter of the Command Complete event
    Complete { opcode: u16, return_parameter: Vec<u8> },
    /// The command was accepted (or rejected) by the controller
    ///
    /// This is the response to commands that complete with an event other than Command Complete.
    Status { opcode: u16, status: Error },
}

impl CommandResponse {
    pub fn get_opcode(&self) -> u16 {
        match self {
            CommandResponse::Complete { opcode, .. } | CommandResponse::Status { opcode, .. } => *opcode,
        }
    }

    /// Get the status of the command
    ///
    /// For a Command Complete response, this is the first byte of the return parameter.
    pub fn get_status(&self) -> Error {
        match self {
            CommandResponse::Complete { return_parameter, .. } => {
                tble_hci_util::events::status_of(return_parameter)
            }
            CommandResponse::Status { status, .. } => *status,
        }
    }

    /// Get the return parameter
    ///
    /// This is empty for a Command Status response.
    pub fn get_return_parameter(&self) -> &[u8] {
        match self {
            CommandResponse::Complete { return_parameter, .. } => return_parameter,
            CommandResponse::Status { .. } => &[],
        }
    }

    /// Convert into a `Result`
    ///
    /// An error is returned when the status is not success.
    pub fn into_result(self) -> Result<Self, CommandError> {
        match self.get_status() {
            Error::NoError => Ok(self),
            status => Err(CommandError::Controller(status)),
        }
    }
}

/// Error for a submitted command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// No response was received before the timeout
    TimedOut,
    /// The command was aborted because the controller was reset
    Aborted,
    /// The command was cancelled before it was sent to the controller
    Cancelled,
    /// The controller responded with an error status
    Controller(Error),
    /// The host is closed
    Closed,
    /// The return parameter of the response could not be interpreted
    Malformed,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CommandError::TimedOut => f.write_str("command timed out"),
            CommandError::Aborted => f.write_str("command aborted by a controller reset"),
            CommandError::Cancelled => f.write_str("command cancelled"),
            CommandError::Controller(status) => write!(f, "controller error, {}", status),
            CommandError::Closed => f.write_str("host is closed"),
            CommandError::Malformed => f.write_str("malformed return parameter"),
        }
    }
}

impl std::error::Error for CommandError {}

/// The command queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Busy;

impl fmt::Display for Busy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("command queue is full")
    }
}

impl std::error::Error for Busy {}

/// Error returned by [`Correlator::cancel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelError {
    /// The command was already sent to the controller
    ///
    /// A command that was sent can only be cancelled by sending the cancelling command of the
    /// controller (for example *LE Create Connection Cancel*).
    AlreadySent,
    /// No command with the id is pending
    NotFound,
}

impl fmt::Display for CancelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CancelError::AlreadySent => f.write_str("command was already sent to the controller"),
            CancelError::NotFound => f.write_str("no pending command with this id"),
        }
    }
}

impl std::error::Error for CancelError {}

/// The result sent to the submitter of a command
pub type CommandResult = Result<CommandResponse, CommandError>;

struct Pending<T> {
    id: CommandId,
    opcode: u16,
    packet: Vec<u8>,
    timeout: Duration,
    deadline: Instant,
    sender: oneshot::Sender<CommandResult>,
    tag: T,
}

impl<T> Pending<T> {
    fn resolve(self, result: CommandResult) {
        // the submitter may have stopped waiting
        let _ = self.sender.send(result);
    }
}

/// A response matched with the command that was sent
///
/// The response is not sent to the submitter until [`deliver`](Matched::deliver) is called.
pub struct Matched<T> {
    pub id: CommandId,
    pub tag: T,
    pub response: CommandResponse,
    sender: oneshot::Sender<CommandResult>,
}

impl<T> Matched<T> {
    /// Send the response to the submitter
    pub fn deliver(self) {
        let _ = self.sender.send(Ok(self.response));
    }
}

impl<T: fmt::Debug> fmt::Debug for Matched<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Matched")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("response", &self.response)
            .finish()
    }
}

/// The outcome of correlating a response
#[derive(Debug)]
pub enum Correlation<T> {
    /// The response is for the command that is waiting on the controller
    Matched(Matched<T>),
    /// The response only updates the number of commands the controller can accept
    CreditOnly,
    /// The response is for a command that timed out
    Late(u16),
    /// The response is for a command that was already resolved
    Duplicate(u16),
    /// No command was sent with the opcode of the response
    Unexpected(u16),
}

/// A command that timed out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expired {
    pub id: CommandId,
    pub opcode: u16,
    /// The command was sent to the controller
    pub was_sent: bool,
}

/// The command correlator
pub struct Correlator<T> {
    next_id: u64,
    max_queued: usize,
    credit: bool,
    in_flight: Option<Pending<T>>,
    queue: VecDeque<Pending<T>>,
    /// Opcodes of sent commands that timed out, with the instants at which their late responses
    /// are no longer expected
    timed_out: HashMap<u16, VecDeque<Instant>>,
    /// Opcodes of the most recently resolved commands
    resolved: VecDeque<u16>,
}

impl<T> Correlator<T> {
    const RESOLVED_HISTORY: usize = 8;

    /// Create a new `Correlator`
    ///
    /// Input `max_queued` is the maximum number of commands that can wait for the command that is
    /// waiting on the controller.
    pub fn new(max_queued: usize) -> Self {
        Correlator {
            next_id: 0,
            max_queued,
            credit: true,
            in_flight: None,
            queue: VecDeque::new(),
            timed_out: HashMap::new(),
            resolved: VecDeque::with_capacity(Self::RESOLVED_HISTORY),
        }
    }

    fn can_dispatch(&self) -> bool {
        self.in_flight.is_none() && self.credit
    }

    /// Check if a late response is still expected for `opcode`
    fn is_held(&self, opcode: u16) -> bool {
        self.timed_out.contains_key(&opcode)
    }

    /// Submit a command
    ///
    /// Input `packet` is the complete command packet (with the packet indicator) and `timeout` is
    /// measured from `now`. The returned receiver gets the result of the command.
    ///
    /// The command is only queued by this method, [`next_dispatch`](Correlator::next_dispatch)
    /// must be called afterwards to get the packet if it can be sent right away.
    ///
    /// # Error
    /// The command cannot be sent right away and the queue is full.
    pub fn submit(
        &mut self,
        opcode: u16,
        packet: Vec<u8>,
        timeout: Duration,
        tag: T,
        now: Instant,
    ) -> Result<(CommandId, oneshot::Receiver<CommandResult>), Busy> {
        let dispatchable = self.queue.is_empty() && self.can_dispatch() && !self.is_held(opcode);

        if !dispatchable && self.queue.len() >= self.max_queued {
            log::warn!("(HCI) command queue is full, rejecting opcode {:#06x}", opcode);

            return Err(Busy);
        }

        let id = CommandId(self.next_id);

        self.next_id += 1;

        let (sender, receiver) = oneshot::channel();

        self.queue.push_back(Pending {
            id,
            opcode,
            packet,
            timeout,
            deadline: now + timeout,
            sender,
            tag,
        });

        Ok((id, receiver))
    }

    /// Get the next command to send
    ///
    /// If no command is waiting on the controller and the controller can accept a command, the
    /// oldest queued command becomes the command waiting on the controller and its packet is
    /// returned. The caller must send the returned packet.
    ///
    /// The oldest queued command is held back while a late response is expected for its opcode.
    pub fn next_dispatch(&mut self) -> Option<Vec<u8>> {
        if !self.can_dispatch() {
            return None;
        }

        if let Some(held) = self.queue.front().map(|p| p.opcode).filter(|o| self.is_held(*o)) {
            log::trace!("(HCI) holding back opcode {:#06x} for a late response", held);

            return None;
        }

        let mut pending = self.queue.pop_front()?;

        let packet = core::mem::take(&mut pending.packet);

        log::debug!("(HCI) dispatching command {} (opcode {:#06x})", pending.id, pending.opcode);

        self.in_flight = Some(pending);

        Some(packet)
    }

    fn update_credit(&mut self, num_hci_command_packets: u8) {
        self.credit = num_hci_command_packets != 0;

        if !self.credit {
            log::debug!("(HCI) controller cannot accept commands");
        }
    }

    fn remember_resolved(&mut self, opcode: u16) {
        if self.resolved.len() == Self::RESOLVED_HISTORY {
            self.resolved.pop_front();
        }

        self.resolved.push_back(opcode);
    }

    /// Correlate a response from the controller
    ///
    /// Input `response` is `None` when the event is a Command Complete with the opcode of zero.
    pub fn on_response(&mut self, response: Option<CommandResponse>, num_hci_command_packets: u8) -> Correlation<T> {
        self.update_credit(num_hci_command_packets);

        let Some(response) = response else {
            return Correlation::CreditOnly;
        };

        let opcode = response.get_opcode();

        if let Some(expected) = self.timed_out.get_mut(&opcode) {
            expected.pop_front();

            if expected.is_empty() {
                self.timed_out.remove(&opcode);
            }

            log::warn!("(HCI) discarding late response for opcode {:#06x}", opcode);

            return Correlation::Late(opcode);
        }

        match self.in_flight.take() {
            Some(pending) if pending.opcode == opcode => {
                self.remember_resolved(opcode);

                Correlation::Matched(Matched {
                    id: pending.id,
                    tag: pending.tag,
                    response,
                    sender: pending.sender,
                })
            }
            in_flight => {
                self.in_flight = in_flight;

                if self.resolved.contains(&opcode) {
                    log::warn!("(HCI) duplicate response for opcode {:#06x}", opcode);

                    Correlation::Duplicate(opcode)
                } else {
                    log::warn!("(HCI) unexpected response for opcode {:#06x}", opcode);

                    Correlation::Unexpected(opcode)
                }
            }
        }
    }

    /// Resolve every command whose deadline has passed
    ///
    /// Timed out commands are resolved with [`CommandError::TimedOut`]. If the command waiting
    /// on the controller timed out, the next response with its opcode within the timeout of the
    /// command is treated as late. Late responses that did not arrive within that time are no
    /// longer expected.
    pub fn expire(&mut self, now: Instant) -> Vec<Expired> {
        let mut expired = Vec::new();

        self.timed_out.retain(|opcode, expected| {
            expected.retain(|until| *until > now);

            if expected.is_empty() {
                log::debug!("(HCI) no late response was received for opcode {:#06x}", opcode);
            }

            !expected.is_empty()
        });

        if self.in_flight.as_ref().map(|p| p.deadline <= now).unwrap_or_default() {
            if let Some(pending) = self.in_flight.take() {
                log::warn!("(HCI) command {} (opcode {:#06x}) timed out", pending.id, pending.opcode);

                self.timed_out
                    .entry(pending.opcode)
                    .or_default()
                    .push_back(now + pending.timeout);

                // the controller never answered, assume it can accept another command
                self.credit = true;

                expired.push(Expired {
                    id: pending.id,
                    opcode: pending.opcode,
                    was_sent: true,
                });

                pending.resolve(Err(CommandError::TimedOut));
            }
        }

        let (timed_out, waiting): (VecDeque<_>, VecDeque<_>) =
            core::mem::take(&mut self.queue).into_iter().partition(|p| p.deadline <= now);

        self.queue = waiting;

        for pending in timed_out {
            log::warn!("(HCI) queued command {} (opcode {:#06x}) timed out", pending.id, pending.opcode);

            expired.push(Expired {
                id: pending.id,
                opcode: pending.opcode,
                was_sent: false,
            });

            pending.resolve(Err(CommandError::TimedOut));
        }

        expired
    }

    /// Get the earliest deadline of all pending commands
    ///
    /// This includes the instants at which late responses are no longer expected, as these may
    /// release a held back command.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.in_flight
            .iter()
            .chain(self.queue.iter())
            .map(|p| p.deadline)
            .chain(self.timed_out.values().flatten().copied())
            .min()
    }

    /// Resolve the command waiting on the controller with `error`
    ///
    /// This is for when the packet returned by [`next_dispatch`](Correlator::next_dispatch)
    /// could not be sent. The id of the resolved command is returned.
    pub fn abort_in_flight(&mut self, error: CommandError) -> Option<CommandId> {
        let pending = self.in_flight.take()?;

        let id = pending.id;

        log::debug!("(HCI) command {} (opcode {:#06x}) was not sent", id, pending.opcode);

        pending.resolve(Err(error));

        Some(id)
    }

    /// Cancel a command that has not been sent
    ///
    /// The command is resolved with [`CommandError::Cancelled`].
    pub fn cancel(&mut self, id: CommandId) -> Result<(), CancelError> {
        if self.in_flight.as_ref().map(|p| p.id == id).unwrap_or_default() {
            return Err(CancelError::AlreadySent);
        }

        let index = self.queue.iter().position(|p| p.id == id).ok_or(CancelError::NotFound)?;

        if let Some(pending) = self.queue.remove(index) {
            log::debug!("(HCI) cancelled command {} (opcode {:#06x})", pending.id, pending.opcode);

            pending.resolve(Err(CommandError::Cancelled));
        }

        Ok(())
    }

    /// Abort every pending command
    ///
    /// This is used when the controller is reset, every command is resolved with
    /// [`CommandError::Aborted`]. The number of aborted commands is returned.
    pub fn abort_all(&mut self) -> usize {
        self.abort_all_with(CommandError::Aborted)
    }

    /// Resolve every pending command with `error`
    pub fn abort_all_with(&mut self, error: CommandError) -> usize {
        let mut count = 0;

        for pending in self.in_flight.take().into_iter().chain(self.queue.drain(..)) {
            pending.resolve(Err(error));

            count += 1;
        }

        self.credit = true;
        self.timed_out.clear();
        self.resolved.clear();

        count
    }

    /// Get the opcode of the command waiting on the controller
    pub fn in_flight_opcode(&self) -> Option<u16> {
        self.in_flight.as_ref().map(|p| p.opcode)
    }

    /// Check if a command is waiting on the controller
    pub fn is_sent(&self, id: CommandId) -> bool {
        self.in_flight.as_ref().map(|p| p.id == id).unwrap_or_default()
    }

    /// Get the number of queued commands (not counting a command waiting on the controller)
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Check if the controller can currently accept a command
    pub fn has_credit(&self) -> bool {
        self.credit
    }
}

impl<T> fmt::Debug for Correlator<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Correlator")
            .field("credit", &self.credit)
            .field("in_flight", &self.in_flight_opcode())
            .field("queued", &self.queue.len())
            .field("timed_out", &self.timed_out)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot::error::TryRecvError;
    use tokio_test::{assert_pending, assert_ready};

    const RESET: u16 = 0x0C03;
    const ADV_ENABLE: u16 = 0x200A;
    const SCAN_ENABLE: u16 = 0x200C;

    fn complete(opcode: u16) -> Option<CommandResponse> {
        Some(CommandResponse::Complete {
            opcode,
            return_parameter: vec![0x00],
        })
    }

    fn packet(opcode: u16) -> Vec<u8> {
        let [o0, o1] = opcode.to_le_bytes();

        vec![0x01, o0, o1, 0x00]
    }

    fn submit(
        correlator: &mut Correlator<&'static str>,
        opcode: u16,
        now: Instant,
    ) -> (CommandId, oneshot::Receiver<CommandResult>) {
        correlator
            .submit(opcode, packet(opcode), Duration::from_secs(1), "tag", now)
            .unwrap()
    }

    #[test]
    fn single_command_in_flight() {
        let now = Instant::now();

        let mut correlator = Correlator::new(4);

        let (_, mut first) = submit(&mut correlator, RESET, now);
        let (_, mut second) = submit(&mut correlator, ADV_ENABLE, now);

        assert_eq!(Some(packet(RESET)), correlator.next_dispatch());
        assert_eq!(None, correlator.next_dispatch());
        assert_eq!(1, correlator.queued());

        match correlator.on_response(complete(RESET), 1) {
            Correlation::Matched(matched) => {
                assert_eq!("tag", matched.tag);
                matched.deliver();
            }
            c => panic!("unexpected correlation {:?}", c),
        }

        assert!(first.try_recv().unwrap().is_ok());
        assert_eq!(Err(TryRecvError::Empty), second.try_recv());

        assert_eq!(Some(packet(ADV_ENABLE)), correlator.next_dispatch());
    }

    #[test]
    fn fifo_across_opcodes() {
        let now = Instant::now();

        let mut correlator = Correlator::new(8);

        let order = [SCAN_ENABLE, ADV_ENABLE, RESET, SCAN_ENABLE];

        for opcode in order {
            submit(&mut correlator, opcode, now);
        }

        for opcode in order {
            assert_eq!(Some(packet(opcode)), correlator.next_dispatch());

            assert!(matches!(correlator.on_response(complete(opcode), 1), Correlation::Matched(_)));
        }
    }

    #[test]
    fn busy_when_queue_is_full() {
        let now = Instant::now();

        let mut correlator = Correlator::new(1);

        submit(&mut correlator, RESET, now);

        correlator.next_dispatch();

        submit(&mut correlator, ADV_ENABLE, now);

        assert_eq!(
            Err(Busy),
            correlator
                .submit(SCAN_ENABLE, packet(SCAN_ENABLE), Duration::from_secs(1), "tag", now)
                .map(|_| ())
        );
    }

    #[test]
    fn zero_sized_queue_still_sends() {
        let mut correlator = Correlator::new(0);

        submit(&mut correlator, RESET, Instant::now());

        assert!(correlator.next_dispatch().is_some());
    }

    #[test]
    fn duplicate_and_unexpected() {
        let now = Instant::now();

        let mut correlator = Correlator::new(4);

        submit(&mut correlator, ADV_ENABLE, now);

        correlator.next_dispatch();

        assert!(matches!(correlator.on_response(complete(ADV_ENABLE), 1), Correlation::Matched(_)));

        assert!(matches!(
            correlator.on_response(complete(ADV_ENABLE), 1),
            Correlation::Duplicate(ADV_ENABLE)
        ));

        assert!(matches!(
            correlator.on_response(complete(SCAN_ENABLE), 1),
            Correlation::Unexpected(SCAN_ENABLE)
        ));
    }

    #[test]
    fn late_response_after_timeout() {
        let now = Instant::now();

        let mut correlator = Correlator::new(4);

        let (id, mut receiver) = correlator
            .submit(ADV_ENABLE, packet(ADV_ENABLE), Duration::from_millis(100), "tag", now)
            .unwrap();

        correlator.next_dispatch();

        assert_eq!(Some(now + Duration::from_millis(100)), correlator.next_deadline());

        assert!(correlator.expire(now + Duration::from_millis(99)).is_empty());

        assert_eq!(
            vec![Expired {
                id,
                opcode: ADV_ENABLE,
                was_sent: true
            }],
            correlator.expire(now + Duration::from_millis(100))
        );

        assert_eq!(Ok(Err(CommandError::TimedOut)), receiver.try_recv());

        // a new command with the same opcode waits for the late response
        let (_, mut next) = submit(&mut correlator, ADV_ENABLE, now);

        assert_eq!(None, correlator.next_dispatch());

        assert!(matches!(
            correlator.on_response(complete(ADV_ENABLE), 1),
            Correlation::Late(ADV_ENABLE)
        ));

        assert_eq!(Err(TryRecvError::Empty), next.try_recv());

        assert_eq!(Some(packet(ADV_ENABLE)), correlator.next_dispatch());

        match correlator.on_response(complete(ADV_ENABLE), 1) {
            Correlation::Matched(matched) => matched.deliver(),
            c => panic!("unexpected correlation {:?}", c),
        }

        assert!(next.try_recv().unwrap().is_ok());
    }

    #[test]
    fn lost_response_does_not_block_the_opcode() {
        let timeout = Duration::from_millis(100);

        let start = Instant::now();

        let mut correlator = Correlator::new(4);

        let (_, mut lost) = correlator
            .submit(ADV_ENABLE, packet(ADV_ENABLE), timeout, "tag", start)
            .unwrap();

        correlator.next_dispatch();

        assert_eq!(1, correlator.expire(start + timeout).len());
        assert_eq!(Ok(Err(CommandError::TimedOut)), lost.try_recv());

        // the retry is held back until no late response is expected
        let (_, mut retry) = submit(&mut correlator, ADV_ENABLE, start + timeout);

        assert_eq!(None, correlator.next_dispatch());
        assert_eq!(Some(start + timeout * 2), correlator.next_deadline());

        assert!(correlator.expire(start + timeout * 2).is_empty());

        // every retry from now on gets its own response
        for round in 0..3 {
            assert_eq!(Some(packet(ADV_ENABLE)), correlator.next_dispatch(), "round {}", round);

            match correlator.on_response(complete(ADV_ENABLE), 1) {
                Correlation::Matched(matched) => matched.deliver(),
                c => panic!("round {}: unexpected correlation {:?}", round, c),
            }

            assert!(retry.try_recv().unwrap().is_ok());

            retry = submit(&mut correlator, ADV_ENABLE, start + timeout * 2).1;
        }
    }

    #[test]
    fn held_command_keeps_fifo_order() {
        let timeout = Duration::from_millis(100);

        let start = Instant::now();

        let mut correlator = Correlator::new(4);

        correlator
            .submit(ADV_ENABLE, packet(ADV_ENABLE), timeout, "tag", start)
            .unwrap();

        correlator.next_dispatch();

        correlator.expire(start + timeout);

        submit(&mut correlator, ADV_ENABLE, start + timeout);
        submit(&mut correlator, SCAN_ENABLE, start + timeout);

        assert_eq!(None, correlator.next_dispatch());

        correlator.expire(start + timeout * 2);

        assert_eq!(Some(packet(ADV_ENABLE)), correlator.next_dispatch());
    }

    #[test]
    fn unsent_command_is_aborted() {
        let mut correlator = Correlator::new(4);

        let (id, mut receiver) = submit(&mut correlator, RESET, Instant::now());

        correlator.next_dispatch();

        assert_eq!(Some(id), correlator.abort_in_flight(CommandError::Closed));
        assert_eq!(Ok(Err(CommandError::Closed)), receiver.try_recv());
        assert_eq!(None, correlator.in_flight_opcode());
        assert_eq!(None, correlator.abort_in_flight(CommandError::Closed));
    }

    #[test]
    fn queued_commands_time_out() {
        let now = Instant::now();

        let mut correlator = Correlator::new(4);

        submit(&mut correlator, RESET, now);

        correlator.next_dispatch();

        let (id, _receiver) = correlator
            .submit(ADV_ENABLE, packet(ADV_ENABLE), Duration::from_millis(10), "tag", now)
            .unwrap();

        let expired = correlator.expire(now + Duration::from_millis(10));

        assert_eq!(
            vec![Expired {
                id,
                opcode: ADV_ENABLE,
                was_sent: false
            }],
            expired
        );

        assert_eq!(Some(RESET), correlator.in_flight_opcode());
    }

    #[test]
    fn asymmetric_cancellation() {
        let now = Instant::now();

        let mut correlator = Correlator::new(4);

        let (sent, _) = submit(&mut correlator, RESET, now);
        let (queued, mut receiver) = submit(&mut correlator, ADV_ENABLE, now);

        correlator.next_dispatch();

        assert_eq!(Err(CancelError::AlreadySent), correlator.cancel(sent));
        assert_eq!(Ok(()), correlator.cancel(queued));
        assert_eq!(Err(CancelError::NotFound), correlator.cancel(queued));
        assert_eq!(Ok(Err(CommandError::Cancelled)), receiver.try_recv());
        assert_eq!(0, correlator.queued());
    }

    #[test]
    fn abort_on_reset() {
        let now = Instant::now();

        let mut correlator = Correlator::new(4);

        let (_, mut first) = submit(&mut correlator, RESET, now);
        let (_, mut second) = submit(&mut correlator, ADV_ENABLE, now);

        correlator.next_dispatch();

        assert_eq!(2, correlator.abort_all());
        assert_eq!(Ok(Err(CommandError::Aborted)), first.try_recv());
        assert_eq!(Ok(Err(CommandError::Aborted)), second.try_recv());
        assert_eq!(None, correlator.next_deadline());
    }

    #[test]
    fn credit_withheld_by_controller() {
        let now = Instant::now();

        let mut correlator = Correlator::new(4);

        submit(&mut correlator, RESET, now);

        correlator.next_dispatch();

        submit(&mut correlator, ADV_ENABLE, now);

        assert!(matches!(correlator.on_response(complete(RESET), 0), Correlation::Matched(_)));
        assert_eq!(None, correlator.next_dispatch());

        assert!(matches!(correlator.on_response(None, 1), Correlation::CreditOnly));
        assert_eq!(Some(packet(ADV_ENABLE)), correlator.next_dispatch());
    }

    #[test]
    fn receiver_wakes_on_delivery() {
        let now = Instant::now();

        let mut correlator = Correlator::new(4);

        let (_, receiver) = submit(&mut correlator, RESET, now);

        correlator.next_dispatch();

        let mut task = tokio_test::task::spawn(receiver);

        assert_pending!(task.poll());

        if let Correlation::Matched(matched) = correlator.on_response(complete(RESET), 1) {
            matched.deliver();
        }

        assert!(task.is_woken());

        let result = assert_ready!(task.poll());

        assert_eq!(Ok(Ok(CommandResponse::Complete {
            opcode: RESET,
            return_parameter: vec![0x00]
        })), result);
    }

    #[test]
    fn controller_status() {
        let response = CommandResponse::Status {
            opcode: 0x200D,
            status: Error::CommandDisallowed,
        };

        assert_eq!(Err(CommandError::Controller(Error::CommandDisallowed)), response.into_result());
    }
}
