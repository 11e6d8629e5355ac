//! In-memory UART and clock for exercising the driver without a module attached. Test
//! support only; hidden from the documented API.
//!
//! [`MockUart`] is a shared handle: split it into TX/RX halves for the driver and keep the
//! handle to script replies and inspect what was written.

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::convert::Infallible;

use byteorder::{BigEndian, ByteOrder};
use embedded_hal::serial::{Read, Write};

use crate::driver::{checksum, HEADER, PID_ACK};
use crate::utils::Clock;

#[derive(Debug, Default)]
struct UartState {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    /// Replies released one at a time, each time a command packet is flushed.
    scripted: VecDeque<Vec<u8>>,
    /// Start of the bytes not yet flushed.
    flushed: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MockUart {
    state: Rc<RefCell<UartState>>,
}

#[derive(Debug)]
pub struct MockTx(Rc<RefCell<UartState>>);

#[derive(Debug)]
pub struct MockRx(Rc<RefCell<UartState>>);

impl MockUart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn split(&self) -> (MockTx, MockRx) {
        (MockTx(self.state.clone()), MockRx(self.state.clone()))
    }

    /// Makes bytes readable immediately.
    pub fn queue(&self, bytes: &[u8]) {
        self.state.borrow_mut().rx.extend(bytes.iter().copied());
    }

    /// Makes `bytes` readable once the next command packet has been flushed. Scripted replies
    /// are released in order, one per command.
    pub fn reply_next(&self, bytes: &[u8]) {
        self.state.borrow_mut().scripted.push_back(bytes.to_vec());
    }

    /// Scripts an acknowledgement from the default address.
    pub fn ack_next(&self, code: u8, data: &[u8]) {
        self.reply_next(&ack_frame(crate::driver::DEFAULT_ADDRESS, code, data));
    }

    /// Scripts silence for the next command; the driver will time out.
    pub fn silence_next(&self) {
        self.reply_next(&[]);
    }

    pub fn written(&self) -> Vec<u8> {
        self.state.borrow().tx.clone()
    }

    pub fn clear_written(&self) {
        let mut state = self.state.borrow_mut();
        state.tx.clear();
        state.flushed = 0;
    }

    /// Instruction codes of every command packet written so far, in order.
    pub fn written_codes(&self) -> Vec<u8> {
        return written_packets(&self.state.borrow().tx)
            .iter()
            .map(|payload| payload[0])
            .collect();
    }

    /// Payloads (instruction code and parameters) of every command packet written so far.
    pub fn written_payloads(&self) -> Vec<Vec<u8>> {
        return written_packets(&self.state.borrow().tx);
    }

    pub fn pending_replies(&self) -> usize {
        let state = self.state.borrow();
        return state.scripted.len() + if state.rx.is_empty() { 0 } else { 1 };
    }
}

fn written_packets(bytes: &[u8]) -> Vec<Vec<u8>> {
    let mut packets = Vec::new();
    let mut rest = bytes;
    while rest.len() >= 9 {
        let length = BigEndian::read_u16(&rest[7..9]) as usize;
        if rest.len() < 9 + length || length < 3 {
            break;
        }
        packets.push(rest[9..9 + length - 2].to_vec());
        rest = &rest[9 + length..];
    }
    return packets;
}

impl Write<u8> for MockTx {
    type Error = Infallible;

    fn write(&mut self, word: u8) -> nb::Result<(), Self::Error> {
        self.0.borrow_mut().tx.push(word);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        let mut state = self.0.borrow_mut();
        let packets = written_packets(&state.tx[state.flushed..]);
        state.flushed = state.tx.len();

        for _ in packets {
            if let Some(reply) = state.scripted.pop_front() {
                state.rx.extend(reply);
            }
        }
        Ok(())
    }
}

impl Read<u8> for MockRx {
    type Error = Infallible;

    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        match self.0.borrow_mut().rx.pop_front() {
            Some(byte) => Ok(byte),
            None => Err(nb::Error::WouldBlock),
        }
    }
}

/// Builds an acknowledgement packet carrying `code` followed by `data`.
pub fn ack_frame(address: u32, code: u8, data: &[u8]) -> Vec<u8> {
    let length = (data.len() + 3) as u16;
    let mut frame = Vec::with_capacity(data.len() + 12);
    frame.extend_from_slice(&HEADER);
    frame.extend_from_slice(&address.to_be_bytes());
    frame.push(PID_ACK);
    frame.extend_from_slice(&length.to_be_bytes());
    frame.push(code);
    frame.extend_from_slice(data);
    let chk = checksum(&frame[6..]);
    frame.extend_from_slice(&chk.to_be_bytes());
    return frame;
}

/// Manually driven millisecond clock. With a non-zero step every reading advances time, so
/// reply timeouts expire even when nobody calls [`MockClock::advance`].
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    now: Rc<Cell<u32>>,
    step: u32,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticking(step: u32) -> Self {
        Self { now: Rc::new(Cell::new(0)), step }
    }

    pub fn set(&self, ms: u32) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> u32 {
        let now = self.now.get();
        self.now.set(now.wrapping_add(self.step));
        return now;
    }
}
