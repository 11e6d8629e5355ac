use arrayvec::ArrayVec;
use byteorder::{BigEndian, ByteOrder};
use embedded_hal::serial::{Read, Write};
use nb::block;
use tracing::{debug, trace};

use crate::commands::Command;
use crate::responses::{
    AckResult, ConfirmationCode, IndexTable, IndexTableResult, MatchResult, ReadSysParaResult,
    Reply, SearchResult, SystemParameters, TemplateNumResult,
};
use crate::utils::{elapsed, Clock, CommandWriter, Error, FromPayload, ToPayload};

/// First two bytes of every packet.
pub const HEADER: [u8; 2] = [0xEF, 0x01];

/// Address every module answers to out of the box.
pub const DEFAULT_ADDRESS: u32 = 0xFFFF_FFFF;

pub const PID_COMMAND: u8 = 0x01;
pub const PID_ACK: u8 = 0x07;

/// header [2] + address [4] + packet id [1] + length [2]
const PREAMBLE_LEN: usize = 9;

/// Encoded command packet.
pub type Packet = ArrayVec<[u8; 32]>;

/// Represents a ZW101 connected to a U(S)ART.
#[derive(Debug)]
pub struct Zw101<TX, RX, CLK> {
    tx: TX,
    rx: RX,
    clock: CLK,
    address: u32,
    received: ArrayVec<[u8; 64]>,
    cmd_buffer: Packet,
}

impl<TX, RX, CLK> Zw101<TX, RX, CLK>
where TX: Write<u8>,
      RX: Read<u8>,
      CLK: Clock
{
    pub fn new(tx: TX, rx: RX, clock: CLK, address: u32) -> Self {
        Self {
            tx: tx,
            rx: rx,
            clock: clock,
            address: address,
            received: ArrayVec::<[u8; 64]>::new(),
            cmd_buffer: Packet::new(),
        }
    }

    pub fn address(&self) -> u32 {
        return self.address;
    }

    pub fn clock(&self) -> &CLK {
        return &self.clock;
    }

    /// Gives back the serial halves and the clock.
    pub fn release(self) -> (TX, RX, CLK) {
        return (self.tx, self.rx, self.clock);
    }

    /// Sends a command to the ZW101 and then blocks waiting for the reply, for at most the
    /// command's own reply timeout.
    pub fn send_command(&mut self, cmd: Command) -> Result<Reply, Error> {
        let timeout_ms = cmd.reply_timeout_ms();
        return self.send_command_with_timeout(cmd, timeout_ms);
    }

    pub fn send_command_with_timeout(&mut self, cmd: Command, timeout_ms: u32) -> Result<Reply, Error> {
        if !cmd.expects_reply() {
            return Err(Error::NoReply(cmd.code()));
        }
        self.send(cmd)?;
        self.receive(timeout_ms)?;
        let reply = self.parse_reply(&cmd)?;
        debug!(command = ?cmd, code = ?reply.confirmation_code(), "reply received");
        return Ok(reply);
    }

    /// Writes a command without waiting for any reply. Whatever is still sitting in the RX
    /// buffer (typically the answer to an earlier fire-and-forget command) is discarded first.
    pub fn send(&mut self, cmd: Command) -> Result<(), Error> {
        self.cmd_buffer = encode_packet(self.address, &cmd)?;
        self.drain()?;
        trace!(command = ?cmd, packet = ?&self.cmd_buffer[..], "sending");

        for byte in self.cmd_buffer.iter() {
            block!(self.tx.write(*byte)).map_err(|_| Error::SerialWrite)?;
        }
        block!(self.tx.flush()).map_err(|_| Error::SerialWrite)?;
        return Ok(());
    }

    /// Reads and drops bytes until the RX half has nothing more to give.
    fn drain(&mut self) -> Result<(), Error> {
        let mut dropped = 0usize;
        loop {
            match self.rx.read() {
                Ok(_) => dropped += 1,
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(_)) => return Err(Error::SerialRead),
            }
        }
        if dropped > 0 {
            debug!(dropped, "discarded stale bytes");
        }
        return Ok(());
    }

    /// Reads one reply packet into `received`. Bytes preceding the `EF 01` header are dropped.
    fn receive(&mut self, timeout_ms: u32) -> Result<(), Error> {
        self.received.clear();
        let start = self.clock.now_ms();
        let mut expected = PREAMBLE_LEN;

        loop {
            if self.received.len() == expected {
                if expected > PREAMBLE_LEN {
                    trace!(packet = ?&self.received[..], "received");
                    return Ok(());
                }

                // Length covers payload and checksum; the payload holds at least the
                // confirmation code.
                let length = BigEndian::read_u16(&self.received[7..9]) as usize;
                if length < 3 {
                    return Err(Error::TruncatedReply { expected: 1, actual: length.saturating_sub(2) });
                }
                expected = PREAMBLE_LEN + length;
                if expected > self.received.capacity() {
                    return Err(Error::ReplyTooLarge(expected));
                }
                continue;
            }

            if elapsed(self.clock.now_ms(), start) >= timeout_ms {
                return Err(Error::Timeout { timeout_ms, received: self.received.len() });
            }

            match self.rx.read() {
                Ok(byte) => {
                    if self.received.is_empty() && byte != HEADER[0] {
                        trace!(byte, "skipping byte before header");
                        continue;
                    }
                    if self.received.len() == 1 && byte != HEADER[1] {
                        // The 0xEF was noise; a repeated 0xEF may still start the real header.
                        trace!(byte, "false header start");
                        self.received.clear();
                        if byte == HEADER[0] {
                            self.received.push(byte);
                        }
                        continue;
                    }
                    self.received.push(byte);
                },
                Err(nb::Error::WouldBlock) => {},
                Err(nb::Error::Other(_)) => return Err(Error::SerialRead),
            }
        }
    }

    fn parse_reply(&self, cmd: &Command) -> Result<Reply, Error> {
        let packet = &self.received[..];
        let end = packet.len() - 2;

        if packet[6] != PID_ACK {
            return Err(Error::UnexpectedPacket(packet[6]));
        }
        let address = BigEndian::read_u32(&packet[2..6]);
        if address != self.address {
            return Err(Error::AddressMismatch { expected: self.address, actual: address });
        }
        let received_checksum = BigEndian::read_u16(&packet[end..]);
        let computed = checksum(&packet[6..end]);
        if computed != received_checksum {
            return Err(Error::ChecksumMismatch { computed, received: received_checksum });
        }

        let confirmation_code = ConfirmationCode::from(packet[PREAMBLE_LEN]);
        let data = &packet[PREAMBLE_LEN + 1..end];
        let need = match cmd {
            Command::ReadSysPara => 16,
            Command::Match | Command::ValidTempleteNum => 2,
            Command::Search { .. } => 4,
            Command::ReadIndexTable { .. } => 32,
            _ => 0,
        };

        if data.len() < need {
            // A failed command may come back without its data fields.
            if confirmation_code != ConfirmationCode::Success {
                return Ok(Reply::Ack(AckResult { address, confirmation_code, checksum: received_checksum }));
            }
            return Err(Error::TruncatedReply { expected: need + 1, actual: data.len() + 1 });
        }

        let reply = match cmd {
            Command::ReadSysPara => Reply::ReadSysPara(ReadSysParaResult {
                address,
                confirmation_code,
                system_parameters: SystemParameters::from_payload(data),
                checksum: received_checksum,
            }),
            Command::Match => Reply::Match(MatchResult {
                address,
                confirmation_code,
                match_score: BigEndian::read_u16(&data[0..2]),
                checksum: received_checksum,
            }),
            Command::Search { .. } => Reply::Search(SearchResult {
                address,
                confirmation_code,
                match_page: BigEndian::read_u16(&data[0..2]),
                match_score: BigEndian::read_u16(&data[2..4]),
                checksum: received_checksum,
            }),
            Command::ValidTempleteNum => Reply::ValidTempleteNum(TemplateNumResult {
                address,
                confirmation_code,
                template_num: BigEndian::read_u16(&data[0..2]),
                checksum: received_checksum,
            }),
            Command::ReadIndexTable { .. } => Reply::ReadIndexTable(IndexTableResult {
                address,
                confirmation_code,
                index_table: IndexTable::from_payload(data),
                checksum: received_checksum,
            }),
            _ => Reply::Ack(AckResult { address, confirmation_code, checksum: received_checksum }),
        };
        return Ok(reply);
    }
}

/// Wrapping 16-bit sum of the bytes, as carried in the last two bytes of a packet. Covers the
/// packet identifier, the length and the payload.
pub fn checksum(bytes: &[u8]) -> u16 {
    let mut checksum = 0u16;
    for byte in bytes {
        checksum = checksum.wrapping_add(*byte as u16);
    }
    return checksum;
}

/// Builds the complete command packet for `cmd`:
///
/// ```text
/// headr  | 0xEF 0x01 [2]
/// addr   | address [4]
/// ident  | 0x01 [1]
/// length | payload + 2 [2]
/// instr  | code + params [n]
/// chksum | checksum [2]
/// ```
pub fn encode_packet(address: u32, cmd: &Command) -> Result<Packet, Error> {
    let mut payload = PayloadBuffer::default();
    cmd.to_payload(&mut payload);
    if payload.overflowed {
        return Err(Error::PacketTooLarge);
    }

    let mut packet = Packet::new();
    let length = (payload.bytes.len() + 2) as u16;
    let mut extend = |bytes: &[u8]| packet.try_extend_from_slice(bytes).map_err(|_| Error::PacketTooLarge);
    extend(&HEADER)?;
    extend(&address.to_be_bytes()[..])?;
    extend(&[PID_COMMAND])?;
    extend(&length.to_be_bytes()[..])?;
    extend(&payload.bytes[..])?;

    let chk = checksum(&packet[6..]);
    packet.try_extend_from_slice(&chk.to_be_bytes()[..]).map_err(|_| Error::PacketTooLarge)?;
    return Ok(packet);
}

#[derive(Default)]
struct PayloadBuffer {
    bytes: ArrayVec<[u8; 16]>,
    overflowed: bool,
}

impl CommandWriter for PayloadBuffer {
    fn write_cmd_bytes(&mut self, bytes: &[u8]) {
        if self.bytes.try_extend_from_slice(bytes).is_err() {
            self.overflowed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ack_frame, MockClock, MockUart};
    use alloc::vec;

    fn device(uart: &MockUart) -> Zw101<crate::mock::MockTx, crate::mock::MockRx, MockClock> {
        let (tx, rx) = uart.split();
        return Zw101::new(tx, rx, MockClock::ticking(1), DEFAULT_ADDRESS);
    }

    #[test]
    fn handshake_packet_bytes() {
        let packet = encode_packet(DEFAULT_ADDRESS, &Command::HandShake).unwrap();
        assert_eq!(
            &packet[..],
            &[0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x03, 0x35, 0x00, 0x39]
        );
    }

    #[test]
    fn length_field_tracks_payload() {
        let packet = encode_packet(
            DEFAULT_ADDRESS,
            &Command::ControlBLN { function: 4, start_color: 0, end_color: 0, loops: 0, cycle: 0x0F },
        )
        .unwrap();
        assert_eq!(packet.len(), 18);
        assert_eq!(&packet[7..9], &[0x00, 0x09]);
        let chk = 0x01u16 + 0x09 + 0x3C + 0x04 + 0x0F;
        assert_eq!(&packet[16..], &chk.to_be_bytes()[..]);
    }

    #[test]
    fn store_packet_checksum() {
        let packet = encode_packet(DEFAULT_ADDRESS, &Command::StoreChar { buffer: 1, page: 0x0102 }).unwrap();
        assert_eq!(&packet[9..13], &[0x06, 0x01, 0x01, 0x02]);
        let chk = 0x01u16 + 0x06 + 0x06 + 0x01 + 0x01 + 0x02;
        assert_eq!(BigEndian::read_u16(&packet[13..15]), chk);
    }

    #[test]
    fn writes_packet_and_parses_ack() {
        let uart = MockUart::new();
        uart.queue(&ack_frame(DEFAULT_ADDRESS, 0x00, &[]));
        let mut zw = device(&uart);

        let reply = zw.send_command(Command::HandShake).unwrap();
        assert!(reply.is_success());
        assert_eq!(uart.written_codes(), vec![0x35]);
    }

    #[test]
    fn parses_search_reply() {
        let uart = MockUart::new();
        uart.queue(&ack_frame(DEFAULT_ADDRESS, 0x00, &[0x00, 0x05, 0x00, 0x64]));
        let mut zw = device(&uart);

        match zw.send_command(Command::Search { buffer: 1, start_page: 0, page_num: 50 }) {
            Ok(Reply::Search(result)) => {
                assert_eq!(result.match_page, 5);
                assert_eq!(result.match_score, 100);
            },
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn skips_noise_before_header() {
        let uart = MockUart::new();
        uart.queue(&[0x00, 0x55]);
        uart.queue(&ack_frame(DEFAULT_ADDRESS, 0x00, &[0x00, 0x07]));
        let mut zw = device(&uart);

        match zw.send_command(Command::ValidTempleteNum) {
            Ok(Reply::ValidTempleteNum(result)) => assert_eq!(result.template_num, 7),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn resyncs_after_stray_header_byte() {
        let uart = MockUart::new();
        uart.queue(&[0xEF]);
        uart.queue(&ack_frame(DEFAULT_ADDRESS, 0x00, &[0x00, 0x03]));
        let mut zw = device(&uart);
        zw.receive(100).unwrap();

        match zw.parse_reply(&Command::ValidTempleteNum) {
            Ok(Reply::ValidTempleteNum(result)) => assert_eq!(result.template_num, 3),
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(uart.pending_replies(), 0);
    }

    #[test]
    fn skips_false_header_start() {
        let uart = MockUart::new();
        uart.queue(&[0xEF, 0x42]);
        uart.queue(&ack_frame(DEFAULT_ADDRESS, 0x00, &[]));
        let mut zw = device(&uart);
        zw.receive(100).unwrap();

        assert!(zw.parse_reply(&Command::HandShake).unwrap().is_success());
    }

    #[test]
    fn stale_ack_of_unawaited_command_is_discarded() {
        let uart = MockUart::new();
        let mut zw = device(&uart);

        uart.ack_next(0x00, &[]);
        zw.send(Command::ControlBLN { function: 4, start_color: 0, end_color: 0, loops: 0, cycle: 0x0F })
            .unwrap();
        assert_eq!(uart.pending_replies(), 1);

        uart.ack_next(0x00, &[0x00, 0x02, 0x00, 0x40]);
        match zw.send_command(Command::Search { buffer: 1, start_page: 0, page_num: 50 }) {
            Ok(Reply::Search(result)) => {
                assert_eq!(result.match_page, 2);
                assert_eq!(result.match_score, 64);
            },
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn rejects_corrupt_checksum() {
        let uart = MockUart::new();
        let mut frame = ack_frame(DEFAULT_ADDRESS, 0x00, &[]);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        uart.queue(&frame);
        let mut zw = device(&uart);

        assert!(matches!(zw.send_command(Command::HandShake), Err(Error::ChecksumMismatch { .. })));
    }

    #[test]
    fn rejects_foreign_address() {
        let uart = MockUart::new();
        uart.queue(&ack_frame(0x1234_5678, 0x00, &[]));
        let mut zw = device(&uart);

        assert_eq!(
            zw.send_command(Command::HandShake),
            Err(Error::AddressMismatch { expected: DEFAULT_ADDRESS, actual: 0x1234_5678 })
        );
    }

    #[test]
    fn times_out_without_reply() {
        let uart = MockUart::new();
        let mut zw = device(&uart);

        assert!(matches!(
            zw.send_command_with_timeout(Command::GetImage, 50),
            Err(Error::Timeout { timeout_ms: 50, received: 0 })
        ));
    }

    #[test]
    fn failed_search_without_data_is_ack() {
        let uart = MockUart::new();
        uart.queue(&ack_frame(DEFAULT_ADDRESS, 0x09, &[]));
        let mut zw = device(&uart);

        let reply = zw.send_command(Command::Search { buffer: 1, start_page: 0, page_num: 50 }).unwrap();
        assert_eq!(reply.confirmation_code(), ConfirmationCode::NotFound);
    }

    #[test]
    fn short_successful_reply_is_error() {
        let uart = MockUart::new();
        uart.queue(&ack_frame(DEFAULT_ADDRESS, 0x00, &[0x00]));
        let mut zw = device(&uart);

        assert!(matches!(zw.send_command(Command::ValidTempleteNum), Err(Error::TruncatedReply { .. })));
    }

    #[test]
    fn fire_and_forget_commands_cannot_be_awaited() {
        let uart = MockUart::new();
        let mut zw = device(&uart);

        assert_eq!(zw.send_command(Command::Cancel), Err(Error::NoReply(0x30)));
        zw.send(Command::Cancel).unwrap();
        assert_eq!(uart.written_codes(), vec![0x30]);
    }
}
