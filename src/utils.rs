use thiserror::Error;

pub trait FromPayload: Sized {
    fn from_payload(payload: &[u8]) -> Self;
}

pub trait CommandWriter {
    fn write_cmd_bytes(&mut self, bytes: &[u8]);
}

pub trait ToPayload {
    fn to_payload(&self, writer: &mut dyn CommandWriter);
}

/// Millisecond time source. The counter is allowed to wrap; all elapsed-time
/// arithmetic in this crate uses `wrapping_sub`.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u32 {
        return (**self).now_ms();
    }
}

/// Milliseconds elapsed between `since` and `now`, tolerant of counter wrap.
pub(crate) fn elapsed(now: u32, since: u32) -> u32 {
    return now.wrapping_sub(since);
}

/// Errors raised while talking to the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// The TX half refused a byte or the flush failed.
    #[error("serial write failed")]
    SerialWrite,

    /// The RX half reported an error other than `WouldBlock`.
    #[error("serial read failed")]
    SerialRead,

    /// No complete reply arrived in time.
    #[error("no reply after {timeout_ms}ms ({received} bytes received)")]
    Timeout { timeout_ms: u32, received: usize },

    /// The reply came from another address than the one we talk to.
    #[error("reply from address {actual:#010x}, expected {expected:#010x}")]
    AddressMismatch { expected: u32, actual: u32 },

    /// The reply was not an acknowledgement packet.
    #[error("unexpected packet identifier {0:#04x}")]
    UnexpectedPacket(u8),

    #[error("checksum mismatch: computed {computed:#06x}, received {received:#06x}")]
    ChecksumMismatch { computed: u16, received: u16 },

    /// The payload is shorter than the reply to the command requires.
    #[error("reply payload too short: {actual} bytes, need {expected}")]
    TruncatedReply { expected: usize, actual: usize },

    /// The reply announced more bytes than the receive buffer holds.
    #[error("reply length {0} exceeds receive buffer")]
    ReplyTooLarge(usize),

    /// The encoded command does not fit the transmit buffer.
    #[error("command packet exceeds transmit buffer")]
    PacketTooLarge,

    /// The module answered with a non-success confirmation code.
    #[error("module rejected the command with code {0:#04x}")]
    Rejected(u8),

    /// Another enrollment or automatic mode is already running.
    #[error("operation already in progress")]
    Busy,

    /// The command does not produce a reply that can be awaited.
    #[error("command {0:#04x} has no awaitable reply")]
    NoReply(u8),
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn elapsed_survives_wrap() {
        assert_eq!(elapsed(5, u32::MAX - 4), 10);
        assert_eq!(elapsed(1500, 500), 1000);
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            Error::Timeout { timeout_ms: 500, received: 3 }.to_string(),
            "no reply after 500ms (3 bytes received)"
        );
        assert_eq!(
            Error::ChecksumMismatch { computed: 0x0a, received: 0x0b }.to_string(),
            "checksum mismatch: computed 0x000a, received 0x000b"
        );
        assert_eq!(Error::UnexpectedPacket(0x02).to_string(), "unexpected packet identifier 0x02");
    }
}
