use std::mem;

/// Accumulates wire lines into size-bounded outgoing packets.
///
/// The buffer holds whole lines only. A line that would push the buffer past
/// the packet limit forces the current contents out first, so no emitted
/// packet exceeds the limit as long as individual lines fit within it. A line
/// longer than the limit by itself is still accepted into an empty buffer and
/// goes out alone on the next flush -- lines are never split across packets,
/// and never silently discarded here.
pub(crate) struct PacketBuffer {
    buf: Vec<u8>,
    max_packet_len: usize,
}

impl PacketBuffer {
    pub fn new(max_packet_len: usize) -> Self {
        PacketBuffer { buf: Vec::with_capacity(max_packet_len), max_packet_len }
    }

    /// Appends `line` to the buffer, first taking the accumulated packet if
    /// the line no longer fits alongside it.
    ///
    /// The returned packet, if any, must be handed to the network by the
    /// caller before anything else happens to the buffer.
    pub fn push(&mut self, line: &str) -> Option<Vec<u8>> {
        let flushed = if !self.buf.is_empty() && self.would_overflow(line) {
            Some(self.swap_out())
        } else {
            None
        };

        self.buf.extend_from_slice(line.as_bytes());
        flushed
    }

    /// Takes the accumulated packet for a timer-driven flush.
    ///
    /// An empty buffer yields nothing: flushing it would put a zero-byte
    /// datagram on the wire.
    pub fn take(&mut self) -> Option<Vec<u8>> {
        if self.buf.is_empty() {
            None
        } else {
            Some(self.swap_out())
        }
    }

    fn would_overflow(&self, line: &str) -> bool {
        self.buf.len() + line.len() > self.max_packet_len
    }

    fn swap_out(&mut self) -> Vec<u8> {
        mem::replace(&mut self.buf, Vec::with_capacity(self.max_packet_len))
    }
}
