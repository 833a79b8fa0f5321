use std::{
    io,
    net::{Ipv4Addr, UdpSocket},
};

use crossbeam_channel::{after, select, tick, Receiver};
use tracing::{debug, warn};

use crate::{forwarder::ForwarderConfiguration, packet::PacketBuffer};

/// The outbound socket, connected to the collector.
///
/// Exactly one `Client` exists at a time; it lives for one streaming epoch and
/// is recreated from scratch on every reconnect attempt.
struct Client {
    socket: UdpSocket,
}

impl Client {
    fn connect(config: &ForwarderConfiguration) -> io::Result<Self> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.connect(&config.remote_addr.0[..])?;
        socket.set_write_timeout(Some(config.write_timeout))?;
        Ok(Client { socket })
    }

    fn send(&self, packet: &[u8]) -> io::Result<usize> {
        self.socket.send(packet)
    }
}

/// Forwarder phases.
///
/// Every transition is driven by one of the phase methods on [`Forwarder`];
/// `run` just executes whichever phase it is handed next.
enum Phase {
    /// Attempting to open a connection to the collector.
    Connect,

    /// Connected; batching queued lines into packets.
    Stream(Client),

    /// Disconnected; draining the queue until the reconnect cooldown elapses.
    Wait,

    /// The queue has closed; the forwarder is finished.
    Quit,
}

/// Consumes the line queue and relays size-bounded packets to the collector.
///
/// The forwarder is the sole reader of the queue and the sole owner of the
/// socket, so flushes never race. It runs until the queue closes; network
/// failures are absorbed by the wait/reconnect cycle and never propagate.
pub(crate) struct Forwarder {
    config: ForwarderConfiguration,
    lines: Receiver<String>,
}

impl Forwarder {
    pub fn new(config: ForwarderConfiguration, lines: Receiver<String>) -> Self {
        Forwarder { config, lines }
    }

    /// Runs the forwarder until the line queue closes.
    pub fn run(self) {
        let mut phase = Phase::Connect;
        loop {
            phase = match phase {
                Phase::Connect => self.connect(),
                Phase::Stream(client) => self.stream(&client),
                Phase::Wait => self.wait(),
                Phase::Quit => break,
            };
        }
        debug!("Line queue closed, forwarder shutting down.");
    }

    fn connect(&self) -> Phase {
        match Client::connect(&self.config) {
            Ok(client) => {
                debug!("Connected to statsd collector.");
                Phase::Stream(client)
            }
            Err(e) => {
                warn!(error = %e, "Failed to connect to statsd collector.");
                Phase::Wait
            }
        }
    }

    fn stream(&self, client: &Client) -> Phase {
        // A fresh buffer and flush timer for this connection epoch. The flush
        // cadence is independent of the sampling interval.
        let mut packet = PacketBuffer::new(self.config.max_packet_len);
        let flush = tick(self.config.flush_interval);

        loop {
            select! {
                recv(self.lines) -> line => match line {
                    Ok(line) => {
                        if let Some(full) = packet.push(&line) {
                            if let Err(e) = client.send(&full) {
                                warn!(error = %e, "Failed to write to statsd collector.");
                                return Phase::Wait;
                            }
                        }
                    }
                    // End of stream: whatever is still buffered is accepted
                    // loss, and there is nothing left to reconnect for.
                    Err(_) => return Phase::Quit,
                },
                recv(flush) -> _ => {
                    if let Some(full) = packet.take() {
                        if let Err(e) = client.send(&full) {
                            warn!(error = %e, "Failed to flush to statsd collector.");
                            return Phase::Wait;
                        }
                    }
                }
            }
        }
    }

    fn wait(&self) -> Phase {
        let cooldown = after(self.config.reconnect_cooldown);

        loop {
            select! {
                // Keep draining so the queue cannot back up while the
                // collector is unreachable. The lines are discarded.
                recv(self.lines) -> line => {
                    if line.is_err() {
                        return Phase::Quit;
                    }
                }
                recv(cooldown) -> _ => return Phase::Connect,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        net::UdpSocket,
        thread,
        time::{Duration, Instant},
    };

    use super::{Client, Forwarder, Phase};
    use crate::{
        forwarder::{ForwarderConfiguration, RemoteAddr},
        queue::line_queue,
    };

    fn test_config(remote: &UdpSocket) -> ForwarderConfiguration {
        ForwarderConfiguration {
            remote_addr: RemoteAddr(vec![remote.local_addr().unwrap()]),
            max_packet_len: 1400,
            flush_interval: Duration::from_millis(10),
            reconnect_cooldown: Duration::from_millis(50),
            write_timeout: Duration::from_secs(1),
        }
    }

    fn loopback_listener() -> UdpSocket {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        socket
    }

    fn recv_packet(socket: &UdpSocket) -> Vec<u8> {
        let mut buf = [0u8; 2048];
        let len = socket.recv(&mut buf).unwrap();
        buf[..len].to_vec()
    }

    #[test]
    fn connect_failure_transitions_to_wait() {
        let listener = loopback_listener();
        let mut config = test_config(&listener);
        // An empty candidate list makes the connect attempt fail immediately.
        config.remote_addr = RemoteAddr(Vec::new());

        let (_tx, rx) = line_queue(4);
        let forwarder = Forwarder::new(config, rx);

        assert!(matches!(forwarder.connect(), Phase::Wait));
    }

    #[test]
    fn wait_drains_the_queue_and_reconnects_after_cooldown() {
        let listener = loopback_listener();
        let config = test_config(&listener);
        let cooldown = config.reconnect_cooldown;

        let (tx, rx) = line_queue(8);
        tx.push("one\n".to_string());
        tx.push("two\n".to_string());
        tx.push("three\n".to_string());

        let forwarder = Forwarder::new(config, rx);

        let start = Instant::now();
        let next = forwarder.wait();

        assert!(matches!(next, Phase::Connect));
        assert!(start.elapsed() >= cooldown);
        // Everything queued while waiting was discarded.
        assert!(forwarder.lines.is_empty());
    }

    #[test]
    fn wait_quits_when_the_queue_closes() {
        let listener = loopback_listener();
        let config = test_config(&listener);

        let (tx, rx) = line_queue(4);
        drop(tx);

        let forwarder = Forwarder::new(config, rx);
        assert!(matches!(forwarder.wait(), Phase::Quit));
    }

    #[test]
    fn stream_flushes_on_overflow_and_quits_at_close() {
        let listener = loopback_listener();
        let mut config = test_config(&listener);
        // Keep the tick out of the picture; this test is about size-triggered
        // flushes only.
        config.flush_interval = Duration::from_secs(60);

        let line = {
            let mut l = "x".repeat(499);
            l.push('\n');
            l
        };

        let (tx, rx) = line_queue(8);
        tx.push(line.clone());
        tx.push(line.clone());
        tx.push(line.clone());
        drop(tx);

        let forwarder = Forwarder::new(config.clone(), rx);
        let client = Client::connect(&config).unwrap();

        // Three 500-byte lines against a 1400-byte limit: the third line
        // forces the first two out as a single packet, then the queue closes
        // and the partial buffer holding the third line is discarded.
        assert!(matches!(forwarder.stream(&client), Phase::Quit));

        let packet = recv_packet(&listener);
        assert_eq!(packet.len(), 1000);
        assert_eq!(packet, [line.as_bytes(), line.as_bytes()].concat());
    }

    #[test]
    fn run_delivers_lines_via_tick_flush() {
        let listener = loopback_listener();
        let config = test_config(&listener);

        let (tx, rx) = line_queue(8);
        let handle = thread::spawn(move || Forwarder::new(config, rx).run());

        tx.push("requests:42|kv\n".to_string());

        let packet = recv_packet(&listener);
        assert_eq!(packet, b"requests:42|kv\n");

        // Closing the queue terminates the forwarder.
        drop(tx);
        handle.join().unwrap();
    }
}
