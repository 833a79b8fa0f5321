use std::{
    net::{SocketAddr, ToSocketAddrs as _},
    time::Duration,
};

pub mod sync;

/// Resolved address of the statsd collector.
///
/// Resolution happens once, at build time; the forwarder hands the full
/// candidate list to the socket on every reconnect attempt.
#[derive(Clone)]
pub(crate) struct RemoteAddr(pub Vec<SocketAddr>);

impl<'a> TryFrom<&'a str> for RemoteAddr {
    type Error = String;

    fn try_from(addr: &'a str) -> Result<Self, Self::Error> {
        match addr.to_socket_addrs() {
            Ok(addrs) => Ok(RemoteAddr(addrs.collect())),
            Err(e) => Err(e.to_string()),
        }
    }
}

/// Forwarder configuration.
#[derive(Clone)]
pub(crate) struct ForwarderConfiguration {
    pub remote_addr: RemoteAddr,
    pub max_packet_len: usize,
    pub flush_interval: Duration,
    pub reconnect_cooldown: Duration,
    pub write_timeout: Duration,
}
