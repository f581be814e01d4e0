use std::io::Write;
use std::net::{IpAddr, SocketAddr, UdpSocket};

use crate::error::{Error, Result};
use crate::id::NodeId;
use crate::MESSAGE_LENGTH;

/// The outbound side of the crawler. Implementations must not block: sends are fire-and-forget.
pub trait WireSink: Send + Sync {
    /// Sends a `find_node` query for `target` to `dest`, attributed to `local_id`. `slot` is the
    /// index of `local_id` in the configured identity list.
    fn find_node(&self, dest: SocketAddr, local_id: &NodeId, target: &NodeId, slot: usize)
        -> Result<()>;
}

/// A `WireSink` that owns one UDP socket per local identity.
pub struct UdpWireSink {
    sockets: Vec<UdpSocket>,
}

impl UdpWireSink {
    /// Binds one socket per port on `ip`. Socket `i` serves slot `i`.
    pub fn bind(ip: IpAddr, ports: &[u16]) -> Result<Self> {
        let mut sockets = Vec::with_capacity(ports.len());
        for port in ports {
            let socket = UdpSocket::bind(SocketAddr::new(ip, *port))?;
            socket.set_nonblocking(true)?;
            info!("Protocol: bound slot {} to {}", sockets.len(), socket.local_addr()?);
            sockets.push(socket);
        }
        Ok(UdpWireSink { sockets })
    }

    pub fn from_sockets(sockets: Vec<UdpSocket>) -> Self {
        UdpWireSink { sockets }
    }
}

impl WireSink for UdpWireSink {
    fn find_node(
        &self,
        dest: SocketAddr,
        local_id: &NodeId,
        target: &NodeId,
        slot: usize,
    ) -> Result<()> {
        let socket = self.sockets.get(slot).ok_or(Error::NoSocket(slot))?;
        let transaction_id = rand::random::<[u8; 2]>();
        let message = encode_find_node(&transaction_id, local_id, target)?;
        socket.send_to(&message, dest)?;
        Ok(())
    }
}

/// Encodes a KRPC `find_node` query. Dictionary keys are written in sorted order, as bencode
/// requires.
pub fn encode_find_node(transaction_id: &[u8], local_id: &NodeId, target: &NodeId) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(96);
    buf.write_all(b"d")?;
    write_bytes(&mut buf, b"a")?;
    buf.write_all(b"d")?;
    write_bytes(&mut buf, b"id")?;
    write_bytes(&mut buf, local_id.as_bytes())?;
    write_bytes(&mut buf, b"target")?;
    write_bytes(&mut buf, target.as_bytes())?;
    buf.write_all(b"e")?;
    write_bytes(&mut buf, b"q")?;
    write_bytes(&mut buf, b"find_node")?;
    write_bytes(&mut buf, b"t")?;
    write_bytes(&mut buf, transaction_id)?;
    write_bytes(&mut buf, b"y")?;
    write_bytes(&mut buf, b"q")?;
    buf.write_all(b"e")?;

    if buf.len() > MESSAGE_LENGTH {
        return Err(Error::MessageTooLong(buf.len()));
    }
    Ok(buf)
}

fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    write!(writer, "{}:", bytes.len())?;
    writer.write_all(bytes)?;
    Ok(())
}
