use std::net::IpAddr;

use pcap::{Capture, Device};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::udp::UdpPacket;
use pnet::packet::Packet;

use thiserror::Error;

use crate::config::CaptureConfig;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Insufficient privileges. Try: sudo setcap cap_net_raw,cap_net_admin=eip ./media-flow-monitor")]
    InsufficientPrivileges,

    #[error("Network interface '{0}' not found. Available interfaces: {1:?}")]
    InterfaceNotFound(String, Vec<String>),

    #[error("Invalid capture filter '{0}': {1}")]
    FilterError(String, String),

    #[error("Packet capture failed: {0}")]
    CaptureError(String),

    #[error("Device error: {0}")]
    DeviceError(String),
}

/// One decoded UDP datagram as seen on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpDatagram {
    pub src_ip: IpAddr,
    pub src_port: u16,
    /// UDP length field, header included.
    pub length: u16,
}

#[derive(Debug, Clone, Default)]
pub struct CaptureStats {
    pub packets_captured: u64,
    pub bytes_captured: u64,
    pub packets_undecoded: u64,
    pub interface: String,
}

/// Anything that can hand the runtime decoded datagrams one at a time.
pub trait PacketSource {
    /// `Ok(None)` means nothing usable arrived before the read timeout.
    fn next_datagram(&mut self) -> Result<Option<UdpDatagram>, CaptureError>;

    /// `true` once the source will never produce another datagram.
    fn is_exhausted(&self) -> bool {
        false
    }
}

pub struct PcapEngine {
    capture: Capture<pcap::Active>,
    addresses: Vec<IpAddr>,
    stats: CaptureStats,
}

impl PcapEngine {
    pub fn open(config: &CaptureConfig, filter: &str) -> Result<Self, CaptureError> {
        let available_devices = Self::list_devices()?;

        let device = match &config.interface {
            Some(name) => available_devices
                .iter()
                .find(|d| &d.name == name)
                .cloned()
                .ok_or_else(|| {
                    let device_names = available_devices.iter().map(|d| d.name.clone()).collect();
                    CaptureError::InterfaceNotFound(name.clone(), device_names)
                })?,
            None => Self::default_device()?,
        };

        let interface = device.name.clone();
        let addresses: Vec<IpAddr> = device.addresses.iter().map(|a| a.addr).collect();
        log::info!("Opening capture on interface {} ({:?})", interface, addresses);

        let inactive = Capture::from_device(device)
            .map_err(|e| CaptureError::DeviceError(format!("Device error: {}", e)))?;

        let mut capture = match inactive
            .promisc(config.promiscuous)
            .snaplen(config.snaplen)
            .timeout(config.timeout_ms)
            .open()
        {
            Ok(active) => active,
            Err(e) => {
                log::error!("Failed to open capture device {}: {}", interface, e);
                return Err(CaptureError::InsufficientPrivileges);
            }
        };

        capture
            .filter(filter, true)
            .map_err(|e| CaptureError::FilterError(filter.to_string(), e.to_string()))?;
        log::info!("Capture filter: {}", filter);

        let stats = CaptureStats {
            interface,
            ..CaptureStats::default()
        };

        Ok(PcapEngine {
            capture,
            addresses,
            stats,
        })
    }

    pub fn list_devices() -> Result<Vec<Device>, CaptureError> {
        Device::list().map_err(|e| CaptureError::DeviceError(format!("Failed to list devices: {}", e)))
    }

    fn default_device() -> Result<Device, CaptureError> {
        Device::lookup()
            .map_err(|e| CaptureError::DeviceError(format!("Default device lookup failed: {}", e)))?
            .ok_or_else(|| CaptureError::DeviceError("No default capture device".to_string()))
    }

    /// Addresses assigned to the capture interface.
    pub fn interface_addresses(&self) -> &[IpAddr] {
        &self.addresses
    }

    pub fn statistics(&self) -> &CaptureStats {
        &self.stats
    }

    pub fn dropped_by_kernel(&mut self) -> Option<u32> {
        self.capture.stats().ok().map(|s| s.dropped)
    }
}

impl PacketSource for PcapEngine {
    fn next_datagram(&mut self) -> Result<Option<UdpDatagram>, CaptureError> {
        match self.capture.next_packet() {
            Ok(packet) => {
                self.stats.packets_captured += 1;
                self.stats.bytes_captured += packet.header.len as u64;

                let datagram = decode_udp(packet.data);
                if datagram.is_none() {
                    self.stats.packets_undecoded += 1;
                    log::debug!("Skipping frame without IP/UDP layers ({} bytes)", packet.data.len());
                }
                Ok(datagram)
            }
            Err(pcap::Error::TimeoutExpired) => Ok(None),
            Err(e) => Err(CaptureError::CaptureError(format!("Packet capture error: {}", e))),
        }
    }
}

/// Decode an Ethernet frame down to its UDP header. Anything else yields `None`.
pub fn decode_udp(data: &[u8]) -> Option<UdpDatagram> {
    let ethernet = EthernetPacket::new(data)?;

    match ethernet.get_ethertype() {
        EtherTypes::Ipv4 => {
            let ipv4 = Ipv4Packet::new(ethernet.payload())?;
            udp_datagram(IpAddr::V4(ipv4.get_source()), ipv4.get_next_level_protocol(), ipv4.payload())
        }
        EtherTypes::Ipv6 => {
            let ipv6 = Ipv6Packet::new(ethernet.payload())?;
            udp_datagram(IpAddr::V6(ipv6.get_source()), ipv6.get_next_header(), ipv6.payload())
        }
        _ => None,
    }
}

fn udp_datagram(src_ip: IpAddr, protocol: IpNextHeaderProtocol, payload: &[u8]) -> Option<UdpDatagram> {
    if protocol != IpNextHeaderProtocols::Udp {
        return None;
    }

    let udp = UdpPacket::new(payload)?;
    Some(UdpDatagram {
        src_ip,
        src_port: udp.get_source(),
        length: udp.get_length(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    /// Ethernet + IPv4 + UDP header, with a zeroed payload of `payload_len` bytes.
    fn udp_frame(src: [u8; 4], src_port: u16, dst_port: u16, payload_len: u16) -> Vec<u8> {
        let udp_len = 8 + payload_len;
        let total_len = 20 + udp_len;

        let mut frame = vec![0u8; 12];
        frame.extend_from_slice(&[0x08, 0x00]);

        frame.extend_from_slice(&[0x45, 0x00]);
        frame.extend_from_slice(&total_len.to_be_bytes());
        frame.extend_from_slice(&[0, 0, 0, 0, 64, 17, 0, 0]);
        frame.extend_from_slice(&src);
        frame.extend_from_slice(&[10, 0, 0, 1]);

        frame.extend_from_slice(&src_port.to_be_bytes());
        frame.extend_from_slice(&dst_port.to_be_bytes());
        frame.extend_from_slice(&udp_len.to_be_bytes());
        frame.extend_from_slice(&[0, 0]);
        frame.extend(std::iter::repeat(0u8).take(payload_len as usize));
        frame
    }

    #[test]
    fn test_decode_ipv4_udp() {
        let frame = udp_frame([192, 168, 0, 89], 52000, 8801, 164);
        let datagram = decode_udp(&frame).unwrap();
        assert_eq!(datagram.src_ip, IpAddr::V4(Ipv4Addr::new(192, 168, 0, 89)));
        assert_eq!(datagram.src_port, 52000);
        assert_eq!(datagram.length, 172);
    }

    #[test]
    fn test_decode_ipv6_udp() {
        let src: std::net::Ipv6Addr = "fe80::1".parse().unwrap();
        let udp_len: u16 = 8 + 100;

        let mut frame = vec![0u8; 12];
        frame.extend_from_slice(&[0x86, 0xdd]);
        frame.extend_from_slice(&[0x60, 0, 0, 0]);
        frame.extend_from_slice(&udp_len.to_be_bytes());
        frame.extend_from_slice(&[17, 64]);
        frame.extend_from_slice(&src.octets());
        frame.extend_from_slice(&[0u8; 16]);
        frame.extend_from_slice(&40000u16.to_be_bytes());
        frame.extend_from_slice(&8801u16.to_be_bytes());
        frame.extend_from_slice(&udp_len.to_be_bytes());
        frame.extend_from_slice(&[0, 0]);
        frame.extend(std::iter::repeat(0u8).take(100));

        let datagram = decode_udp(&frame).unwrap();
        assert_eq!(datagram.src_ip, IpAddr::V6(src));
        assert_eq!(datagram.src_port, 40000);
        assert_eq!(datagram.length, 108);
    }

    #[test]
    fn test_decode_rejects_tcp() {
        let mut frame = udp_frame([192, 168, 0, 89], 52000, 8801, 20);
        frame[14 + 9] = 6;
        assert!(decode_udp(&frame).is_none());
    }

    #[test]
    fn test_decode_rejects_non_ip() {
        let mut frame = udp_frame([192, 168, 0, 89], 52000, 8801, 20);
        frame[12] = 0x08;
        frame[13] = 0x06;
        assert!(decode_udp(&frame).is_none());
    }

    #[test]
    fn test_decode_rejects_truncated() {
        assert!(decode_udp(&[0u8; 10]).is_none());
        let frame = udp_frame([192, 168, 0, 89], 52000, 8801, 0);
        assert!(decode_udp(&frame[..14 + 20 + 4]).is_none());
    }
}
