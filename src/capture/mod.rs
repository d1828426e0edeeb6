pub mod origin;
pub mod pcap_engine;

pub use origin::LocalNetworks;
pub use pcap_engine::{decode_udp, CaptureError, CaptureStats, PacketSource, PcapEngine, UdpDatagram};
