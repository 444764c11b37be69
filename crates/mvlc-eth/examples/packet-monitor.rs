//! Packet monitor example: a receive loop on the data pipe while the main
//! thread polls statistics.
//!
//! A fake controller on loopback sends readout packets with a few packet
//! numbers skipped, so the loss counters move.
//!
//! Run with:
//!   cargo run --example packet-monitor

use std::net::UdpSocket;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mvlc_eth::frame::{encode, frame_types, PacketChannel};
use mvlc_eth::pipe::{EthConfig, EthTransport, Pipe, JUMBO_FRAME_MAX_SIZE};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let controller_cmd = UdpSocket::bind("127.0.0.1:0")?;
    let controller_data = UdpSocket::bind("127.0.0.1:0")?;

    let config = EthConfig {
        command_port: controller_cmd.local_addr()?.port(),
        data_port: controller_data.local_addr()?.port(),
        read_timeout: Duration::from_millis(200),
        ..EthConfig::default()
    };
    let transport = Arc::new(EthTransport::with_config("127.0.0.1", config));
    transport.connect()?;
    eprintln!("{}", transport.connection_info().ok_or("not connected")?);

    let client = transport
        .local_address(Pipe::Data)
        .ok_or("data pipe has no local address")?;

    let sender = thread::spawn(move || -> std::io::Result<()> {
        for number in (0u16..200).filter(|n| n % 50 != 49) {
            let mut packet = encode(2, number, 2, u32::from(number), 0).to_bytes().to_vec();
            packet.extend_from_slice(&(u32::from(frame_types::STACK_FRAME) << 24 | 1).to_le_bytes());
            packet.extend_from_slice(&u32::from(number).to_le_bytes());
            controller_data.send_to(&packet, client)?;
            thread::sleep(Duration::from_millis(2));
        }
        Ok(())
    });

    let reader = {
        let transport = Arc::clone(&transport);
        thread::spawn(move || {
            let mut buffer = vec![0u8; JUMBO_FRAME_MAX_SIZE];
            let mut received = 0usize;
            loop {
                match transport.read_packet(Pipe::Data, &mut buffer) {
                    Ok(packet) => {
                        received += 1;
                        if packet.lost_packets() > 0 {
                            eprintln!(
                                "[reader] lost {} packet(s) before #{}",
                                packet.lost_packets(),
                                packet.packet_number().unwrap_or_default()
                            );
                        }
                    }
                    Err(err) if err.is_timeout() => break,
                    Err(err) => {
                        eprintln!("[reader] stopped: {err}");
                        break;
                    }
                }
            }
            received
        })
    };

    for _ in 0..3 {
        thread::sleep(Duration::from_millis(100));
        let stats = transport.stats_snapshot();
        let data = stats.packet_channel(PacketChannel::Data);
        eprintln!(
            "[monitor] packets={} bytes={} lost={}",
            data.received_packets, data.received_bytes, data.lost_packets
        );
    }

    sender.join().map_err(|_| "sender panicked")??;
    let received = reader.join().map_err(|_| "reader panicked")?;
    transport.disconnect()?;

    let stats = transport.stats_snapshot();
    eprintln!(
        "[done] received={received} lost={} frame_types={:?}",
        stats.pipe(Pipe::Data).lost_packets,
        stats.pipe(Pipe::Data).header_types
    );
    Ok(())
}
