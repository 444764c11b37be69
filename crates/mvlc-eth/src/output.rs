use std::fmt::Write as _;
use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use mvlc_eth_frame::{channel_name, frame_type_name, PacketChannel};
use mvlc_eth_pipe::{ConnectionInfo, PacketReadResult, Pipe, StatsSnapshot};
use serde::Serialize;

/// Payload words shown before the preview is cut.
const PREVIEW_WORDS: usize = 4;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct PacketOutput {
    pipe: Pipe,
    size: usize,
    channel: Option<u16>,
    channel_name: &'static str,
    packet_number: Option<u16>,
    data_words: Option<u16>,
    udp_timestamp: Option<u32>,
    next_header_pointer: Option<u16>,
    lost_packets: u32,
    payload: String,
    timestamp: String,
}

impl PacketOutput {
    fn new(pipe: Pipe, packet: &PacketReadResult<'_>) -> Self {
        Self {
            pipe,
            size: packet.bytes_transferred(),
            channel: packet.packet_channel(),
            channel_name: packet.packet_channel().map_or("SHORT", channel_name),
            packet_number: packet.packet_number(),
            data_words: packet.data_word_count(),
            udp_timestamp: packet.udp_timestamp(),
            next_header_pointer: packet.next_header_pointer(),
            lost_packets: packet.lost_packets(),
            payload: payload_preview(packet.payload()),
            timestamp: now_unix_seconds(),
        }
    }
}

pub fn print_packet(pipe: Pipe, packet: &PacketReadResult<'_>, format: OutputFormat) {
    let out = PacketOutput::new(pipe, packet);
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PIPE", "CHANNEL", "NUMBER", "SIZE", "LOST", "PAYLOAD"])
                .add_row(vec![
                    pipe.to_string(),
                    out.channel_name.to_string(),
                    display_opt(out.packet_number),
                    out.size.to_string(),
                    out.lost_packets.to_string(),
                    out.payload.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "pipe={} channel={} number={} size={} lost={} payload={}",
                pipe,
                out.channel_name,
                display_opt(out.packet_number),
                out.size,
                out.lost_packets,
                out.payload
            );
        }
    }
}

#[derive(Serialize)]
struct ChunkOutput {
    pipe: Pipe,
    size: usize,
    payload: String,
}

pub fn print_chunk(pipe: Pipe, chunk: &[u8], format: OutputFormat) {
    let out = ChunkOutput {
        pipe,
        size: chunk.len(),
        payload: payload_preview(chunk),
    };
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("pipe={} size={} payload={}", out.pipe, out.size, out.payload);
        }
    }
}

pub fn print_stats(stats: &StatsSnapshot, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(stats).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("{}", pipe_table(stats));
            println!("{}", channel_table(stats));
        }
    }
}

fn pipe_table(stats: &StatsSnapshot) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "PIPE", "ATTEMPTS", "PACKETS", "BYTES", "SHORT", "RESIDUE", "NO HDR", "HDR OOR",
            "CHAN OOR", "LOST", "FRAME TYPES",
        ]);
    for pipe in Pipe::ALL {
        let s = stats.pipe(pipe);
        table.add_row(vec![
            pipe.to_string(),
            s.receive_attempts.to_string(),
            s.received_packets.to_string(),
            s.received_bytes.to_string(),
            s.short_packets.to_string(),
            s.packets_with_residue.to_string(),
            s.no_header.to_string(),
            s.header_out_of_range.to_string(),
            s.packet_channel_out_of_range.to_string(),
            s.lost_packets.to_string(),
            header_types(&s.header_types),
        ]);
    }
    table
}

fn channel_table(stats: &StatsSnapshot) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "CHANNEL", "PACKETS", "BYTES", "LOST", "NO HDR", "HDR OOR", "FRAME TYPES",
        ]);
    for channel in PacketChannel::ALL {
        let s = stats.packet_channel(channel);
        table.add_row(vec![
            channel.to_string(),
            s.received_packets.to_string(),
            s.received_bytes.to_string(),
            s.lost_packets.to_string(),
            s.no_header.to_string(),
            s.header_out_of_range.to_string(),
            header_types(&s.header_types),
        ]);
    }
    table
}

#[derive(Serialize)]
struct InfoOutput<'a> {
    connection: &'a ConnectionInfo,
    read_queue_sizes: [Option<usize>; 2],
}

pub fn print_info(info: &ConnectionInfo, queue_sizes: [Option<usize>; 2], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = InfoOutput {
                connection: info,
                read_queue_sizes: queue_sizes,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PIPE", "REMOTE", "LOCAL", "QUEUED BYTES"]);
            for pipe in Pipe::ALL {
                table.add_row(vec![
                    pipe.to_string(),
                    info.remote(pipe).to_string(),
                    display_opt(info.local(pipe)),
                    display_opt(queue_sizes[pipe.index()]),
                ]);
            }
            println!("{info}");
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{info}");
            for pipe in Pipe::ALL {
                println!(
                    "  {pipe}: remote={} local={} queued={}",
                    info.remote(pipe),
                    display_opt(info.local(pipe)),
                    display_opt(queue_sizes[pipe.index()])
                );
            }
        }
    }
}

fn header_types(histogram: &mvlc_eth_pipe::HeaderTypeMap) -> String {
    let mut out = String::new();
    for (frame_type, count) in histogram {
        if !out.is_empty() {
            out.push(' ');
        }
        let _ = write!(out, "{}={count}", frame_type_name(*frame_type));
        if frame_type_name(*frame_type) == "Unknown" {
            let _ = write!(out, "(0x{frame_type:02x})");
        }
    }
    out
}

/// Hex dump of the first payload words.
fn payload_preview(payload: &[u8]) -> String {
    let mut out = String::new();
    for word in payload.chunks(4).take(PREVIEW_WORDS) {
        if !out.is_empty() {
            out.push(' ');
        }
        let mut bytes = [0u8; 4];
        bytes[..word.len()].copy_from_slice(word);
        let _ = write!(out, "0x{:08x}", u32::from_le_bytes(bytes));
    }
    if payload.len() > PREVIEW_WORDS * 4 {
        let _ = write!(out, " ... ({} bytes)", payload.len());
    }
    out
}

fn display_opt<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_preview_is_little_endian_words() {
        let payload = [0x01, 0x00, 0x00, 0xf3, 0xff];
        assert_eq!(payload_preview(&payload), "0xf3000001 0x000000ff");
    }

    #[test]
    fn payload_preview_truncates() {
        let payload = [0u8; 64];
        assert!(payload_preview(&payload).ends_with("... (64 bytes)"));
    }

    #[test]
    fn header_types_names_known_frames() {
        let mut histogram = mvlc_eth_pipe::HeaderTypeMap::new();
        histogram.insert(0xf3, 2);
        histogram.insert(0x12, 1);
        assert_eq!(header_types(&histogram), "Unknown=1(0x12) StackFrame=2");
    }
}
