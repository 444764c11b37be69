use std::net::{SocketAddr, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use mvlc_eth_frame::{encode, frame_types, header1::NO_HEADER_POINTER_PRESENT, PacketChannel};
use mvlc_eth_pipe::{EthConfig, EthError, EthTransport, Pipe};

struct FakeController {
    command: UdpSocket,
    data: UdpSocket,
}

impl FakeController {
    fn bind() -> Self {
        let command = UdpSocket::bind("127.0.0.1:0").expect("command socket should bind");
        let data = UdpSocket::bind("127.0.0.1:0").expect("data socket should bind");
        Self { command, data }
    }

    fn config(&self) -> EthConfig {
        EthConfig {
            command_port: self.command.local_addr().expect("local addr").port(),
            data_port: self.data.local_addr().expect("local addr").port(),
            read_timeout: Duration::from_millis(200),
            data_receive_buffer_size: Some(1024 * 1024),
            ..EthConfig::default()
        }
    }

    fn send_to(&self, pipe: Pipe, client: SocketAddr, bytes: &[u8]) {
        let socket = match pipe {
            Pipe::Command => &self.command,
            Pipe::Data => &self.data,
        };
        socket
            .send_to(bytes, client)
            .expect("controller send should succeed");
    }
}

fn packet(channel: u16, number: u16, nhp: u16, payload: &[u8]) -> Vec<u8> {
    let mut bytes = encode(channel, number, (payload.len() / 4) as u16, 0, nhp)
        .to_bytes()
        .to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

fn connected() -> (FakeController, EthTransport) {
    let controller = FakeController::bind();
    let transport = EthTransport::with_config("127.0.0.1", controller.config());
    transport.connect().expect("connect should succeed");
    (controller, transport)
}

fn client_addr(transport: &EthTransport, pipe: Pipe) -> SocketAddr {
    transport
        .local_address(pipe)
        .expect("connected transport should know its local address")
}

#[test]
fn command_write_reaches_controller() {
    let (controller, transport) = connected();

    let sent = transport
        .write(Pipe::Command, &0xf100_0000u32.to_le_bytes())
        .expect("write should succeed");
    assert_eq!(sent, 4);

    controller
        .command
        .set_read_timeout(Some(Duration::from_secs(2)))
        .expect("set timeout");
    let mut buf = [0u8; 64];
    let (n, from) = controller
        .command
        .recv_from(&mut buf)
        .expect("controller should receive");
    assert_eq!(&buf[..n], &0xf100_0000u32.to_le_bytes());
    assert_eq!(from, client_addr(&transport, Pipe::Command));
}

#[test]
fn data_packets_are_counted_over_udp() {
    let (controller, transport) = connected();
    let client = client_addr(&transport, Pipe::Data);

    let mut payload = 0xf300_0001u32.to_le_bytes().to_vec();
    payload.extend_from_slice(&0x1234_5678u32.to_le_bytes());
    controller.send_to(Pipe::Data, client, &packet(2, 10, 0, &payload));
    controller.send_to(Pipe::Data, client, &packet(2, 13, NO_HEADER_POINTER_PRESENT, &[]));

    let mut dest = [0u8; 9000];
    let first = transport
        .read_packet(Pipe::Data, &mut dest)
        .expect("first packet");
    assert_eq!(first.packet_number(), Some(10));
    assert_eq!(first.bytes_transferred(), 16);

    let second = transport
        .read_packet(Pipe::Data, &mut dest)
        .expect("second packet");
    assert_eq!(second.lost_packets(), 2);

    let snapshot = transport.stats_snapshot();
    let data = snapshot.pipe(Pipe::Data);
    assert_eq!(data.received_packets, 2);
    assert_eq!(data.received_bytes, 24);
    assert_eq!(data.lost_packets, 2);
    assert_eq!(data.no_header, 1);
    assert_eq!(data.header_types.get(&frame_types::STACK_FRAME), Some(&1));
    assert_eq!(snapshot.packet_channel(PacketChannel::Data).received_packets, 2);
}

#[test]
fn stream_read_over_udp() {
    let (controller, transport) = connected();
    let client = client_addr(&transport, Pipe::Data);

    let first: Vec<u8> = (0..40).collect();
    let second: Vec<u8> = (40..100).collect();
    controller.send_to(Pipe::Data, client, &packet(2, 0, NO_HEADER_POINTER_PRESENT, &first));
    controller.send_to(Pipe::Data, client, &packet(2, 1, NO_HEADER_POINTER_PRESENT, &second));

    let mut dest = [0u8; 100];
    let n = transport
        .read(Pipe::Data, &mut dest)
        .expect("stream read should succeed");
    assert_eq!(n, 100);
    assert_eq!(dest.to_vec(), (0..100).collect::<Vec<u8>>());
}

#[test]
fn read_times_out_without_traffic() {
    let (_controller, transport) = connected();
    transport.set_read_timeout(Pipe::Command, Duration::from_millis(50));

    let started = Instant::now();
    let mut dest = [0u8; 64];
    let err = transport
        .read_packet(Pipe::Command, &mut dest)
        .expect_err("read should time out");
    assert!(err.is_timeout());
    assert!(started.elapsed() >= Duration::from_millis(40));
    assert_eq!(transport.pipe_stats()[Pipe::Command.index()].receive_attempts, 1);
    assert_eq!(transport.pipe_stats()[Pipe::Command.index()].received_packets, 0);
}

#[test]
fn disconnect_interrupts_blocked_udp_read() {
    let (_controller, transport) = connected();
    transport.set_read_timeout(Pipe::Data, Duration::from_secs(30));
    let transport = std::sync::Arc::new(transport);

    let reader = {
        let transport = std::sync::Arc::clone(&transport);
        thread::spawn(move || {
            let mut dest = [0u8; 64];
            transport
                .read_packet(Pipe::Data, &mut dest)
                .map(|p| p.bytes_transferred())
        })
    };

    thread::sleep(Duration::from_millis(100));
    let started = Instant::now();
    transport.disconnect().expect("disconnect should succeed");
    let result = reader.join().expect("reader thread should finish");

    assert!(matches!(result, Err(EthError::Closed)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn read_queue_size_sees_pending_datagram() {
    let (controller, transport) = connected();
    let client = client_addr(&transport, Pipe::Data);
    controller.send_to(Pipe::Data, client, &packet(2, 0, NO_HEADER_POINTER_PRESENT, &[0u8; 32]));

    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        match transport.read_queue_size(Pipe::Data) {
            Ok(n) if n > 0 => break,
            Ok(_) => {}
            Err(EthError::Io(err)) if err.kind() == std::io::ErrorKind::Unsupported => return,
            Err(err) => panic!("unexpected error: {err}"),
        }
        assert!(Instant::now() < deadline, "datagram never queued");
        thread::sleep(Duration::from_millis(5));
    }
}
