use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mvlc_eth_pipe::{EthError, EthTransport, Pipe, JUMBO_FRAME_MAX_SIZE};
use tracing::{debug, info};

use crate::cmd::{parse_duration, ListenArgs};
use crate::exit::{eth_error, stream_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_chunk, print_packet, print_stats, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    if args.stream == Some(0) {
        return Err(CliError::new(USAGE, "--stream needs a chunk size above zero"));
    }

    let pipe = Pipe::from(args.pipe);
    let transport = EthTransport::with_config(&args.connect.host, args.connect.config(timeout));
    transport
        .connect()
        .map_err(|err| eth_error("connect failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let result = match args.stream {
        Some(chunk_size) => stream_loop(&transport, pipe, chunk_size, &args, &running, format),
        None => packet_loop(&transport, pipe, &args, &running, format),
    };

    print_stats(&transport.stats_snapshot(), format);
    let _ = transport.disconnect();
    result
}

fn packet_loop(
    transport: &EthTransport,
    pipe: Pipe,
    args: &ListenArgs,
    running: &AtomicBool,
    format: OutputFormat,
) -> CliResult<i32> {
    let mut buffer = vec![0u8; JUMBO_FRAME_MAX_SIZE];
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        match transport.read_packet(pipe, &mut buffer) {
            Ok(packet) => {
                print_packet(pipe, &packet, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Err(err) if err.is_timeout() => {
                if args.exit_on_timeout {
                    return Ok(TIMEOUT);
                }
                debug!(%pipe, "no packet within read timeout");
            }
            Err(err) => return Err(eth_error("receive failed", err)),
        }
    }

    info!(%pipe, printed, "listen finished");
    Ok(SUCCESS)
}

fn stream_loop(
    transport: &EthTransport,
    pipe: Pipe,
    chunk_size: usize,
    args: &ListenArgs,
    running: &AtomicBool,
    format: OutputFormat,
) -> CliResult<i32> {
    let mut chunk = vec![0u8; chunk_size];
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        match transport.read(pipe, &mut chunk) {
            Ok(n) => {
                print_chunk(pipe, &chunk[..n], format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Err(err) if matches!(err.error, EthError::Timeout(_)) => {
                if err.bytes_transferred > 0 {
                    print_chunk(pipe, &chunk[..err.bytes_transferred], format);
                }
                if args.exit_on_timeout {
                    return Ok(TIMEOUT);
                }
            }
            Err(err) => return Err(stream_error("stream read failed", err)),
        }
    }

    info!(%pipe, printed, "listen finished");
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
