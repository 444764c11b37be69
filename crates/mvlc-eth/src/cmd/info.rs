use mvlc_eth_pipe::{EthTransport, Pipe, DEFAULT_READ_TIMEOUT};
use tracing::debug;

use crate::cmd::InfoArgs;
use crate::exit::{eth_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_info, OutputFormat};

pub fn run(args: InfoArgs, format: OutputFormat) -> CliResult<i32> {
    let transport = EthTransport::with_config(
        &args.connect.host,
        args.connect.config(DEFAULT_READ_TIMEOUT),
    );
    transport
        .connect()
        .map_err(|err| eth_error("connect failed", err))?;

    let info = transport
        .connection_info()
        .ok_or_else(|| CliError::new(INTERNAL, "connection info unavailable after connect"))?;

    let queue_sizes = Pipe::ALL.map(|pipe| match transport.read_queue_size(pipe) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            debug!(%pipe, %err, "read queue size unavailable");
            None
        }
    });

    print_info(&info, queue_sizes, format);
    transport
        .disconnect()
        .map_err(|err| eth_error("disconnect failed", err))?;
    Ok(SUCCESS)
}
