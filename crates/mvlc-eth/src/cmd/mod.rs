use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use mvlc_eth_pipe::{EthConfig, Pipe, COMMAND_PORT, DATA_PORT};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod info;
pub mod listen;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Receive packets from one pipe and print them with statistics.
    Listen(ListenArgs),
    /// Connect and print resolved addresses and receive queue sizes.
    Info(InfoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Info(args) => info::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum PipeArg {
    Command,
    Data,
}

impl From<PipeArg> for Pipe {
    fn from(arg: PipeArg) -> Self {
        match arg {
            PipeArg::Command => Pipe::Command,
            PipeArg::Data => Pipe::Data,
        }
    }
}

/// Controller address and ports.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Controller host name or IPv4 address.
    #[arg(env = "MVLC_HOST")]
    pub host: String,
    /// UDP port of the command pipe.
    #[arg(long, default_value_t = COMMAND_PORT)]
    pub command_port: u16,
    /// UDP port of the data pipe.
    #[arg(long, default_value_t = DATA_PORT)]
    pub data_port: u16,
}

impl ConnectArgs {
    pub fn config(&self, read_timeout: Duration) -> EthConfig {
        EthConfig {
            command_port: self.command_port,
            data_port: self.data_port,
            read_timeout,
            ..EthConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Pipe to read from.
    #[arg(long, value_enum, default_value = "data")]
    pub pipe: PipeArg,
    /// Exit after N packets (or N stream chunks).
    #[arg(long)]
    pub count: Option<usize>,
    /// Read timeout per receive (e.g. 500ms, 2s).
    #[arg(long, default_value = "500ms")]
    pub timeout: String,
    /// Stream mode: read header-stripped payload in chunks of BYTES.
    #[arg(long, value_name = "BYTES")]
    pub stream: Option<usize>,
    /// Exit with a timeout status instead of waiting for more traffic.
    #[arg(long)]
    pub exit_on_timeout: bool,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "ms")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("300").unwrap(), Duration::from_millis(300));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn connect_args_build_config() {
        let args = ConnectArgs {
            host: "mvlc-0042".to_string(),
            command_port: 1000,
            data_port: 1001,
        };
        let config = args.config(Duration::from_millis(20));
        assert_eq!(config.port(Pipe::Command), 1000);
        assert_eq!(config.port(Pipe::Data), 1001);
        assert_eq!(config.read_timeout, Duration::from_millis(20));
    }
}
