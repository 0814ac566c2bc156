use std::time::Duration;

use clap::{Args, Subcommand};
use solo_instance::InstanceConfig;
use solo_transport::ChannelName;

use crate::exit::{transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod run;
pub mod send;
pub mod status;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Claim the application identity, or forward arguments to its owner.
    Run(RunArgs),
    /// Forward arguments to a running instance without claiming.
    Send(SendArgs),
    /// Report whether an instance is running.
    Status(StatusArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Status(args) => status::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Identity and tunables shared by every channel command.
#[derive(Args, Debug)]
pub struct ChannelArgs {
    /// Application identity; the channel is named "<APP_ID>-Pipe".
    pub app_id: String,
    /// How long to wait for the running instance to accept (e.g. 5s, 500ms).
    #[arg(long, env = "SOLO_CONNECT_TIMEOUT", default_value = "5s")]
    pub connect_timeout: String,
    /// Bound on reading one forwarded message (e.g. 5s, 500ms).
    #[arg(long, env = "SOLO_READ_TIMEOUT", default_value = "5s")]
    pub read_timeout: String,
    /// Largest accepted argument payload in bytes.
    #[arg(
        long,
        env = "SOLO_MAX_MESSAGE_SIZE",
        default_value_t = solo_wire::DEFAULT_MAX_MESSAGE_SIZE
    )]
    pub max_message_size: usize,
}

impl ChannelArgs {
    pub fn instance_config(&self) -> CliResult<InstanceConfig> {
        if self.max_message_size == 0 {
            return Err(CliError::new(USAGE, "max message size must be greater than zero"));
        }
        Ok(InstanceConfig {
            connect_timeout: parse_duration(&self.connect_timeout)?,
            read_timeout: Some(parse_duration(&self.read_timeout)?),
            max_message_size: self.max_message_size,
        })
    }

    pub fn channel_name(&self) -> CliResult<ChannelName> {
        ChannelName::for_identity(&self.app_id)
            .map_err(|err| transport_error("invalid application identity", err))
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub channel: ChannelArgs,
    /// Exit after printing N forwarded argument lists.
    #[arg(long)]
    pub count: Option<usize>,
    /// Arguments for this launch (forwarded when another instance is running).
    #[arg(last = true)]
    pub args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub channel: ChannelArgs,
    /// Arguments to forward.
    #[arg(last = true)]
    pub args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub channel: ChannelArgs,
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
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_args(app_id: &str) -> ChannelArgs {
        ChannelArgs {
            app_id: app_id.to_string(),
            connect_timeout: "250ms".to_string(),
            read_timeout: "2s".to_string(),
            max_message_size: 4096,
        }
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration(" ").is_err());
    }

    #[test]
    fn channel_args_build_instance_config() {
        let config = channel_args("app").instance_config().expect("config should build");
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.read_timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.max_message_size, 4096);
    }

    #[test]
    fn zero_message_size_is_usage_error() {
        let mut args = channel_args("app");
        args.max_message_size = 0;
        assert_eq!(args.instance_config().unwrap_err().code, USAGE);
    }

    #[test]
    fn channel_name_appends_suffix() {
        let name = channel_args("com.example.app").channel_name().unwrap();
        assert_eq!(name.as_str(), "com.example.app-Pipe");
        assert_eq!(channel_args("").channel_name().unwrap_err().code, USAGE);
    }
}
