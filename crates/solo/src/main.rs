mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "solo", version, about = "Single-instance application launcher")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_trailing_args() {
        let cli = Cli::try_parse_from([
            "solo",
            "run",
            "com.example.viewer",
            "--count",
            "2",
            "--",
            "--flag",
            "value",
        ])
        .expect("run args should parse");

        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.channel.app_id, "com.example.viewer");
        assert_eq!(args.count, Some(2));
        assert_eq!(args.args, ["--flag", "value"]);
    }

    #[test]
    fn parses_send_with_timeouts() {
        let cli = Cli::try_parse_from([
            "solo",
            "send",
            "app",
            "--connect-timeout",
            "300ms",
            "--max-message-size",
            "512",
            "--",
            "a b",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send command");
        };
        assert_eq!(args.channel.connect_timeout, "300ms");
        assert_eq!(args.channel.max_message_size, 512);
        assert_eq!(args.args, ["a b"]);
    }

    #[test]
    fn parses_status_with_global_format() {
        let cli = Cli::try_parse_from(["solo", "status", "app", "--format", "table"])
            .expect("status args should parse");
        assert!(matches!(cli.command, Command::Status(_)));
        assert!(matches!(cli.format, Some(OutputFormat::Table)));
    }

    #[test]
    fn run_requires_app_id() {
        let err = Cli::try_parse_from(["solo", "run"]).expect_err("missing app id should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
