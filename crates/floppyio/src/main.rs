mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::{ChannelArgs, Command};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "floppyio",
    version,
    about = "Exchange messages with a virtual machine through a shared floppy image"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(flatten)]
    channel: ChannelArgs,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, &cli.channel, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.exit_status());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn parses_send_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "floppyio",
            "send",
            "--file",
            "message.bin",
            "/tmp/floppy.img",
            "--host",
            "--timeout",
            "5",
        ])
        .expect("send args should parse");

        assert!(cli.channel.host);
        assert_eq!(cli.channel.timeout, 5);
        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.target.device, PathBuf::from("/tmp/floppy.img"));
                assert_eq!(args.file, Some(PathBuf::from("message.bin")));
                assert!(!args.init);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn device_defaults_to_first_floppy_drive() {
        // Skip when the environment overrides the default.
        if std::env::var_os("FLOPPYIO_DEVICE").is_some() {
            return;
        }
        let cli = Cli::try_parse_from(["floppyio", "receive"]).expect("receive should parse");
        match cli.command {
            Command::Receive(args) => {
                assert_eq!(args.target.device, PathBuf::from(cmd::DEFAULT_DEVICE));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_layout_with_text_framing() {
        let cli = Cli::try_parse_from([
            "floppyio",
            "--text",
            "--capacity",
            "1024",
            "layout",
            "--format",
            "json",
        ])
        .expect("layout args should parse");

        assert!(matches!(cli.command, Command::Layout));
        assert!(cli.channel.text);
        assert_eq!(cli.channel.capacity, 1024);
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }

    #[test]
    fn rejects_non_numeric_timeout() {
        let err = Cli::try_parse_from(["floppyio", "--timeout", "soon", "layout"])
            .expect_err("timeout must be numeric");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
