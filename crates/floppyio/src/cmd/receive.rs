use std::fs::File;
use std::io::{self, BufWriter, Write};

use floppyio_channel::CancelToken;

use crate::cmd::{install_ctrlc_handler, open_channel, ChannelArgs, ReceiveArgs};
use crate::exit::{channel_error, output_error, CliResult, SUCCESS};
use crate::output::{print_transfer, OutputFormat, TransferOutput};

pub fn run(args: ReceiveArgs, channel: &ChannelArgs, format: OutputFormat) -> CliResult<i32> {
    let device = &args.target.device;
    let token = CancelToken::new();
    install_ctrlc_handler(token.clone())?;
    let mut endpoint =
        open_channel(device, channel, channel.store_options(args.init))?.with_cancel_token(token);

    // Stdout carries the message itself; the summary is only printed when
    // the message goes to a file.
    let sink: Box<dyn Write> = match &args.file {
        Some(path) => {
            let file = File::create(path).map_err(|err| {
                output_error(&format!("failed to create {}", path.display()), err)
            })?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(io::stdout().lock()),
    };

    let received = endpoint
        .stream()
        .receive_stream(sink)
        .map_err(|err| channel_error("receive failed", err))?;

    tracing::info!(device = %device.display(), bytes = received, "message received");
    if args.file.is_some() {
        print_transfer(
            &TransferOutput {
                operation: "received",
                device: device.display().to_string(),
                role: channel.role().as_str(),
                framing: channel.framing().as_str(),
                bytes: received,
            },
            format,
        );
    }
    Ok(SUCCESS)
}
