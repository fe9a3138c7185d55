use std::fs::File;
use std::io::{self, BufReader, Read};

use floppyio_channel::CancelToken;

use crate::cmd::{install_ctrlc_handler, open_channel, ChannelArgs, SendArgs};
use crate::exit::{channel_error, input_error, CliResult, SUCCESS};
use crate::output::{print_transfer, OutputFormat, TransferOutput};

pub fn run(args: SendArgs, channel: &ChannelArgs, format: OutputFormat) -> CliResult<i32> {
    let source: Box<dyn Read> = match &args.file {
        Some(path) => {
            let file = File::open(path).map_err(|err| {
                input_error(&format!("failed to open {}", path.display()), err)
            })?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(io::stdin().lock()),
    };

    let device = &args.target.device;
    let token = CancelToken::new();
    install_ctrlc_handler(token.clone())?;
    let mut endpoint =
        open_channel(device, channel, channel.store_options(args.init))?.with_cancel_token(token);

    let sent = endpoint
        .stream()
        .send_stream(source)
        .map_err(|err| channel_error("send failed", err))?;

    tracing::info!(device = %device.display(), bytes = sent, "message sent");
    print_transfer(
        &TransferOutput {
            operation: "sent",
            device: device.display().to_string(),
            role: channel.role().as_str(),
            framing: channel.framing().as_str(),
            bytes: sent,
        },
        format,
    );
    Ok(SUCCESS)
}
