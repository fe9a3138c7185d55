use crate::cmd::{open_channel, ChannelArgs, DeviceArgs};
use crate::exit::{channel_error, CliResult, SUCCESS};
use crate::output::{print_status, ControlOutput, OutputFormat, StatusOutput};

pub fn run(args: DeviceArgs, channel: &ChannelArgs, format: OutputFormat) -> CliResult<i32> {
    let mut endpoint = open_channel(&args.device, channel, channel.store_options(false))?;
    let layout = *endpoint.layout();

    let outbound = endpoint
        .peek_outbound()
        .map_err(|err| channel_error("failed to read control byte", err))?;
    let inbound = endpoint
        .peek_inbound()
        .map_err(|err| channel_error("failed to read control byte", err))?;

    print_status(
        &StatusOutput {
            device: args.device.display().to_string(),
            role: layout.role.as_str(),
            outbound: ControlOutput::new(layout.control_out_offset, outbound),
            inbound: ControlOutput::new(layout.control_in_offset, inbound),
        },
        format,
    );
    Ok(SUCCESS)
}
