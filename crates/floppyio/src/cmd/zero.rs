use floppyio_store::CreatePolicy;

use crate::cmd::{open_channel, ChannelArgs, DeviceArgs};
use crate::exit::{channel_error, CliResult, SUCCESS};
use crate::output::{print_zero, OutputFormat, ZeroOutput};

pub fn run(args: DeviceArgs, channel: &ChannelArgs, format: OutputFormat) -> CliResult<i32> {
    let options = floppyio_store::StoreOptions {
        create: CreatePolicy::OpenOrCreate,
        initialize: false,
        ..channel.store_options(false)
    };
    let mut endpoint = open_channel(&args.device, channel, options)?;
    endpoint
        .reset()
        .map_err(|err| channel_error("zero-fill failed", err))?;

    print_zero(
        &ZeroOutput {
            device: args.device.display().to_string(),
            capacity: channel.capacity,
        },
        format,
    );
    Ok(SUCCESS)
}
