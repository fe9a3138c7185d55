use floppyio_channel::{BufferLayout, ChannelError};

use crate::cmd::ChannelArgs;
use crate::exit::{channel_error, CliResult, SUCCESS};
use crate::output::{print_layout, LayoutOutput, OutputFormat};

pub fn run(channel: &ChannelArgs, format: OutputFormat) -> CliResult<i32> {
    let layout = BufferLayout::compute(channel.capacity, channel.role(), channel.framing())
        .map_err(|err| channel_error("invalid layout", ChannelError::from(err)))?;
    print_layout(&LayoutOutput::from(&layout), format);
    Ok(SUCCESS)
}
