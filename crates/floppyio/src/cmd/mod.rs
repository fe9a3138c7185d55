use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand};
use floppyio_channel::{
    CancelToken, Channel, ChannelConfig, Framing, Role, DEFAULT_POLL_INTERVAL,
};
use floppyio_store::{CreatePolicy, FileStore, StoreOptions, DEFAULT_CAPACITY};

use crate::exit::{channel_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod layout;
pub mod receive;
pub mod send;
pub mod status;
pub mod version;
pub mod zero;

/// Device used when none is given: the first floppy drive.
pub const DEFAULT_DEVICE: &str = "/dev/fd0";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stream stdin (or a file) to the peer as one message.
    Send(SendArgs),
    /// Receive one message from the peer into stdout (or a file).
    Receive(ReceiveArgs),
    /// Create the image if needed and zero-fill it.
    Zero(DeviceArgs),
    /// Print the region layout for the selected role, framing and capacity.
    Layout,
    /// Decode both control bytes of a device.
    Status(DeviceArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, channel: &ChannelArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, channel, format),
        Command::Receive(args) => receive::run(args, channel, format),
        Command::Zero(args) => zero::run(args, channel, format),
        Command::Layout => layout::run(channel, format),
        Command::Status(args) => status::run(args, channel, format),
        Command::Version(args) => version::run(args),
    }
}

/// Channel settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ChannelArgs {
    /// Act as the host endpoint (default: guest).
    #[arg(long, env = "FLOPPYIO_HOST", global = true)]
    pub host: bool,
    /// Null-terminated text frames instead of length-prefixed binary frames.
    #[arg(long, global = true)]
    pub text: bool,
    /// Do not wait for the peer to acknowledge each frame.
    #[arg(long, global = true)]
    pub no_sync: bool,
    /// Seconds to wait for the peer per frame; 0 waits forever.
    #[arg(long, value_name = "SECS", env = "FLOPPYIO_TIMEOUT", default_value_t = 0, global = true)]
    pub timeout: u64,
    /// Size of the shared image in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_CAPACITY, global = true)]
    pub capacity: usize,
    /// Bypass the page cache when reading the device.
    #[arg(long, global = true)]
    pub uncached: bool,
}

impl ChannelArgs {
    pub fn role(&self) -> Role {
        if self.host {
            Role::Host
        } else {
            Role::Guest
        }
    }

    pub fn framing(&self) -> Framing {
        if self.text {
            Framing::Text
        } else {
            Framing::Binary
        }
    }

    pub fn config(&self) -> ChannelConfig {
        ChannelConfig {
            capacity: self.capacity,
            role: self.role(),
            framing: self.framing(),
            synchronized: !self.no_sync,
            sync_timeout: Duration::from_secs(self.timeout),
            raise_on_error: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Store options for opening an existing device, or creating and
    /// initializing it when `init` is set.
    pub fn store_options(&self, init: bool) -> StoreOptions {
        StoreOptions {
            capacity: self.capacity,
            create: if init {
                CreatePolicy::OpenOrCreate
            } else {
                CreatePolicy::OpenExisting
            },
            initialize: init,
            uncached: self.uncached,
        }
    }
}

#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// Disk image or block device shared with the peer.
    #[arg(env = "FLOPPYIO_DEVICE", default_value = DEFAULT_DEVICE)]
    pub device: PathBuf,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub target: DeviceArgs,
    /// Read the message from a file instead of stdin.
    #[arg(long, short = 'f', value_name = "FILE")]
    pub file: Option<PathBuf>,
    /// Create the image if missing and zero-fill it before sending.
    #[arg(long)]
    pub init: bool,
}

#[derive(Args, Debug)]
pub struct ReceiveArgs {
    #[command(flatten)]
    pub target: DeviceArgs,
    /// Write the message to a file instead of stdout.
    #[arg(long, short = 'f', value_name = "FILE")]
    pub file: Option<PathBuf>,
    /// Create the image if missing and zero-fill it before receiving.
    #[arg(long)]
    pub init: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Open `device` as a channel endpoint.
pub fn open_channel(
    device: &Path,
    channel: &ChannelArgs,
    options: StoreOptions,
) -> CliResult<Channel<FileStore>> {
    Channel::open(device, channel.config(), options)
        .map_err(|err| channel_error(&format!("failed to open {}", device.display()), err))
}

/// Cancel pending waits on Ctrl-C.
pub fn install_ctrlc_handler(token: CancelToken) -> CliResult<()> {
    ctrlc::set_handler(move || {
        tracing::warn!("interrupted; cancelling pending wait");
        token.cancel();
    })
    .map_err(|err| {
        CliError::new(
            floppyio_channel::ErrorCode::IoError,
            format!("failed to install Ctrl-C handler: {err}"),
        )
    })
}
