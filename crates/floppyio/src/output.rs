use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use floppyio_channel::{BufferLayout, ControlByte};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct RegionOutput {
    pub offset: usize,
    pub size: usize,
}

#[derive(Serialize, Debug)]
pub struct LayoutOutput {
    pub capacity: usize,
    pub role: &'static str,
    pub framing: &'static str,
    pub payload_capacity: usize,
    pub outbound: RegionOutput,
    pub inbound: RegionOutput,
    pub control_out_offset: usize,
    pub control_in_offset: usize,
}

impl From<&BufferLayout> for LayoutOutput {
    fn from(layout: &BufferLayout) -> Self {
        Self {
            capacity: layout.capacity,
            role: layout.role.as_str(),
            framing: layout.framing.as_str(),
            payload_capacity: layout.payload_capacity(),
            outbound: RegionOutput {
                offset: layout.outbound_offset,
                size: layout.outbound_size,
            },
            inbound: RegionOutput {
                offset: layout.inbound_offset,
                size: layout.inbound_size,
            },
            control_out_offset: layout.control_out_offset,
            control_in_offset: layout.control_in_offset,
        }
    }
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct ControlOutput {
    pub offset: usize,
    pub raw: u8,
    pub data_present: bool,
    pub end_of_data: bool,
    pub length_prefix: bool,
    pub aborted: bool,
    pub sequence: u8,
}

impl ControlOutput {
    pub fn new(offset: usize, control: ControlByte) -> Self {
        Self {
            offset,
            raw: control.encode(),
            data_present: control.data_present,
            end_of_data: control.end_of_data,
            length_prefix: control.length_prefix,
            aborted: control.aborted,
            sequence: control.sequence,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct StatusOutput {
    pub device: String,
    pub role: &'static str,
    pub outbound: ControlOutput,
    pub inbound: ControlOutput,
}

#[derive(Serialize, Debug)]
pub struct TransferOutput {
    pub operation: &'static str,
    pub device: String,
    pub role: &'static str,
    pub framing: &'static str,
    pub bytes: usize,
}

#[derive(Serialize, Debug)]
pub struct ZeroOutput {
    pub device: String,
    pub capacity: usize,
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn print_layout(out: &LayoutOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["REGION", "OFFSET", "SIZE"]);
            table
                .add_row(vec![
                    "outbound".to_string(),
                    out.outbound.offset.to_string(),
                    out.outbound.size.to_string(),
                ])
                .add_row(vec![
                    "inbound".to_string(),
                    out.inbound.offset.to_string(),
                    out.inbound.size.to_string(),
                ])
                .add_row(vec![
                    "control out".to_string(),
                    out.control_out_offset.to_string(),
                    "1".to_string(),
                ])
                .add_row(vec![
                    "control in".to_string(),
                    out.control_in_offset.to_string(),
                    "1".to_string(),
                ]);
            println!(
                "{} / {} / {} bytes, {} bytes per frame",
                out.role, out.framing, out.capacity, out.payload_capacity
            );
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Layout:");
            println!("  Role:             {}", out.role);
            println!("  Framing:          {}", out.framing);
            println!("  Capacity:         {}", out.capacity);
            println!("  Frame payload:    {}", out.payload_capacity);
            println!(
                "  Outbound:         [{}, {})",
                out.outbound.offset,
                out.outbound.offset + out.outbound.size
            );
            println!(
                "  Inbound:          [{}, {})",
                out.inbound.offset,
                out.inbound.offset + out.inbound.size
            );
            println!("  Control out:      {}", out.control_out_offset);
            println!("  Control in:       {}", out.control_in_offset);
        }
        OutputFormat::Raw => {
            println!(
                "{} {} {} {} {} {}",
                out.outbound.offset,
                out.outbound.size,
                out.inbound.offset,
                out.inbound.size,
                out.control_out_offset,
                out.control_in_offset
            );
        }
    }
}

pub fn print_status(out: &StatusOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = new_table(vec![
                "DIRECTION", "OFFSET", "RAW", "DATA", "EOD", "PREFIX", "ABORTED", "SEQ",
            ]);
            for (name, control) in [("outbound", &out.outbound), ("inbound", &out.inbound)] {
                table.add_row(vec![
                    name.to_string(),
                    control.offset.to_string(),
                    format!("{:#04x}", control.raw),
                    control.data_present.to_string(),
                    control.end_of_data.to_string(),
                    control.length_prefix.to_string(),
                    control.aborted.to_string(),
                    control.sequence.to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("Status of {} ({}):", out.device, out.role);
            for (name, control) in [("Outbound", &out.outbound), ("Inbound", &out.inbound)] {
                println!(
                    "  {name:<9} @{:<6} raw={:#04x} data={} eod={} prefix={} aborted={} seq={}",
                    control.offset,
                    control.raw,
                    control.data_present,
                    control.end_of_data,
                    control.length_prefix,
                    control.aborted,
                    control.sequence
                );
            }
        }
        OutputFormat::Raw => {
            println!("{:02x} {:02x}", out.outbound.raw, out.inbound.raw);
        }
    }
}

pub fn print_transfer(out: &TransferOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["OPERATION", "DEVICE", "ROLE", "FRAMING", "BYTES"]);
            table.add_row(vec![
                out.operation.to_string(),
                out.device.clone(),
                out.role.to_string(),
                out.framing.to_string(),
                out.bytes.to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} {} bytes via {} ({}, {})",
                out.operation, out.bytes, out.device, out.role, out.framing
            );
        }
        OutputFormat::Raw => println!("{}", out.bytes),
    }
}

pub fn print_zero(out: &ZeroOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Zeroed {} ({} bytes)", out.device, out.capacity);
        }
        OutputFormat::Raw => println!("{}", out.capacity),
    }
}
