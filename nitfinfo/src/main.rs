use clap::Parser;
use log::info;
use std::error;
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::BufReader;

use bcs::Value;
use imseg::{ImageSegmentComputer, Limits};
use nitf::{Extensions, Reader, ReaderOptions, Registry};
use tre::TreBody;

#[derive(Debug)]
enum NitfInfoError {
    Reading { path: String, error: String },
    Planning { error: String },
}

impl error::Error for NitfInfoError {}
impl fmt::Display for NitfInfoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Reading { path, error } => write!(f, "error reading {}: {}", path, error),
            Self::Planning { error } => write!(f, "error planning segments: {}", error),
        }
    }
}

#[derive(Parser)]
struct Opts {
    #[clap(subcommand)]
    subcommand: SubCommand,
}

#[derive(Parser)]
enum SubCommand {
    /// Print the header, segments and TREs of a NITF or NSIF file
    Show(Show),

    /// Print how an image of the given size would be cut into segments
    Plan(Plan),
}

#[derive(Parser)]
struct Show {
    /// Path to .ntf or .nsf file
    path: String,

    /// Fail on TREs that do not match their registered layout
    #[clap(long)]
    strict: bool,
}

#[derive(Parser)]
struct Plan {
    #[clap(long)]
    rows: u64,

    #[clap(long)]
    cols: u64,

    /// Bytes of one pixel, all bands included
    #[clap(long, default_value = "1")]
    bytes_per_pixel: u64,

    /// Block height, 0 for unblocked
    #[clap(long, default_value = "0")]
    block_rows: u64,

    /// Block width, 0 for unblocked
    #[clap(long, default_value = "0")]
    block_cols: u64,
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Undefined => "-".to_owned(),
        Value::Text(text) => format!("{:?}", text),
        Value::Unsigned(n) => n.to_string(),
        Value::Signed(n) => n.to_string(),
        Value::Real(n) => n.to_string(),
        Value::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
    }
}

fn print_extensions(indent: &str, name: &str, extensions: &Extensions) {
    if extensions.is_empty() {
        return;
    }
    println!("{}{}: {} TREs", indent, name, extensions.len());
    for tre in extensions {
        match tre.body() {
            TreBody::Raw(_) => println!("{}  {} ({} bytes, raw)", indent, tre.tag(), tre.length()),
            TreBody::Fields(fields) => {
                println!("{}  {} ({} bytes)", indent, tre.tag(), tre.length());
                for field in fields {
                    println!(
                        "{}    {} = {}",
                        indent,
                        field.name(),
                        value_text(field.field().value())
                    );
                }
            }
        }
    }
}

fn show(c: Show) -> Result<(), Box<dyn Error>> {
    let file = File::open(&c.path)?;
    let options = ReaderOptions { strict_tres: c.strict };
    let mut reader = Reader::new(BufReader::new(file), Registry::with_builtins(), options);
    let record = match reader.read() {
        Ok(record) => record,
        Err(error) => {
            return Err(NitfInfoError::Reading {
                path: c.path,
                error: error.to_string(),
            }
            .into())
        }
    };

    let header = &record.header;
    println!("{}{}  CLEVEL {:02}", header.profile, header.version, header.complexity_level);
    println!("title: {}", header.title);
    println!("station: {}  date: {}", header.originating_station, header.date_time);
    println!("FL {}  HL {}", header.file_length, header.header_length);
    print_extensions("", "UDHD", &header.user_defined);
    print_extensions("", "XHD", &header.extended);

    for (i, segment) in record.images.iter().enumerate() {
        let s = &segment.subheader;
        println!(
            "image {}: {} {}x{} {} bands of {} bits, {} {}, IMODE {}",
            i,
            s.id,
            s.num_rows,
            s.num_cols,
            s.num_bands(),
            s.bits_per_pixel,
            s.representation,
            s.compression,
            s.mode
        );
        println!(
            "  blocks {}x{} of {}x{}, ILOC {},{}, IDLVL {} IALVL {}",
            s.blocks_per_col,
            s.blocks_per_row,
            s.block_rows,
            s.block_cols,
            s.location.row,
            s.location.col,
            s.display_level,
            s.attachment_level
        );
        println!("  data {} bytes at {}", segment.data_length, segment.data_offset);
        print_extensions("  ", "UDID", &s.user_defined);
        print_extensions("  ", "IXSHD", &s.extended);
    }
    for (i, segment) in record.graphics.iter().enumerate() {
        let s = &segment.subheader;
        println!("graphic {}: {} {}, {} bytes", i, s.id, s.name, segment.data_length);
        print_extensions("  ", "SXSHD", &s.extended);
    }
    for (i, segment) in record.texts.iter().enumerate() {
        let s = &segment.subheader;
        println!("text {}: {} {} {}, {} bytes", i, s.id, s.format, s.title, segment.data_length);
        print_extensions("  ", "TXSHD", &s.extended);
    }
    for (i, segment) in record.data_extensions.iter().enumerate() {
        let s = &segment.subheader;
        match s.overflow {
            Some(target) => println!(
                "DES {}: {} for {} item {}, {} bytes",
                i, s.type_id, target.section, target.item, segment.data_length
            ),
            None => println!("DES {}: {}, {} bytes", i, s.type_id, segment.data_length),
        }
    }
    for (i, segment) in record.reserved_extensions.iter().enumerate() {
        println!(
            "RES {}: {}, {} bytes",
            i, segment.subheader.type_id, segment.data_length
        );
    }
    for warning in reader.warnings() {
        println!("warning: {}", warning);
    }
    Ok(())
}

fn plan(c: Plan) -> Result<(), Box<dyn Error>> {
    let computer = match ImageSegmentComputer::blocked(
        c.rows,
        c.cols,
        c.bytes_per_pixel,
        c.block_rows,
        c.block_cols,
        Limits::default(),
    ) {
        Ok(computer) => computer,
        Err(error) => {
            return Err(NitfInfoError::Planning {
                error: error.to_string(),
            }
            .into())
        }
    };
    info!("row limit {}", computer.row_limit());

    println!(
        "{} segments, at most {} rows each",
        computer.num_segments(),
        computer.row_limit()
    );
    for (i, segment) in computer.segments().iter().enumerate() {
        println!(
            "{:3}: rows {}..{} ({} rows) ILOC {}",
            i,
            segment.first_row(),
            segment.end_row(),
            segment.num_rows(),
            segment.iloc()
        );
    }
    Ok(())
}

fn run() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let opts: Opts = Opts::parse();

    match opts.subcommand {
        SubCommand::Show(c) => show(c),
        SubCommand::Plan(c) => plan(c),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    match run() {
        Err(e) => Err(e.to_string().into()),
        Ok(_) => Ok(()),
    }
}
