//! jpegls CLI - encode, decode or inspect JPEG-LS files.

use clap::{Parser, Subcommand, ValueEnum};
use log::{LevelFilter, debug};
use std::fs;
use std::path::PathBuf;

use jpegls_bridge::{InterleaveMode, JpegLsCodec, MetadataInfo};

/// JPEG-LS codec with a CharLS compatible native interface
#[derive(Parser)]
#[command(name = "jpegls")]
#[command(version)]
#[command(about = "JPEG-LS encoder and decoder", long_about = None)]
#[command(after_help = "EXAMPLES:
    jpegls info -i image.jls
    jpegls encode -i pixels.raw -o image.jls -w 512 -H 512 -n 3 --interleave sample
    jpegls decode -i image.jls -o image.ppm -f pnm

RAW PIXEL LAYOUT:
    Samples of more than 8 bits take two little-endian bytes. Planar (none)
    input stores one complete plane per component.")]
struct Cli {
    /// Log debug output (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the image description stored in a JPEG-LS header
    #[command(visible_alias = "i")]
    Info {
        /// Input JPEG-LS file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Encode raw pixels to JPEG-LS
    #[command(visible_alias = "e")]
    Encode {
        /// Input raw pixel file
        #[arg(short, long)]
        input: PathBuf,

        /// Output JPEG-LS file
        #[arg(short, long)]
        output: PathBuf,

        /// Image width in pixels
        #[arg(short, long)]
        width: i32,

        /// Image height in pixels
        #[arg(short = 'H', long)]
        height: i32,

        /// Number of components (1=grayscale, 3=RGB)
        #[arg(short = 'n', long, default_value = "1")]
        components: i32,

        /// Bits per sample (2-16)
        #[arg(short, long, default_value = "8")]
        bits: i32,

        /// Layout of multi-component input
        #[arg(long, default_value = "none", value_enum)]
        interleave: Interleave,

        /// Maximum error per sample (0=lossless)
        #[arg(long, default_value = "0")]
        near: i32,

        /// Write a JFIF APP0 header
        #[arg(long)]
        jfif: bool,
    },

    /// Decode a JPEG-LS image to raw pixels or PNM
    #[command(visible_alias = "d")]
    Decode {
        /// Input JPEG-LS file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "raw", value_enum)]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Interleave {
    /// One plane per component
    None,
    /// Line interleaved
    Line,
    /// Sample (pixel) interleaved
    Sample,
}

impl From<Interleave> for InterleaveMode {
    fn from(value: Interleave) -> Self {
        match value {
            Interleave::None => InterleaveMode::None,
            Interleave::Line => InterleaveMode::Line,
            Interleave::Sample => InterleaveMode::Sample,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Decoded samples as stored by the codec
    Raw,
    /// Binary PGM / PPM
    Pnm,
}

fn main() {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::new();
    logger.filter_level(if cli.verbose { LevelFilter::Debug } else { LevelFilter::Warn });
    logger.parse_default_env();
    logger.init();

    let codec = JpegLsCodec::new();
    let result = match cli.command {
        Commands::Info { input } => show_info(&codec, &input),
        Commands::Encode {
            input,
            output,
            width,
            height,
            components,
            bits,
            interleave,
            near,
            jfif,
        } => {
            let metadata = MetadataInfo::new(width, height, bits, components)
                .with_interleave_mode(interleave.into())
                .with_allowed_lossy_error(near);
            encode_image(&codec, &input, &output, &metadata, jfif)
        }
        Commands::Decode {
            input,
            output,
            format,
        } => decode_image(&codec, &input, &output, format),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn show_info(codec: &JpegLsCodec, input: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    let metadata = codec.get_metadata_info(&data)?;

    println!("File: {:?}", input);
    println!("Size: {} bytes", data.len());
    println!();
    println!("  Dimensions: {}x{}", metadata.width, metadata.height);
    println!("  Bit depth:  {} bits", metadata.bits_per_sample);
    println!("  Components: {}", metadata.component_count);
    println!("  Interleave: {:?}", metadata.interleave_mode);
    if metadata.allowed_lossy_error == 0 {
        println!("  Mode:       Lossless");
    } else {
        println!("  Mode:       Near-lossless (NEAR={})", metadata.allowed_lossy_error);
    }
    println!("  Decoded:    {} bytes", metadata.uncompressed_size()?);
    Ok(())
}

fn encode_image(
    codec: &JpegLsCodec,
    input: &PathBuf,
    output: &PathBuf,
    metadata: &MetadataInfo,
    jfif: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let pixels = fs::read(input)?;
    let expected = metadata.uncompressed_size()?;
    if pixels.len() < expected {
        return Err(format!("{:?} holds {} bytes, the image needs {expected}", input, pixels.len()).into());
    }

    let compressed = codec.compress_with_count(metadata, &pixels, expected, jfif)?;
    fs::write(output, &compressed)?;

    debug!("ratio {:.2}", expected as f64 / compressed.len() as f64);
    println!("Encoded {} bytes into {} bytes: {:?}", expected, compressed.len(), output);
    Ok(())
}

fn decode_image(
    codec: &JpegLsCodec,
    input: &PathBuf,
    output: &PathBuf,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = fs::read(input)?;
    let bytes = match format {
        OutputFormat::Raw => codec.decompress(&data)?,
        OutputFormat::Pnm => codec.decode_bitmap(&data)?.to_pnm(),
    };
    fs::write(output, &bytes)?;

    println!("Decoded {} bytes into {} bytes: {:?}", data.len(), bytes.len(), output);
    Ok(())
}
