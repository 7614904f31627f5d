use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use glob::glob;
use jpegkit::{
    ChromaSubsampling, DecoderOptions, EncoderOptions, Image, JpegDecoder, JpegEncoder, Logger, DEFAULT_MAX_PIXELS,
    DEFAULT_QUALITY,
};
use log::{debug, error, info, warn, LevelFilter};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[clap(name = "jpegkit", version, about = "Baseline and progressive JPEG decoder and encoder")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = ArgAction::Count, global = true, help = "More logging (-v info, -vv debug)")]
    verbose: u8,

    #[arg(long, global = true, conflicts_with = "verbose", help = "Only log errors")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the headers of JPEG files
    Info {
        #[arg(required = true)]
        patterns: Vec<String>,

        #[arg(long, help = "Print JSON instead of a table")]
        json: bool,

        #[command(flatten)]
        decoder: DecoderArgs,
    },

    /// Decode JPEG files to another image format
    Decode {
        #[arg(required = true)]
        patterns: Vec<String>,

        #[arg(short = 'o', long = "output-dir", help = "Output directory for converted files")]
        output_dir: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Png, help = "Output format")]
        format: OutputFormat,

        #[command(flatten)]
        decoder: DecoderArgs,
    },

    /// Encode images to baseline JPEG
    Encode {
        #[arg(required = true)]
        patterns: Vec<String>,

        #[arg(short = 'o', long = "output-dir", help = "Output directory for encoded files")]
        output_dir: Option<PathBuf>,

        #[arg(short, long, default_value_t = DEFAULT_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: u8,

        #[arg(long, value_enum, default_value_t = Subsampling::S420, help = "Chroma subsampling")]
        subsampling: Subsampling,
    },
}

#[derive(Args, Debug, Clone, Copy)]
struct DecoderArgs {
    #[arg(long, help = "Treat 3 or 4 components as YCbCr/YCCK unless an Adobe segment says otherwise")]
    color_transform: Option<bool>,

    #[arg(long, default_value_t = DEFAULT_MAX_PIXELS, help = "Reject frames with more pixels, 0 for no limit")]
    max_pixels: u64,
}

impl DecoderArgs {
    fn options(&self) -> DecoderOptions {
        DecoderOptions {
            color_transform: self.color_transform,
            max_pixels: (self.max_pixels > 0).then_some(self.max_pixels),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Png,
    Ppm,
    Bmp,
}

impl OutputFormat {
    fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Ppm => "ppm",
            OutputFormat::Bmp => "bmp",
        }
    }

    fn image_format(&self) -> image::ImageFormat {
        match self {
            OutputFormat::Png => image::ImageFormat::Png,
            OutputFormat::Ppm => image::ImageFormat::Pnm,
            OutputFormat::Bmp => image::ImageFormat::Bmp,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Subsampling {
    #[value(name = "420")]
    S420,
    #[value(name = "444")]
    S444,
}

impl From<Subsampling> for ChromaSubsampling {
    fn from(value: Subsampling) -> Self {
        match value {
            Subsampling::S420 => ChromaSubsampling::Yuv420,
            Subsampling::S444 => ChromaSubsampling::Yuv444,
        }
    }
}

fn get_files(patterns: &[String]) -> CliResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let base_dir = std::env::current_dir()?;

    for pattern in patterns {
        let absolute_pattern = if Path::new(pattern).is_relative() {
            base_dir.join(pattern).to_string_lossy().into_owned()
        } else {
            pattern.clone()
        };

        for entry in glob(&absolute_pattern)? {
            match entry {
                Ok(path) => {
                    if !path.is_file() {
                        continue;
                    }

                    files.push(path);
                }
                Err(e) => warn!("{}", e),
            }
        }
    }

    Ok(files)
}

fn get_output_path(file: &Path, output_dir: Option<&Path>, extension: &str) -> CliResult<PathBuf> {
    let file_stem = file
        .file_stem()
        .ok_or("Invalid file name")?
        .to_str()
        .ok_or("Invalid file stem")?;

    let output_path = match output_dir {
        Some(dir) => {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }

            dir.join(format!("{}.{}", file_stem, extension))
        }
        None => file
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("{}.{}", file_stem, extension)),
    };

    if output_path == file {
        return Err(format!("Refusing to overwrite {}", file.display()).into());
    }

    Ok(output_path)
}

fn info_file(file: &Path, options: DecoderOptions, json: bool) -> CliResult<String> {
    let data = fs::read(file)?;
    let mut decoder = JpegDecoder::new(&data, options);

    // Scan count and late tables are only known after the scans are read.
    if let Err(e) = decoder.decode_samples() {
        warn!("{}: {}", file.display(), e);
    }

    let info = decoder.info()?;

    if json {
        Ok(format!("{}\n", serde_json::to_string_pretty(&info)?))
    } else {
        Ok(format!("File: {}\n{}\n", file.display(), info))
    }
}

fn decode_file(file: &Path, options: DecoderOptions, output_dir: Option<&Path>, format: OutputFormat) -> CliResult<String> {
    let data = fs::read(file)?;
    let decoded = JpegDecoder::new(&data, options).decode()?;
    debug!("{}: decoded {}x{}", file.display(), decoded.width(), decoded.height());

    let rgb = image::RgbImage::from_raw(decoded.width(), decoded.height(), decoded.as_rgb8())
        .ok_or("Decoded buffer does not match its dimensions")?;

    let output_path = get_output_path(file, output_dir, format.extension())?;
    info!("Writing to: {}", output_path.display());
    rgb.save_with_format(&output_path, format.image_format())?;

    Ok(String::new())
}

fn load_image(file: &Path) -> CliResult<Image> {
    let source = image::open(file)?;

    // Alpha is dropped by the encoder, so sources without it skip the RGBA conversion.
    let image = if source.color().has_alpha() {
        let rgba = source.to_rgba8();
        let (width, height) = rgba.dimensions();
        Image::from_rgba8(width, height, rgba.into_raw())?
    } else {
        let rgb = source.to_rgb8();
        let (width, height) = rgb.dimensions();
        Image::from_rgb8(width, height, rgb.as_raw())?
    };

    Ok(image)
}

fn encode_file(file: &Path, options: EncoderOptions, output_dir: Option<&Path>) -> CliResult<String> {
    let encoded = JpegEncoder::new(options).encode(&load_image(file)?)?;

    let output_path = get_output_path(file, output_dir, "jpg")?;
    info!("Writing to: {} ({} bytes)", output_path.display(), encoded.len());
    fs::write(&output_path, encoded)?;

    Ok(String::new())
}

#[cfg(feature = "rayon")]
fn map_files<T: Send, F: Fn(&Path) -> T + Sync>(files: &[PathBuf], task: F) -> Vec<T> {
    use rayon::prelude::*;

    files.par_iter().map(|file| task(file)).collect()
}

#[cfg(not(feature = "rayon"))]
fn map_files<T, F: Fn(&Path) -> T>(files: &[PathBuf], task: F) -> Vec<T> {
    files.iter().map(|file| task(file)).collect()
}

/// Runs `task` on every file, prints outputs in input order and returns the failure count.
fn run_all<F: Fn(&Path) -> CliResult<String> + Sync>(files: &[PathBuf], task: F) -> usize {
    let results = map_files(files, |file| task(file).map_err(|e| e.to_string()));
    let mut failures = 0;

    for (file, result) in files.iter().zip(results) {
        match result {
            Ok(output) => print!("{}", output),
            Err(e) => {
                error!("{}: {}", file.display(), e);
                failures += 1;
            }
        }
    }

    failures
}

fn run(cli: &Cli) -> CliResult<usize> {
    let failures = match &cli.command {
        Command::Info { patterns, json, decoder } => {
            let files = get_files(patterns)?;
            if files.is_empty() {
                return Err(format!("No files found matching: {}", patterns.join(" ")).into());
            }

            let options = decoder.options();
            run_all(&files, |file| info_file(file, options, *json))
        }
        Command::Decode {
            patterns,
            output_dir,
            format,
            decoder,
        } => {
            let files = get_files(patterns)?;
            if files.is_empty() {
                return Err(format!("No files found matching: {}", patterns.join(" ")).into());
            }

            let options = decoder.options();
            run_all(&files, |file| decode_file(file, options, output_dir.as_deref(), *format))
        }
        Command::Encode {
            patterns,
            output_dir,
            quality,
            subsampling,
        } => {
            let files = get_files(patterns)?;
            if files.is_empty() {
                return Err(format!("No files found matching: {}", patterns.join(" ")).into());
            }

            let options = EncoderOptions {
                quality: *quality,
                subsampling: (*subsampling).into(),
            };
            run_all(&files, |file| encode_file(file, options, output_dir.as_deref()))
        }
    };

    Ok(failures)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match (cli.quiet, cli.verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Warn,
        (false, 1) => LevelFilter::Info,
        (false, 2) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };

    if let Err(e) = Logger::init(level) {
        eprintln!("Failed to initialize logger: {}", e);
    }

    match run(&cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failures) => {
            error!("{} file(s) failed", failures);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
