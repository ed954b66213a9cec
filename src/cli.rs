// Command-line front end for Oxidepth.
//
// Converts raw little-endian int16 frame files to and from containers and
// inspects container headers.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};

use crate::codec::trvl::{DEFAULT_CHANGE_THRESHOLD, DEFAULT_INVALIDATION_THRESHOLD};
use crate::codec::{CodecKind, Encoder, TrvlConfig};
use crate::container::{ContainerHeader, RECORD_PREFIX_LEN, format_shape};
use crate::io::{self as file_io, hex};

// ---------------------------------------------------------------------------
// Clap CLI definition
// ---------------------------------------------------------------------------

/// RVL / TRVL depth-frame compressor.
#[derive(Parser, Debug)]
#[command(
    name = "oxidepth",
    version,
    about = "RVL/TRVL depth-frame encoder/decoder",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Compress a raw int16 frame file into a container.
    Encode(EncodeArgs),
    /// Decompress a container into a raw int16 frame file.
    Decode(DecodeArgs),
    /// Print a container's header.
    Header(HeaderArgs),
    /// Print build/configuration details.
    Config,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CodecArg {
    Rvl,
    Trvl,
}

impl From<CodecArg> for CodecKind {
    fn from(arg: CodecArg) -> Self {
        match arg {
            CodecArg::Rvl => CodecKind::Rvl,
            CodecArg::Trvl => CodecKind::Trvl,
        }
    }
}

#[derive(Args, Debug)]
struct TrvlArgs {
    /// Absolute difference a pixel must exceed to be retransmitted.
    #[arg(long = "change-threshold", default_value_t = DEFAULT_CHANGE_THRESHOLD)]
    change_threshold: u32,

    /// Idle frames after which a pixel is reset to 0.
    #[arg(
        long = "invalidation-threshold",
        value_parser = clap::value_parser!(u32).range(1..),
        default_value_t = DEFAULT_INVALIDATION_THRESHOLD
    )]
    invalidation_threshold: u32,

    /// Transmit every change and never invalidate.
    #[arg(long, conflicts_with_all = ["change_threshold", "invalidation_threshold"])]
    lossless: bool,
}

#[derive(Args, Debug)]
struct EncodeArgs {
    /// Codec to write.
    #[arg(long, short = 'C', value_enum, default_value_t = CodecArg::Trvl)]
    codec: CodecArg,

    /// Frame width in pixels.
    #[arg(long, short = 'W', value_parser = clap::value_parser!(u64).range(1..))]
    width: u64,

    /// Frame height in pixels.
    #[arg(long, short = 'H', value_parser = clap::value_parser!(u64).range(1..))]
    height: u64,

    #[command(flatten)]
    trvl: TrvlArgs,

    /// Raw input file (little-endian int16, frames back to back).
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Container output file.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Container input file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Raw output file.
    #[arg(value_hint = ValueHint::FilePath)]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct HeaderArgs {
    /// Container input file.
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,
}

// ---------------------------------------------------------------------------
// Resolved command + options (flattened from Cli)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Encode,
    Decode,
    Header,
    Config,
}

#[derive(Debug)]
struct Options {
    command: Command,
    force: bool,
    quiet: bool,
    verbose: u8,
    json_output: bool,
    codec: CodecKind,
    frame_shape: Vec<usize>,
    trvl: TrvlConfig,
    input_file: Option<PathBuf>,
    output_file: Option<PathBuf>,
}

fn resolve_options(cli: Cli) -> Options {
    let mut opts = Options {
        command: Command::Config,
        force: cli.force,
        quiet: cli.quiet,
        verbose: cli.verbose.min(2),
        json_output: cli.json_output,
        codec: CodecKind::Trvl,
        frame_shape: Vec::new(),
        trvl: TrvlConfig::default(),
        input_file: None,
        output_file: None,
    };

    match cli.command {
        Cmd::Encode(args) => {
            opts.command = Command::Encode;
            opts.codec = args.codec.into();
            // Row-major frames: height rows of width pixels.
            opts.frame_shape = vec![args.height as usize, args.width as usize];
            opts.trvl = if args.trvl.lossless {
                TrvlConfig::lossless()
            } else {
                TrvlConfig {
                    change_threshold: args.trvl.change_threshold,
                    invalidation_threshold: args.trvl.invalidation_threshold,
                }
            };
            opts.input_file = Some(args.input);
            opts.output_file = Some(args.output);
        }
        Cmd::Decode(args) => {
            opts.command = Command::Decode;
            opts.input_file = Some(args.input);
            opts.output_file = Some(args.output);
        }
        Cmd::Header(args) => {
            opts.command = Command::Header;
            opts.input_file = Some(args.input);
        }
        Cmd::Config => {}
    }
    opts
}

#[cfg(any(test, feature = "fuzzing"))]
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv: Vec<String> = std::iter::once("oxidepth".to_string())
        .chain(args.iter().cloned())
        .collect();
    if let Ok(cli) = Cli::try_parse_from(argv) {
        let _ = resolve_options(cli);
    }
}

fn check_output(path: &Path, force: bool) -> Result<(), String> {
    if path.exists() && !force {
        return Err(format!(
            "output file exists, use -f to overwrite: {}",
            path.display()
        ));
    }
    Ok(())
}

fn emit_json(json: serde_json::Value) {
    eprintln!("{json:#}");
}

// ---------------------------------------------------------------------------
// Config command
// ---------------------------------------------------------------------------

fn cmd_config(opts: &Options) -> i32 {
    let version = env!("CARGO_PKG_VERSION");
    let file_io = cfg!(feature = "file-io") as u8;
    let parallel = cfg!(feature = "parallel") as u8;

    if opts.json_output {
        emit_json(serde_json::json!({
            "command": "config",
            "version": version,
            "file_io": file_io == 1,
            "parallel": parallel == 1,
            "default_change_threshold": DEFAULT_CHANGE_THRESHOLD,
            "default_invalidation_threshold": DEFAULT_INVALIDATION_THRESHOLD,
        }));
        return 0;
    }

    eprintln!("oxidepth version {version} (Rust)");
    eprintln!("FILE_IO={file_io}");
    eprintln!("PARALLEL={parallel}");
    eprintln!("CODECS={},{}", CodecKind::Rvl, CodecKind::Trvl);
    eprintln!("DEFAULT_CHANGE_THRESHOLD={DEFAULT_CHANGE_THRESHOLD}");
    eprintln!("DEFAULT_INVALIDATION_THRESHOLD={DEFAULT_INVALIDATION_THRESHOLD}");
    eprintln!("RECORD_PREFIX_LEN={RECORD_PREFIX_LEN}");
    0
}

// ---------------------------------------------------------------------------
// Encode command
// ---------------------------------------------------------------------------

fn cmd_encode(opts: &Options) -> i32 {
    let (Some(input), Some(output)) = (&opts.input_file, &opts.output_file) else {
        eprintln!("oxidepth: encode requires an input and an output file");
        return 1;
    };
    if let Err(msg) = check_output(output, opts.force) {
        eprintln!("oxidepth: {msg}");
        return 1;
    }

    let Some(frame_size) = opts
        .frame_shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
    else {
        eprintln!(
            "oxidepth: frame shape {} has too many pixels",
            format_shape(&opts.frame_shape)
        );
        return 1;
    };
    let encoder = match opts.codec {
        CodecKind::Rvl => Encoder::rvl(frame_size),
        CodecKind::Trvl => Encoder::trvl(frame_size, opts.trvl),
    };
    let mut encoder = match encoder {
        Ok(e) => e,
        Err(e) => {
            eprintln!("oxidepth: {e}");
            return 1;
        }
    };

    let stats = match file_io::encode_file(input, output, &opts.frame_shape, &mut encoder) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("oxidepth: encode error: {}: {e}", input.display());
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "oxidepth: encoder: {} frames of {}, {} -> {} bytes ({:.3})",
            stats.frames,
            format_shape(&opts.frame_shape),
            stats.raw_size,
            stats.container_size,
            stats.ratio()
        );
        if let Some(sha) = stats.container_sha256 {
            eprintln!("oxidepth: container sha256: {}", hex(&sha));
        }
    }

    if opts.json_output {
        let mut json = serde_json::json!({
            "command": "encode",
            "codec": stats.codec.name(),
            "shape": stats.shape,
            "frames": stats.frames,
            "raw_size": stats.raw_size,
            "container_size": stats.container_size,
            "ratio": stats.ratio(),
            "container_sha256": stats.container_sha256.map(|d| hex(&d)),
        });
        if stats.codec == CodecKind::Trvl {
            json["change_threshold"] = opts.trvl.change_threshold.into();
            json["invalidation_threshold"] = opts.trvl.invalidation_threshold.into();
        }
        emit_json(json);
    }

    0
}

// ---------------------------------------------------------------------------
// Decode command
// ---------------------------------------------------------------------------

fn cmd_decode(opts: &Options) -> i32 {
    let (Some(input), Some(output)) = (&opts.input_file, &opts.output_file) else {
        eprintln!("oxidepth: decode requires an input and an output file");
        return 1;
    };
    if let Err(msg) = check_output(output, opts.force) {
        eprintln!("oxidepth: {msg}");
        return 1;
    }

    let stats = match file_io::decode_file(input, output, None) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("oxidepth: decode error: {}: {e}", input.display());
            return 1;
        }
    };

    if opts.verbose > 0 && !opts.quiet {
        eprintln!(
            "oxidepth: decoder: {} {} frames, shape {}, {} -> {} bytes",
            stats.frames,
            stats.codec,
            format_shape(&stats.shape),
            stats.container_size,
            stats.raw_size
        );
        if stats.dtype != crate::container::DTYPE_INT16 {
            eprintln!(
                "oxidepth: note: container dtype is '{}', raw output is the int16 bit pattern",
                stats.dtype
            );
        }
    }

    if opts.json_output {
        emit_json(serde_json::json!({
            "command": "decode",
            "codec": stats.codec.name(),
            "shape": stats.shape,
            "dtype": stats.dtype,
            "frames": stats.frames,
            "container_size": stats.container_size,
            "raw_size": stats.raw_size,
            "container_sha256": stats.container_sha256.map(|d| hex(&d)),
        }));
    }

    0
}

// ---------------------------------------------------------------------------
// Header command
// ---------------------------------------------------------------------------

fn cmd_header(opts: &Options) -> i32 {
    let Some(path) = &opts.input_file else {
        eprintln!("oxidepth: header requires an input file");
        return 1;
    };
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("oxidepth: {}: {e}", path.display());
            return 1;
        }
    };
    let header = match ContainerHeader::decode(&mut BufReader::new(file)) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("oxidepth: invalid container header: {e}");
            return 1;
        }
    };

    if opts.json_output {
        emit_json(serde_json::json!({
            "command": "header",
            "codec": header.codec().name(),
            "shape": header.shape(),
            "dtype": header.dtype(),
            "frames": header.frame_count(),
            "frame_size": header.frame_size(),
        }));
        return 0;
    }

    if !opts.quiet {
        println!("Codec:                        {}", header.codec());
        println!("Shape:                        {}", format_shape(header.shape()));
        println!("Element type:                 {}", header.dtype());
        println!("Frames:                       {}", header.frame_count());
        println!("Pixels per frame:             {}", header.frame_size());
        if opts.verbose > 0 {
            println!("Header length:                {}", header.to_line().len());
        }
    }
    0
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run() -> ! {
    let cli = Cli::parse();
    let opts = resolve_options(cli);

    let default_filter = match opts.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let exit_code = match opts.command {
        Command::Encode => cmd_encode(&opts),
        Command::Decode => cmd_decode(&opts),
        Command::Header => cmd_header(&opts),
        Command::Config => cmd_config(&opts),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_opts(args: &[&str]) -> Options {
        let argv: Vec<String> = std::iter::once("oxidepth".to_string())
            .chain(args.iter().map(|s| s.to_string()))
            .collect();
        let cli = Cli::try_parse_from(argv).expect("cli parse failed");
        resolve_options(cli)
    }

    fn parse_fails(args: &[&str]) -> bool {
        let argv = std::iter::once("oxidepth").chain(args.iter().copied());
        Cli::try_parse_from(argv).is_err()
    }

    #[test]
    fn encode_subcommand_maps_correctly() {
        let opts = parse_opts(&[
            "encode",
            "--codec",
            "trvl",
            "--width",
            "640",
            "--height",
            "480",
            "--change-threshold",
            "4",
            "--invalidation-threshold",
            "5",
            "in.raw",
            "out.trvl",
        ]);
        assert_eq!(opts.command, Command::Encode);
        assert_eq!(opts.codec, CodecKind::Trvl);
        assert_eq!(opts.frame_shape, vec![480, 640]);
        assert_eq!(opts.trvl.change_threshold, 4);
        assert_eq!(opts.trvl.invalidation_threshold, 5);
        assert_eq!(opts.input_file, Some(PathBuf::from("in.raw")));
        assert_eq!(opts.output_file, Some(PathBuf::from("out.trvl")));
    }

    #[test]
    fn encode_defaults_and_lossless() {
        let opts = parse_opts(&["encode", "-W", "4", "-H", "2", "in", "out"]);
        assert_eq!(opts.codec, CodecKind::Trvl);
        assert_eq!(opts.trvl, TrvlConfig::default());

        let opts = parse_opts(&["encode", "-W", "4", "-H", "2", "--lossless", "in", "out"]);
        assert_eq!(opts.trvl, TrvlConfig::lossless());

        let opts = parse_opts(&["encode", "-C", "rvl", "-W", "4", "-H", "2", "in", "out"]);
        assert_eq!(opts.codec, CodecKind::Rvl);
    }

    #[test]
    fn invalid_encode_flags_rejected() {
        assert!(parse_fails(&["encode", "-W", "0", "-H", "2", "in", "out"]));
        assert!(parse_fails(&["encode", "-W", "4", "in", "out"]));
        assert!(parse_fails(&[
            "encode",
            "-W",
            "4",
            "-H",
            "2",
            "--invalidation-threshold",
            "0",
            "in",
            "out"
        ]));
        assert!(parse_fails(&[
            "encode",
            "-W",
            "4",
            "-H",
            "2",
            "--lossless",
            "--change-threshold",
            "3",
            "in",
            "out"
        ]));
        assert!(parse_fails(&["encode", "-C", "zip", "-W", "4", "-H", "2", "in", "out"]));
    }

    #[test]
    fn decode_and_header_map() {
        let opts = parse_opts(&["--quiet", "decode", "in.trvl", "out.raw"]);
        assert_eq!(opts.command, Command::Decode);
        assert!(opts.quiet);
        assert_eq!(opts.input_file, Some(PathBuf::from("in.trvl")));

        let opts = parse_opts(&["header", "in.trvl", "--json"]);
        assert_eq!(opts.command, Command::Header);
        assert!(opts.json_output);
    }

    #[test]
    fn global_flags() {
        let opts = parse_opts(&["--force", "decode", "in", "out"]);
        assert!(opts.force);
        let verbose = parse_opts(&["-vvv", "config"]);
        assert_eq!(verbose.verbose, 2);
        assert_eq!(verbose.command, Command::Config);
        assert!(parse_fails(&["-q", "-v", "config"]));
    }

    #[test]
    fn fuzz_parse_never_panics() {
        fuzz_try_parse_args(&["encode".into(), "-W".into()]);
        fuzz_try_parse_args(&["\u{0}".into()]);
    }
}
