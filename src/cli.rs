// ============================================================================
// ThresholdFE CLI — headless batch thresholding via command-line arguments
// ============================================================================
//
// Usage examples:
//   thresholdfe --input scan.png --output mask.png --level 100
//   thresholdfe -i scan.jpg -o out.png --otsu
//   thresholdfe -i "scans/*.png" --output-dir masks/ --mode to-zero --inverted
//
// No GUI is opened in CLI mode. Files are processed one after another on the
// current thread; each threshold call still splits rows across rayon workers.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};

use crate::io::{SaveFormat, encode_and_write, load_image_sync};
use crate::ops::adjustments;
use crate::ops::dialogs::{BaseMode, ThresholdControls};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CliMode {
    Binary,
    Truncate,
    ToZero,
}

impl From<CliMode> for BaseMode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Binary => BaseMode::Normal,
            CliMode::Truncate => BaseMode::Truncate,
            CliMode::ToZero => BaseMode::ToZero,
        }
    }
}

/// ThresholdFE headless batch thresholding.
#[derive(Parser, Debug)]
#[command(
    name = "thresholdfe",
    about = "ThresholdFE headless batch thresholding",
    long_about = "Apply binary, truncate or to-zero thresholding to image files without\n\
                  opening the GUI. Supports PNG, JPEG, WEBP, BMP and TGA output.\n\n\
                  Example:\n  \
                  thresholdfe --input scan.png --output mask.png --level 100\n  \
                  thresholdfe -i \"*.jpg\" --otsu --output-dir masks/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "scans/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Base threshold mode.
    #[arg(short, long, value_enum, default_value_t = CliMode::Binary)]
    pub mode: CliMode,

    /// Invert the result (ignored with --mode truncate).
    #[arg(long)]
    pub inverted: bool,

    /// Pick the level automatically with Otsu's method (--level is ignored).
    #[arg(long)]
    pub otsu: bool,

    /// Threshold level (0–255).
    #[arg(short, long, default_value_t = 128, value_name = "0-255")]
    pub level: u8,

    /// Value written for pixels that pass a binary threshold.
    #[arg(long, default_value_t = 255, value_name = "0-255")]
    pub max_value: u8,

    /// Output format: png, jpeg, webp, bmp, tga.
    /// When omitted, the format is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1–100, default 90).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// Print the level used and per-file timing.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }

    /// Controls equivalent to the dialog state these flags describe.
    pub fn controls(&self) -> ThresholdControls {
        ThresholdControls::new(self.mode.into(), self.inverted, self.otsu, self.level)
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir alone to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let save_format = match parse_format(args.format.as_deref(), args.output.as_deref()) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let controls = args.controls();
    if args.inverted && !controls.invert_enabled() {
        eprintln!("warning: --inverted has no effect with --mode truncate.");
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) = build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            save_format,
        ) else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, controls, args.max_value, save_format, args.quality) {
            Ok(level) => {
                if args.verbose || multi {
                    println!(
                        "  → {} (level {}, code {}, {:.0}ms)",
                        output_path.display(),
                        level,
                        controls.kind().code(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

/// Load, threshold and save one file. Returns the level actually used.
fn run_one(
    input: &Path,
    output: &Path,
    controls: ThresholdControls,
    max_value: u8,
    format: SaveFormat,
    quality: u8,
) -> Result<u8, String> {
    let src = load_image_sync(input).map_err(|e| format!("load failed: {}", e))?;
    let mut dst = image::RgbaImage::new(src.width(), src.height());
    let level = adjustments::threshold(&src, &mut dst, controls.level, max_value, controls.kind());
    encode_and_write(&dst, output, format, quality).map_err(|e| format!("save failed: {}", e))?;
    Ok(level)
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);
        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Choose the [`SaveFormat`] from `--format` or the output extension.
/// Defaults to PNG when neither names a known format.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> Result<SaveFormat, String> {
    if let Some(f) = format_arg {
        return SaveFormat::from_name(f).ok_or_else(|| format!("unsupported output format '{}'", f));
    }
    Ok(output.and_then(SaveFormat::from_path).unwrap_or_default())
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output`
/// 2. `--output-dir` (input stem + format extension)
/// 3. Next to the input, with `_threshold` appended to the stem
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: SaveFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_threshold.{}", stem, ext)))
}
