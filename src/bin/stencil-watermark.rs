use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use stencil_watermark_removal::mask::MaskConfig;
use stencil_watermark_removal::{
    default_output_path, ProcessOptions, ProcessResult, WatermarkEngine,
};

#[derive(Parser)]
#[command(
    name = "stencil-watermark",
    about = "Remove a fixed stencil watermark overlay via reverse alpha blending",
    version,
    after_help = "Simple usage: stencil-watermark <image>  (auto-detect and remove)\n\n\
                  The stencil bitmaps (mask_96.png, mask_48.png) are loaded from the\n\
                  --masks directory. When no stencil matches, pass --overlay with a\n\
                  copy of the image whose watermark region is painted in red."
)]
struct Cli {
    /// Input image file or directory
    input: String,

    /// Output file or directory (default: {name}_cleaned.{ext})
    #[arg(short, long)]
    output: Option<String>,

    /// Directory holding the stencil bitmaps
    #[arg(short, long, default_value = "assets")]
    masks: PathBuf,

    /// Painted overlay image: repair the marked region instead of
    /// running stencil removal
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Skip watermark detection, process unconditionally
    #[arg(short, long)]
    force: bool,

    /// Brightness-difference detection threshold (0-255 luminance units)
    #[arg(short, long, default_value = "10.0")]
    threshold: f32,

    /// Stencil intensity multiplier (raise if traces remain, lower if
    /// removal leaves dark ghosting)
    #[arg(short, long, default_value = "1.0")]
    intensity: f32,

    /// Force a nominal stencil size (e.g. 48 or 96) instead of
    /// rule-based selection
    #[arg(long)]
    size: Option<u32>,

    /// Enable verbose output (prints engine events)
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    if !(0.0..=255.0).contains(&cli.threshold) {
        eprintln!("Error: Threshold must be between 0.0 and 255.0");
        process::exit(1);
    }
    if cli.intensity <= 0.0 {
        eprintln!("Error: Intensity must be positive");
        process::exit(1);
    }

    let opts = ProcessOptions {
        force: cli.force,
        threshold: cli.threshold,
        intensity: cli.intensity,
        force_size: cli.size,
        ..ProcessOptions::default()
    };

    let configs = MaskConfig::reference_set(&cli.masks);
    let (engine, failures) = WatermarkEngine::load(&configs);

    for failure in &failures {
        if !cli.quiet {
            eprintln!(
                "WARNING: stencil {} unavailable: {}",
                failure.nominal_size, failure.error
            );
        }
    }

    if cli.verbose {
        for config in &configs {
            if let Some(mask) = engine.repository().get(config.nominal_size) {
                eprintln!(
                    "[mask] {}px loaded: {}x{}, margin {}px, {:.1}% coverage",
                    config.nominal_size,
                    mask.width(),
                    mask.height(),
                    mask.margin(),
                    mask.coverage() * 100.0
                );
            }
        }
    }

    let engine = if cli.verbose {
        engine.with_event_sink(|event: &stencil_watermark_removal::events::EngineEvent| {
            eprintln!("[event] {event:?}");
        })
    } else {
        engine
    };

    if let Some(size) = cli.size {
        if engine.repository().get(size).is_none() {
            eprintln!("Error: No stencil loaded for nominal size {size}");
            process::exit(1);
        }
    }

    let input_path = Path::new(&cli.input);
    if !input_path.exists() {
        eprintln!("Error: Input path does not exist: {}", cli.input);
        process::exit(1);
    }

    if engine.repository().is_empty() && cli.overlay.is_none() {
        eprintln!(
            "Error: No stencils loaded from {} and no --overlay given; \
             nothing to do",
            cli.masks.display()
        );
        process::exit(1);
    }

    if !cli.quiet && cli.overlay.is_none() {
        if opts.force {
            eprintln!("WARNING: Force mode - processing ALL images without detection!");
        } else {
            eprintln!(
                "Auto-detection enabled (brightness threshold: {:.1})",
                opts.threshold
            );
        }
        eprintln!();
    }

    let results = if let Some(overlay) = &cli.overlay {
        if input_path.is_dir() {
            eprintln!("Error: --overlay repairs a single image, not a directory");
            process::exit(1);
        }
        let output_path = cli
            .output
            .as_ref()
            .map_or_else(|| default_output_path(input_path), PathBuf::from);
        vec![engine.repair_file(input_path, overlay, &output_path, &opts)]
    } else if input_path.is_dir() {
        let Some(output_dir) = cli.output.as_ref().map(PathBuf::from) else {
            eprintln!("Error: Output directory is required for batch processing");
            eprintln!("Usage: stencil-watermark <input_dir> -o <output_dir>");
            process::exit(1);
        };
        engine.process_directory(input_path, &output_dir, &opts)
    } else {
        let output_path = cli
            .output
            .as_ref()
            .map_or_else(|| default_output_path(input_path), PathBuf::from);
        vec![engine.process_file(input_path, &output_path, &opts)]
    };

    let mut success_count = 0u32;
    let mut skip_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        print_result(r, cli.quiet, cli.verbose);
        if r.skipped {
            skip_count += 1;
        } else if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
        }
    }

    if results.len() > 1 && !cli.quiet {
        eprintln!();
        eprint!("[Summary] Processed: {success_count}");
        if skip_count > 0 {
            eprint!(", Skipped: {skip_count}");
        }
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn print_result(result: &ProcessResult, quiet: bool, verbose: bool) {
    if quiet && result.success {
        return;
    }

    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if result.skipped {
        if !quiet {
            eprintln!("[SKIP] {filename}: {}", result.message);
        }
    } else if result.success {
        if !quiet {
            if let Some(difference) = result.difference {
                eprintln!("[OK] {filename} (brightness difference {difference:.1})");
            } else {
                eprintln!("[OK] {filename}");
            }
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }

    if verbose && !result.message.is_empty() {
        eprintln!("  -> {}", result.message);
    }
}
