// Clippy allows
#![allow(clippy::too_many_arguments)]

//! dmap: differentially methylated region detection
//!
//! Usage: dmap <COMMAND> [OPTIONS]

use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use dmap_tools::commands::{DmrCommand, MatMergeCommand};
use dmap_tools::config::{
    DmrConfig, DEFAULT_GAP, DEFAULT_MAX_PVALUE, DEFAULT_MIN_COVERAGE, DEFAULT_MIN_METH_DIFF,
    DEFAULT_MIN_SITES_CONTROL, DEFAULT_MIN_SITES_TEST, DEFAULT_WINDOW_SIZE,
};
use dmap_tools::coverage::Result;

#[derive(Parser)]
#[command(name = "dmap")]
#[command(version)]
#[command(about = "dmap: detect differentially methylated regions between two samples", long_about = None)]
struct Cli {
    /// Number of threads to use (default: number of CPUs)
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect differentially methylated regions between a test and a control sample
    Dmr {
        /// Sorted coverage file of the test sample
        test: PathBuf,

        /// Sorted coverage file of the control sample
        control: PathBuf,

        /// Window size in bases
        #[arg(short = 'w', long = "window", default_value_t = DEFAULT_WINDOW_SIZE)]
        window_size: u64,

        /// Minimum well-covered sites in the test sample per window
        #[arg(short = 't', long, default_value_t = DEFAULT_MIN_SITES_TEST)]
        min_sites_test: usize,

        /// Minimum well-covered sites in the control sample per window
        #[arg(short = 'c', long, default_value_t = DEFAULT_MIN_SITES_CONTROL)]
        min_sites_control: usize,

        /// Minimum read coverage for a site to count as well covered
        #[arg(short = 'd', long, default_value_t = DEFAULT_MIN_COVERAGE)]
        min_coverage: u64,

        /// Minimum absolute methylation difference
        #[arg(short = 'm', long, default_value_t = DEFAULT_MIN_METH_DIFF)]
        min_diff: f64,

        /// Maximum Fisher exact test p-value
        #[arg(short = 'p', long, default_value_t = DEFAULT_MAX_PVALUE)]
        pvalue: f64,

        /// Join windows up to this many window lengths apart
        #[arg(short = 'g', long, default_value_t = DEFAULT_GAP)]
        gap: u64,

        /// Join windows whose methylation changes in opposite directions
        #[arg(short = 'x', long)]
        cross_direction: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print scan statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Merge two methylation matrix files at the sites of a comparison file
    Matmerge {
        /// Comparison file listing the sites to merge
        mcomp: PathBuf,

        /// First matrix file
        mat1: PathBuf,

        /// Second matrix file
        mat2: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print merge statistics to stderr
        #[arg(long)]
        stats: bool,
    },
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    // A logger may already be installed when embedded; keep it.
    let _ = builder.try_init();
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    // Configure thread pool if --threads specified
    if let Some(n) = cli.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(n).build_global() {
            eprintln!("Error: Failed to initialize thread pool: {}", e);
            process::exit(1);
        }
    }

    let result = match cli.command {
        Commands::Dmr {
            test,
            control,
            window_size,
            min_sites_test,
            min_sites_control,
            min_coverage,
            min_diff,
            pvalue,
            gap,
            cross_direction,
            output,
            stats,
        } => {
            let config = DmrConfig::new()
                .with_window_size(window_size)
                .with_min_sites(min_sites_test, min_sites_control)
                .with_min_coverage(min_coverage)
                .with_min_meth_diff(min_diff)
                .with_max_pvalue(pvalue)
                .with_gap(gap)
                .with_cross_direction(cross_direction);
            run_dmr(config, test, control, output, stats)
        }

        Commands::Matmerge {
            mcomp,
            mat1,
            mat2,
            output,
            stats,
        } => run_matmerge(mcomp, mat1, mat2, output, stats),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

/// Open the output destination: a created file, or locked stdout.
fn open_output(output: Option<PathBuf>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) => Ok(Box::new(File::create(path)?)),
        None => Ok(Box::new(io::stdout().lock())),
    }
}

fn run_dmr(
    config: DmrConfig,
    test: PathBuf,
    control: PathBuf,
    output: Option<PathBuf>,
    stats: bool,
) -> Result<()> {
    // Reject bad thresholds before touching the output file.
    config.validate()?;
    let handle = open_output(output)?;

    let result = DmrCommand::new(config).run(&test, &control, handle)?;

    if stats {
        eprintln!("DMR stats: {}", result);
    }

    Ok(())
}

fn run_matmerge(
    mcomp: PathBuf,
    mat1: PathBuf,
    mat2: PathBuf,
    output: Option<PathBuf>,
    stats: bool,
) -> Result<()> {
    let handle = open_output(output)?;

    let result = MatMergeCommand::new().run(&mcomp, &mat1, &mat2, handle)?;

    if stats {
        eprintln!("Matmerge stats: {}", result);
    }

    Ok(())
}
