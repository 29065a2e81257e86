#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use blockdecomp::io::{DecompositionSummary, load_matrix, write_matrix};
use blockdecomp::{DecompositionConfig, Method, Threshold, decompose};
use clap::Parser;
use std::process;

#[derive(Parser)]
#[command(
    name = "blockdecomp",
    version,
    about = "Decompose a covariance matrix into paired x/y components (CCA, PLS or MLR)",
    long_about = "Builds the two-block generalized eigenproblem for the chosen method, optionally \
                 with a ridge penalty and an SVD subspace reduction, and writes the projection \
                 matrix and a TOML summary."
)]
struct Cli {
    /// Path to the square covariance matrix (headerless TSV or CSV)
    #[arg(long, value_name = "PATH")]
    covariance: String,

    /// Indices of the x block, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    x: Vec<usize>,

    /// Indices of the y block, comma separated
    #[arg(long, value_delimiter = ',', required = true)]
    y: Vec<usize>,

    /// Interpret --x and --y as 1-based indices
    #[arg(long)]
    one_based: bool,

    /// Method name, e.g. cca, plsridge, mlrqridgesvd (overrides --config)
    #[arg(long)]
    method: Option<String>,

    /// Threshold value(s): one scalar, one per block, or one per variable (overrides --config)
    #[arg(long = "thr", value_delimiter = ',')]
    thr: Vec<f64>,

    /// Keep complex eigenpairs instead of restricting the solve to real parts
    #[arg(long)]
    complex: bool,

    /// Path to a TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<String>,

    /// Output prefix; writes <out>_projection.tsv and <out>_summary.toml
    #[arg(long, default_value = "blockdecomp")]
    out: String,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn to_zero_based(indices: &[usize], one_based: bool) -> Result<Vec<usize>, String> {
    if !one_based {
        return Ok(indices.to_vec());
    }
    indices
        .iter()
        .map(|&i| {
            i.checked_sub(1)
                .ok_or_else(|| "Index 0 is not valid with --one-based".to_string())
        })
        .collect()
}

fn resolve_config(cli: &Cli) -> Result<DecompositionConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => {
            println!("Loading configuration from: {path}");
            DecompositionConfig::load(path)?
        }
        None => DecompositionConfig::default(),
    };
    if let Some(name) = &cli.method {
        config.method = name.parse::<Method>()?;
    }
    if !cli.thr.is_empty() {
        config.threshold = Threshold::from_slice(&cli.thr)?;
    }
    if cli.complex {
        config.real_part = false;
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(&cli)?;
    let x = to_zero_based(&cli.x, cli.one_based)?;
    let y = to_zero_based(&cli.y, cli.one_based)?;

    println!("Loading covariance matrix from: {}", cli.covariance);
    let covariance = load_matrix(&cli.covariance)?;
    println!(
        "Loaded {}x{} matrix; |x| = {}, |y| = {}",
        covariance.nrows(),
        covariance.ncols(),
        x.len(),
        y.len()
    );

    let result = decompose(&covariance, &x, &y, &config)?;
    println!(
        "{}: {} components via {:?} (cond = {:.3e})",
        result.method,
        result.n_components(),
        result.solver,
        result.condition_number
    );
    println!(
        "D = [{}]",
        result
            .real_strengths()
            .iter()
            .map(|v| format!("{v:.6}"))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let max_imaginary = result.max_imaginary();
    if max_imaginary > 0.0 {
        log::warn!(
            "Dropping imaginary parts up to {max_imaginary:.3e} when writing the projection"
        );
    }

    let projection_path = format!("{}_projection.tsv", cli.out);
    write_matrix(&projection_path, &result.real_projection())?;
    let summary_path = format!("{}_summary.toml", cli.out);
    DecompositionSummary::from(&result).save(&summary_path)?;
    println!("Wrote {projection_path} and {summary_path}");
    Ok(())
}
