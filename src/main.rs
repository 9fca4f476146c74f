//! Tracuu NNT CLI
//!
//! `run` drives the full lookup pipeline: read the input workbook, solve
//! captchas against the portal, scrape results and write the Excel/Word
//! reports into a dated folder. `solve` predicts a single captcha image.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use tracuu_nnt::browser::Browser;
use tracuu_nnt::captcha::{self, CaptchaSolver};
use tracuu_nnt::checker::TaxLookup;
use tracuu_nnt::state::RunState;
use tracuu_nnt::{config, input, logging, report};

#[derive(Parser, Debug)]
#[command(name = "tracuu-nnt", version, about = "Taxpayer lookup against the Vietnamese tax authority portal")]
struct Cli {
    #[arg(long, default_value = ".", help = "Working root containing config.json")]
    root: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full lookup pipeline
    Run {
        #[arg(long, help = "Run even if a run already completed today")]
        force: bool,
        #[arg(long, help = "Override the input workbook path")]
        input: Option<PathBuf>,
    },
    /// Predict a single captcha image
    Solve {
        #[arg(long, conflicts_with = "url", help = "Captcha image file")]
        image: Option<PathBuf>,
        #[arg(long, help = "Fetch the captcha from a URL first")]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { force, input } => run(&cli.root, force, input).await,
        Commands::Solve { image, url } => solve(&cli.root, image, url).await,
    }
}

async fn run(root: &Path, force: bool, input_override: Option<PathBuf>) -> Result<()> {
    let config = config::load(root)?;
    logging::init(&root.join("logs"))?;

    let state = RunState::new(root.join("run_state.json"));
    if !force && !state.should_run_today() {
        info!("Already processed today; pass --force to run again");
        return Ok(());
    }

    let data_dir = root
        .join("reports")
        .join(Local::now().format("%d_%m_%Y").to_string());
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

    let input_path = input_override.unwrap_or_else(|| root.join(&config.input_file));
    let codes = input::read_codes(&input_path, &config.input_column)?;
    ensure!(
        !codes.is_empty(),
        "No codes found in column '{}' of {:?}",
        config.input_column,
        input_path
    );
    info!(
        "Loaded {} codes from {:?} ({} portal)",
        codes.len(),
        input_path,
        config.portal.as_str()
    );

    let solver = CaptchaSolver::load(
        &root.join(&config.model_path),
        &root.join(&config.vocab_path),
    )?;

    let browser = Browser::launch(&config, root, &data_dir).await?;
    let mut lookup = TaxLookup::new(browser, solver, &config, root, &data_dir);

    let outcome = lookup.process_codes(&codes).await;
    lookup.shutdown().await;
    let run_report = match outcome {
        Ok(r) => r,
        Err(e) => {
            error!("Error during execution: {:#}", e);
            return Err(e);
        }
    };

    report::xlsx::write_results(&run_report, &data_dir.join("results.xlsx"))?;
    report::docx::write_report(
        &run_report,
        config.portal.code_column(),
        &data_dir,
        "Invoice Check Report",
    )?;

    state.save_run(Local::now().date_naive())?;
    info!("Lookup processing completed successfully");
    Ok(())
}

async fn solve(root: &Path, image: Option<PathBuf>, url: Option<String>) -> Result<()> {
    let config = config::load_or_default(root)?;

    let path = match (image, url) {
        (Some(path), _) => path,
        (None, Some(url)) => captcha::fetch_captcha(&url, &root.join("captcha")).await?,
        (None, None) => bail!("Provide --image or --url"),
    };

    let mut solver = CaptchaSolver::load(
        &root.join(&config.model_path),
        &root.join(&config.vocab_path),
    )?;
    let text = solver.predict(&path)?;
    println!("Predicted text: {}", text);
    Ok(())
}
