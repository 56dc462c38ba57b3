use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command, ValueHint};
use log::LevelFilter;
use serde_json::json;
use std::path::PathBuf;

use thyra_cli::commands::{run_prediction, run_training};
use thyra_cli::config::ServiceConfig;
use thyra_cli::server;

fn config_arg() -> Arg {
    Arg::new("config")
        .help("Path to JSON configuration file. Defaults are used when omitted.")
        .required(false)
        .value_parser(clap::value_parser!(PathBuf))
        .value_hint(ValueHint::FilePath)
}

fn artifacts_arg() -> Arg {
    Arg::new("artifacts")
        .short('a')
        .long("artifacts")
        .value_parser(clap::builder::NonEmptyStringValueParser::new())
        .help("Model bundle directory. Overrides artifacts.dir in the configuration file.")
        .value_hint(ValueHint::DirPath)
}

fn dataset_arg() -> Arg {
    Arg::new("dataset")
        .short('d')
        .long("dataset")
        .value_parser(clap::builder::NonEmptyStringValueParser::new())
        .help(
            "Path to the labeled training data (*.csv or *.tsv). \
             Overrides dataset_path in the configuration file.",
        )
        .value_hint(ValueHint::FilePath)
}

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("THYRA_LOG", "error,thyra=info"))
        .init();

    let matches = Command::new("thyra")
        .version(clap::crate_version!())
        .about("Thyroid nodule malignancy prediction: train, predict and serve")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("train")
                .about("Train a model bundle from the labeled dataset and make it active")
                .arg(config_arg())
                .arg(dataset_arg())
                .arg(artifacts_arg()),
        )
        .subcommand(
            Command::new("predict")
                .about("Predict a single patient record (JSON), training first if no model exists")
                .arg(config_arg())
                .arg(
                    Arg::new("input")
                        .short('i')
                        .long("input")
                        .help("Path to a JSON file holding one patient record")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(dataset_arg())
                .arg(artifacts_arg()),
        )
        .subcommand(
            Command::new("serve")
                .about("Run the HTTP prediction service")
                .arg(config_arg())
                .arg(
                    Arg::new("bind")
                        .short('b')
                        .long("bind")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("Address to listen on, e.g. 0.0.0.0:8000")
                        .value_hint(ValueHint::Other),
                )
                .arg(
                    Arg::new("database")
                        .long("database")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("SQLite file for prediction history")
                        .value_hint(ValueHint::FilePath),
                )
                .arg(dataset_arg())
                .arg(artifacts_arg()),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    let result = match matches.subcommand() {
        Some(("train", sub_m)) => handle_train(sub_m),
        Some(("predict", sub_m)) => handle_predict(sub_m),
        Some(("serve", sub_m)) => handle_serve(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let config = ServiceConfig::from_arguments(matches)?;
    log::info!(
        "[thyra] Training from {}",
        config.dataset_path.display()
    );

    let outcome = run_training(&config)?;
    let summary = json!({
        "version": outcome.bundle.version(),
        "artifacts": config.artifacts.dir,
        "train_rows": outcome.summary.train_rows,
        "resampled_train_rows": outcome.summary.resampled_train_rows,
        "test_rows": outcome.summary.test_rows,
        "dropped_rows": outcome.summary.dropped_rows,
        "metrics": outcome.report,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn handle_predict(matches: &ArgMatches) -> Result<()> {
    let config = ServiceConfig::from_arguments(matches)?;
    let input: &PathBuf = matches
        .get_one("input")
        .context("--input is required")?;

    let prediction = run_prediction(&config, input)?;
    println!(
        "{}",
        json!({
            "prediction": prediction.label,
            "probability": prediction.probability,
        })
    );
    Ok(())
}

fn handle_serve(matches: &ArgMatches) -> Result<()> {
    let config = ServiceConfig::from_arguments(matches)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(server::serve(config))
}
