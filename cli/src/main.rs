#[macro_use]
extern crate log;

use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Arg, ArgMatches, Command};
use veggie_classifier::prelude::*;

const DEFAULT_MODEL: &str = "assets/model.onnx";
const UNSUPPORTED: &str = "Unsupported image format. Please upload a JPEG or PNG file.";

/// Entrypoint for the command-line interface.
fn main() {
    let matches = command().get_matches();

    let level = match matches.occurrences_of("verbosity") {
        0 => "veggie=warn,veggie_classifier=warn",
        1 => "veggie=info,veggie_classifier=info",
        2 => "veggie=debug,veggie_classifier=debug",
        _ => "veggie=trace,veggie_classifier=trace",
    };
    let env = env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, level);
    env_logger::Builder::from_env(env).format_timestamp_nanos().init();

    match handle(&matches) {
        Ok(true) => (),
        Ok(false) => process::exit(1),
        Err(e) => {
            error!("{e:?}");
            process::exit(1)
        }
    }
}

fn command() -> Command<'static> {
    Command::new("veggie")
        .version(clap::crate_version!())
        .about("Classifies vegetable photos with a pre-trained image model")
        .arg(
            Arg::new("images")
                .value_name("IMAGE")
                .required(true)
                .multiple_values(true)
                .help("JPEG or PNG files to classify"),
        )
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .takes_value(true)
                .value_name("PATH")
                .help("Model file or directory [default: assets/model.onnx]"),
        )
        .arg(
            Arg::new("format")
                .short('f')
                .long("format")
                .takes_value(true)
                .possible_values(["onnx", "nnef"])
                .help("Hint the model format instead of guessing it from the path"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .takes_value(true)
                .value_name("FILE")
                .help("JSON classifier configuration"),
        )
        .arg(
            Arg::new("labels")
                .short('l')
                .long("labels")
                .takes_value(true)
                .value_name("FILE")
                .help("Class labels, one per line, in model output order"),
        )
        .arg(
            Arg::new("input-size")
                .long("input-size")
                .takes_value(true)
                .value_name("N")
                .help("Side of the square model input [default: 128]"),
        )
        .arg(
            Arg::new("stable-softmax")
                .long("stable-softmax")
                .help("Subtract the max logit before exponentiating"),
        )
        .arg(
            Arg::new("top")
                .long("top")
                .takes_value(true)
                .value_name("N")
                .help("Only display the N most probable classes"),
        )
        .arg(Arg::new("json").long("json").help("Machine friendly output, one JSON object per image"))
        .arg(Arg::new("no-color").long("no-color").help("Disable ANSI colors"))
        .arg(
            Arg::new("load-timeout")
                .long("load-timeout")
                .takes_value(true)
                .value_name("MS")
                .help("Stop waiting for the model after MS milliseconds"),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .multiple_occurrences(true)
                .help("Sets the level of verbosity"),
        )
}

/// Defaults, then the config file, then individual flags.
fn config(matches: &ArgMatches) -> anyhow::Result<ClassifierConfig> {
    let mut config = match matches.value_of("config") {
        Some(path) => ClassifierConfig::from_path(path)?,
        None => ClassifierConfig::default(),
    };
    if let Some(path) = matches.value_of("labels") {
        config.labels = ClassLabels::from_path(path)?.iter().map(String::from).collect();
    }
    if let Some(size) = matches.value_of("input-size") {
        config.input_size = size.parse().with_context(|| format!("Invalid --input-size {size:?}"))?;
    }
    if matches.is_present("stable-softmax") {
        config.softmax = SoftmaxMode::Stable;
    }
    config.validate()?;
    Ok(config)
}

fn renderer(matches: &ArgMatches) -> anyhow::Result<Box<dyn Render + Send>> {
    if matches.is_present("json") {
        return Ok(Box::new(JsonRenderer::new(io::stdout())));
    }
    let mut terminal = TerminalRenderer::new(io::stdout());
    terminal.color = !matches.is_present("no-color") && atty::is(atty::Stream::Stdout);
    terminal.top = match matches.value_of("top") {
        Some(top) => Some(top.parse().with_context(|| format!("Invalid --top {top:?}"))?),
        None => None,
    };
    Ok(Box::new(terminal))
}

fn load_timeout(matches: &ArgMatches) -> anyhow::Result<Option<Duration>> {
    matches
        .value_of("load-timeout")
        .map(|ms| {
            ms.parse().map(Duration::from_millis).with_context(|| format!("Invalid --load-timeout {ms:?}"))
        })
        .transpose()
}

/// Returns false if any image was rejected or could not be classified.
fn handle(matches: &ArgMatches) -> anyhow::Result<bool> {
    let config = config(matches)?;
    let renderer = renderer(matches)?;
    let timeout = load_timeout(matches)?;
    let format = matches.value_of("format").map(str::parse::<ModelFormat>).transpose()?;
    let model_path = PathBuf::from(matches.value_of("model").unwrap_or(DEFAULT_MODEL));
    let input_shape = Preprocessor::new(&config).input_shape();

    let handle = ModelHandle::new();
    handle.spawn_load(move || {
        let model = TractModel::load(&model_path, format, input_shape)?;
        Ok(Arc::new(model) as Arc<dyn ScoreModel>)
    })?;

    let mut success = true;
    let mut uploads = vec![];
    for path in matches.values_of("images").into_iter().flatten() {
        match Upload::from_path(path) {
            Ok(upload) => uploads.push(upload),
            Err(e) => {
                error!("Could not read {path}: {e}");
                success = false;
            }
        }
    }

    match handle.wait_ready(timeout) {
        ModelStatus::Ready => (),
        ModelStatus::Failed(e) => warn!("Predictions will fail, model is unavailable: {e}"),
        status => warn!("Model is not ready after {timeout:?} ({status:?})"),
    }

    let session = Session::new(Classifier::new(&config, handle)?, renderer);
    let headers = uploads.len() > 1 && !matches.is_present("json");
    Ok(classify_all(&session, &uploads, headers, &mut io::stderr())? && success)
}

/// Submits every upload in order. Rejections are reported on `errors` and
/// the loop carries on. Returns false if anything was rejected or failed.
fn classify_all<R: Render>(
    session: &Session<R>,
    uploads: &[Upload],
    headers: bool,
    errors: &mut impl Write,
) -> anyhow::Result<bool> {
    let mut success = true;
    for upload in uploads {
        if headers {
            println!("\n==> {} <==", upload.name);
        }
        match session.submit(upload) {
            Ok(Outcome::Rendered(Some(_))) => (),
            Ok(outcome) => {
                debug!("{}: {outcome:?}", upload.name);
                success = false;
            }
            Err(ClassifierError::UnsupportedFormat { mime }) => {
                writeln!(errors, "{}: {UNSUPPORTED}", upload.name)?;
                debug!("{} declared as {mime}", upload.name);
                success = false;
            }
            Err(e) => return Err(e).with_context(|| format!("Rendering {}", upload.name)),
        }
    }
    Ok(success)
}
