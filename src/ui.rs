// UI layer: the configuration wizard (`dialoguer`), spinners and the upload
// progress bar (`indicatif`), and colored status lines (`crossterm`).
// The functions are small and synchronous to make the flow easy to follow.

use crate::api::B2Client;
use crate::cli::{Action, Args};
use crate::clipboard;
use crate::config::{Config, ConfigFile, StoredConfig, DEFAULT_NAME_LENGTH, MAX_NAME_LENGTH};
use crate::error::Error;
use crate::store::ProgressFn;
use crate::uploader::{UploadRequest, Uploader};
use anyhow::{Context, Result};
use crossterm::style::Stylize;
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg}";
const UPLOAD_TEMPLATE: &str =
    "{msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

/// Run whatever the command line asked for.
pub fn run(args: &Args) -> Result<()> {
    let config_file = ConfigFile::locate(args.config_path.clone());
    tracing::debug!(path = %config_file.path().display(), "using config file");

    match args.action() {
        Action::Configure => configure(&config_file),
        Action::Upload { file, name } => upload(&config_file, file, name, !args.no_copy),
        Action::Delete(target) => delete(&config_file, &target),
        Action::ServeClipboard(text) => clipboard::serve_text(&text),
    }
}

/// Prompt for every setting, pre-filled with what is saved, and persist it.
pub fn configure(config_file: &ConfigFile) -> Result<()> {
    let current = config_file.load().unwrap_or_else(|e| {
        tracing::warn!("ignoring unreadable config: {:#}", e);
        None
    });
    let current = current.unwrap_or_default();

    let key_id: String = Input::new()
        .with_prompt("B2 Application Key ID")
        .with_initial_text(current.key_id.clone().unwrap_or_default())
        .interact_text()?;

    // Leaving the secret blank keeps the saved one.
    let has_key = current.application_key.is_some();
    let entered: String = Password::new()
        .with_prompt(if has_key {
            "B2 Application Key (blank to keep current)"
        } else {
            "B2 Application Key"
        })
        .allow_empty_password(has_key)
        .interact()?;
    let application_key = if entered.is_empty() {
        current.application_key.clone()
    } else {
        Some(entered)
    };

    let bucket: String = Input::new()
        .with_prompt("B2 Bucket Name")
        .with_initial_text(current.bucket.clone().unwrap_or_default())
        .interact_text()?;

    println!("{}", "Leave blank for the bucket root".dark_grey());
    let prefix: String = Input::new()
        .with_prompt("Upload path in bucket")
        .with_initial_text(current.prefix.clone().unwrap_or_default())
        .allow_empty(true)
        .interact_text()?;

    println!(
        "{}",
        "URL the links start with, e.g. a CNAME pointing at the bucket root".dark_grey()
    );
    let base_url: String = Input::new()
        .with_prompt("Public base URL")
        .with_initial_text(current.base_url.clone().unwrap_or_default())
        .validate_with(|input: &String| -> Result<(), &'static str> {
            match Url::parse(input) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
                _ => Err("Enter a full http(s) URL"),
            }
        })
        .interact_text()?;

    println!("{}", "Length of the random file name (4-12 recommended)".dark_grey());
    let name_length: usize = Input::new()
        .with_prompt("File name length")
        .default(current.name_length.unwrap_or(DEFAULT_NAME_LENGTH))
        .validate_with(|n: &usize| -> Result<(), String> {
            if (1..=MAX_NAME_LENGTH).contains(n) {
                Ok(())
            } else {
                Err(format!("Enter a number between 1 and {}", MAX_NAME_LENGTH))
            }
        })
        .interact_text()?;

    let config = Config::from_stored(StoredConfig {
        key_id: Some(key_id),
        application_key,
        bucket: Some(bucket),
        prefix: Some(prefix),
        base_url: Some(base_url),
        name_length: Some(name_length),
    })?;
    config_file.save(&config)?;
    println!(
        "{} Settings saved to {}",
        "✅".green(),
        config_file.path().display()
    );
    Ok(())
}

/// Upload `file`, or the clipboard image when no file is given, and show
/// (and optionally copy) the resulting link.
pub fn upload(
    config_file: &ConfigFile,
    file: Option<PathBuf>,
    name: Option<String>,
    copy: bool,
) -> Result<()> {
    let spinner = spinner("Loading config...")?;
    let config = finish_on_err(&spinner, config_file.load_config())?;

    // Keeps the temporary PNG alive until the upload is done.
    let mut captured = None;
    let path = match file {
        Some(path) => path,
        None => {
            spinner.set_message("Getting image from clipboard...");
            let image = finish_on_err(&spinner, clipboard::capture_image())?;
            let image = finish_on_err(&spinner, image.context("No image found in clipboard"))?;
            let path = image.path().to_path_buf();
            captured = Some(image);
            path
        }
    };

    spinner.set_message("Connecting to B2...");
    let client = finish_on_err(
        &spinner,
        B2Client::connect(&config.key_id, &config.application_key, &config.bucket)
            .map_err(anyhow::Error::from),
    )?;
    let uploader = Uploader::new(client, config);

    let request = UploadRequest::new(&path).with_name(name);
    let size = std::fs::metadata(&path)
        .with_context(|| format!("Cannot read {}", path.display()))
        .map(|m| m.len());
    let size = finish_on_err(&spinner, size)?;
    spinner.finish_and_clear();

    let bar = ProgressBar::new(size);
    bar.set_style(ProgressStyle::with_template(UPLOAD_TEMPLATE)?.progress_chars("=> "));
    bar.set_message("Uploading");
    let sink = bar.clone();
    let progress: ProgressFn = Box::new(move |sent| sink.set_position(sent));

    let result = uploader.upload(&request, Some(progress));
    bar.finish_and_clear();
    drop(captured);
    let result = result?;

    if copy {
        if let Err(e) = clipboard::copy_text(&result.url) {
            println!("{} {:#}", "⚠".yellow(), e);
        }
    }
    println!("{} {}", "✅".green(), result.url);
    Ok(())
}

/// Delete a previously uploaded file, telling "already gone" apart.
pub fn delete(config_file: &ConfigFile, target: &str) -> Result<()> {
    let spinner = spinner("Loading config...")?;
    let config = finish_on_err(&spinner, config_file.load_config())?;

    spinner.set_message("Connecting to B2...");
    let client = finish_on_err(
        &spinner,
        B2Client::connect(&config.key_id, &config.application_key, &config.bucket)
            .map_err(anyhow::Error::from),
    )?;
    let uploader = Uploader::new(client, config);

    spinner.set_message(format!("Deleting {}...", target));
    let key = finish_on_err(&spinner, uploader.delete(target).map_err(anyhow::Error::from))?;
    spinner.finish_and_clear();
    println!(
        "{} Deleted {} from {}",
        "✅".green(),
        key,
        uploader.store().bucket_name()
    );
    Ok(())
}

/// Print a failed run. Only the message chain by default, everything
/// including backtraces in verbose mode.
pub fn report_error(err: &anyhow::Error, verbose: bool) {
    if verbose {
        eprintln!("{} {:?}", "❌".red(), err);
    } else {
        eprintln!("{} {:#}", "❌".red(), err);
    }
    if let Some(hint) = err.downcast_ref::<Error>().and_then(hint_for) {
        eprintln!("{}", hint.dark_grey());
    }
}

fn hint_for(err: &Error) -> Option<&'static str> {
    match err {
        Error::Auth(_) => Some("Check your credentials with `uclip --config`."),
        Error::NameConflict(_) => Some("Pick another name with --name."),
        Error::NameExhausted { .. } => Some("Increase the file name length with `uclip --config`."),
        Error::Transient(_) => Some("This is usually temporary. Try again."),
        Error::NotFound(_) | Error::Unknown(_) => None,
    }
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template(SPINNER_TEMPLATE)?);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

// Clear the spinner before the error is printed so they don't interleave.
fn finish_on_err<T>(spinner: &ProgressBar, result: Result<T>) -> Result<T> {
    if result.is_err() {
        spinner.finish_and_clear();
    }
    result
}
