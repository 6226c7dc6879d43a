//! Interactive prompts for the music transfer.
//!
//! Every prompt returns `Ok(None)` when the user interrupts it (Ctrl+C or a
//! closed terminal), so callers can abort cleanly. Prompts are drawn on
//! stderr; stdout stays clean for the plan and summary.

use crate::types::AudioFormat;
use console::{Style, style};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromptError {
    #[error("Prompt failed: {0}")]
    Dialog(#[from] dialoguer::Error),
}

/// `ColorfulTheme` with the tool's prompt markers.
///
/// - Prompt prefix: cyan `?`
/// - Success prefix: green `✓`
/// - Error prefix: red `✗`
pub fn theme() -> ColorfulTheme {
    ColorfulTheme {
        prompt_prefix: style("?".to_string()).for_stderr().cyan(),
        prompt_style: Style::new().for_stderr().bold(),
        prompt_suffix: style("›".to_string()).for_stderr().bright().black(),
        success_prefix: style("✓".to_string()).for_stderr().green(),
        success_suffix: style("·".to_string()).for_stderr().bright().black(),
        error_prefix: style("✗".to_string()).for_stderr().red(),
        error_style: Style::new().for_stderr().red(),
        values_style: Style::new().for_stderr().green(),
        ..ColorfulTheme::default()
    }
}

/// Convert a dialoguer result into `Ok(Some(value))` on success, `Ok(None)` on
/// interrupt, and `Err` for other I/O failures.
fn handle_interrupt<T>(result: dialoguer::Result<T>) -> Result<Option<T>, PromptError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::Interrupted => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Keep the tokens of `answer` that name an allowed format, in the order
/// given, without duplicates.
pub fn parse_formats(answer: &str, allowed: &[AudioFormat]) -> Vec<AudioFormat> {
    let mut formats = Vec::new();
    for format in answer
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter_map(AudioFormat::from_token)
    {
        if allowed.contains(&format) && !formats.contains(&format) {
            formats.push(format);
        }
    }
    formats
}

/// Formats decided without asking: `--formats` wins, and `--yes` takes the
/// prompt's default of every allowed format. `None` means ask.
pub fn preset_formats(
    given: Option<&[String]>,
    yes: bool,
    allowed: &[AudioFormat],
) -> Option<Vec<AudioFormat>> {
    match given {
        Some(list) => Some(parse_formats(&list.join(" "), allowed)),
        None if yes => Some(allowed.to_vec()),
        None => None,
    }
}

fn join(formats: &[AudioFormat]) -> String {
    formats
        .iter()
        .map(|f| f.extension())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Ask which of `allowed` the device accepts. May return an empty list.
pub fn ask_formats(
    theme: &ColorfulTheme,
    allowed: &[AudioFormat],
) -> Result<Option<Vec<AudioFormat>>, PromptError> {
    let Some(answer) = handle_interrupt(
        Input::<String>::with_theme(theme)
            .with_prompt(format!("Which formats out of [{}] are allowed?", join(allowed)))
            .default(join(allowed))
            .interact_text(),
    )?
    else {
        return Ok(None);
    };
    Ok(Some(parse_formats(&answer, allowed)))
}

pub fn confirm(
    theme: &ColorfulTheme,
    prompt: &str,
    default: bool,
) -> Result<Option<bool>, PromptError> {
    Ok(Confirm::with_theme(theme)
        .with_prompt(prompt)
        .default(default)
        .interact_opt()?)
}

/// Ask for a worker count between 1 and `cores`.
pub fn ask_workers(theme: &ColorfulTheme, cores: usize) -> Result<Option<usize>, PromptError> {
    handle_interrupt(
        Input::<usize>::with_theme(theme)
            .with_prompt(format!("How many processes do you want us to use? [1-{cores}]"))
            .default(cores)
            .validate_with(move |n: &usize| -> Result<(), String> {
                if (1..=cores).contains(n) {
                    Ok(())
                } else {
                    Err(format!("pick a number from 1 to {cores}"))
                }
            })
            .interact_text(),
    )
}
