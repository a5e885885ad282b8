use crate::app::cli::Cli;
use crate::app::error::RenderError;
use crate::app::models::Settings;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

fn default_settings_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("rtconfig").join("config.toml"))
}

/// Reads the settings file. An explicit path must exist; the default one may not.
fn load_settings_file(explicit: Option<&Path>) -> Result<Settings> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = default_settings_path()?;
            if !path.exists() {
                log::debug!("No settings at {:?}, using defaults", path);
                return Ok(Settings::default());
            }
            path
        }
    };

    let content = fs::read_to_string(&path)
        .context(format!("Failed to read settings at {:?}", path))?;
    let settings =
        parse_settings(&content).context(format!("Failed to load settings from {:?}", path))?;
    log::debug!("Loaded settings from {:?}", path);
    Ok(settings)
}

pub fn parse_settings(content: &str) -> Result<Settings, RenderError> {
    toml::from_str(content).map_err(|e| RenderError::Configuration(e.to_string()))
}

/// Rejects values RtConfig would misread, before anything is spawned.
pub fn validate(settings: &Settings) -> Result<(), RenderError> {
    let named = [
        ("sourceList", &settings.source_list),
        ("outputFormat", &settings.output_format),
        ("whoisHost", &settings.whois_host),
        ("whoisProtocol", &settings.whois_protocol),
    ];
    for (name, value) in named {
        if matches!(value.as_deref(), Some("")) {
            return Err(RenderError::Configuration(format!(
                "{} is set but empty; RtConfig would receive an empty argument (remove the key to omit the flag)",
                name
            )));
        }
    }

    if let Some(index) = settings.include_files.iter().position(String::is_empty) {
        return Err(RenderError::Configuration(format!(
            "includeFiles[{}] is empty; RtConfig would receive an empty -f argument (drop the entry instead)",
            index
        )));
    }

    if settings.timeout_ms == Some(0) {
        return Err(RenderError::Configuration(
            "timeoutMs must be greater than zero".into(),
        ));
    }

    Ok(())
}

/// Layers CLI overrides on top of file settings. CLI values win; include
/// files are appended in the order given.
pub fn merge(mut settings: Settings, cli: &Cli) -> Settings {
    fn take(slot: &mut Option<String>, value: &Option<String>) {
        if value.is_some() {
            slot.clone_from(value);
        }
    }

    take(&mut settings.command, &cli.command);
    settings.include_files.extend(cli.include_files.iter().cloned());
    take(&mut settings.source_list, &cli.source_list);
    take(&mut settings.output_format, &cli.output_format);
    take(&mut settings.whois_host, &cli.whois_host);
    if cli.whois_port.is_some() {
        settings.whois_port = cli.whois_port;
    }
    take(&mut settings.whois_protocol, &cli.whois_protocol);

    for toggle in &cli.enable {
        settings.set_toggle(*toggle, true);
    }
    settings.debug |= cli.debug;
    if cli.timeout_ms.is_some() {
        settings.timeout_ms = cli.timeout_ms;
    }

    settings
}

pub fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let settings = merge(load_settings_file(cli.config.as_deref())?, cli);
    validate(&settings)?;
    Ok(settings)
}
