use clap::ValueEnum;
use serde::Deserialize;
use std::time::Duration;

/// Where RtConfig lives on a stock IRRToolSet install.
pub const DEFAULT_COMMAND: &str = "/usr/local/bin/RtConfig";

/// Represents the final settings after merging the settings file and CLI args.
///
/// Every value field is optional on its own; `None` means "do not pass the flag".
/// Toggles are plain booleans where absent and `false` both mean the same thing.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Settings {
    pub command: Option<String>,
    pub include_files: Vec<String>,
    pub source_list: Option<String>,
    pub output_format: Option<String>,
    pub whois_host: Option<String>,
    pub whois_port: Option<u16>,
    pub whois_protocol: Option<String>,

    pub report_errors: bool,
    pub ignore_errors: bool,
    pub no_match_ip_inbound: bool,
    pub disable_access_list_cache: bool,
    pub suppress_martians: bool,
    pub no_compress_acls: bool,
    pub use_prefix_lists: bool,
    pub eliminate_dup_map_parts: bool,
    pub skip_route_maps: bool,
    pub force_tilde: bool,
    pub empty_lists: bool,

    pub debug: bool,
    pub timeout_ms: Option<u64>,
}

impl Settings {
    /// The executable to launch, falling back to [`DEFAULT_COMMAND`] when unset or empty.
    pub fn command(&self) -> &str {
        match self.command.as_deref() {
            Some(command) if !command.is_empty() => command,
            _ => DEFAULT_COMMAND,
        }
    }

    pub fn toggle(&self, toggle: Toggle) -> bool {
        match toggle {
            Toggle::ReportErrors => self.report_errors,
            Toggle::IgnoreErrors => self.ignore_errors,
            Toggle::NoMatchIpInbound => self.no_match_ip_inbound,
            Toggle::DisableAccessListCache => self.disable_access_list_cache,
            Toggle::SuppressMartians => self.suppress_martians,
            Toggle::NoCompressAcls => self.no_compress_acls,
            Toggle::UsePrefixLists => self.use_prefix_lists,
            Toggle::EliminateDupMapParts => self.eliminate_dup_map_parts,
            Toggle::SkipRouteMaps => self.skip_route_maps,
            Toggle::ForceTilde => self.force_tilde,
            Toggle::EmptyLists => self.empty_lists,
        }
    }

    pub fn set_toggle(&mut self, toggle: Toggle, enabled: bool) {
        let slot = match toggle {
            Toggle::ReportErrors => &mut self.report_errors,
            Toggle::IgnoreErrors => &mut self.ignore_errors,
            Toggle::NoMatchIpInbound => &mut self.no_match_ip_inbound,
            Toggle::DisableAccessListCache => &mut self.disable_access_list_cache,
            Toggle::SuppressMartians => &mut self.suppress_martians,
            Toggle::NoCompressAcls => &mut self.no_compress_acls,
            Toggle::UsePrefixLists => &mut self.use_prefix_lists,
            Toggle::EliminateDupMapParts => &mut self.eliminate_dup_map_parts,
            Toggle::SkipRouteMaps => &mut self.skip_route_maps,
            Toggle::ForceTilde => &mut self.force_tilde,
            Toggle::EmptyLists => &mut self.empty_lists,
        };
        *slot = enabled;
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// A boolean option that maps to a single bare RtConfig flag.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Toggle {
    ReportErrors,
    IgnoreErrors,
    NoMatchIpInbound,
    DisableAccessListCache,
    SuppressMartians,
    NoCompressAcls,
    UsePrefixLists,
    EliminateDupMapParts,
    SkipRouteMaps,
    ForceTilde,
    EmptyLists,
}

impl Toggle {
    /// All toggles, in the order their flags are emitted.
    pub const ALL: [Toggle; 11] = [
        Toggle::ReportErrors,
        Toggle::IgnoreErrors,
        Toggle::NoMatchIpInbound,
        Toggle::DisableAccessListCache,
        Toggle::SuppressMartians,
        Toggle::NoCompressAcls,
        Toggle::UsePrefixLists,
        Toggle::EliminateDupMapParts,
        Toggle::SkipRouteMaps,
        Toggle::ForceTilde,
        Toggle::EmptyLists,
    ];

    // Spellings follow RtConfig's own option table, typos included.
    pub fn flag(self) -> &'static str {
        match self {
            Toggle::ReportErrors => "-report_errors",
            Toggle::IgnoreErrors => "-ignore_errors",
            Toggle::NoMatchIpInbound => "-no_match_ip_inbound",
            Toggle::DisableAccessListCache => "-disable_access_list_cache",
            Toggle::SuppressMartians => "-supress_martian",
            Toggle::NoCompressAcls => "-cisco_no_compress_acls",
            Toggle::UsePrefixLists => "-cisco_use_prefix_lists",
            Toggle::EliminateDupMapParts => "-cisco_eliminate_dup_map_parts",
            Toggle::SkipRouteMaps => "-cisco_skip_route_maps",
            Toggle::ForceTilde => "-cisco_force_tilda",
            Toggle::EmptyLists => "-cisco_empty_lists",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_falls_back_to_default() {
        let mut settings = Settings::default();
        assert_eq!(settings.command(), DEFAULT_COMMAND);

        settings.command = Some(String::new());
        assert_eq!(settings.command(), DEFAULT_COMMAND);

        settings.command = Some("/opt/irrtoolset/bin/RtConfig".into());
        assert_eq!(settings.command(), "/opt/irrtoolset/bin/RtConfig");
    }

    #[test]
    fn set_toggle_touches_only_that_toggle() {
        for toggle in Toggle::ALL {
            let mut settings = Settings::default();
            settings.set_toggle(toggle, true);
            for other in Toggle::ALL {
                assert_eq!(settings.toggle(other), other == toggle, "{:?} vs {:?}", toggle, other);
            }
        }
    }

    #[test]
    fn toggle_flags_are_distinct() {
        let mut flags: Vec<_> = Toggle::ALL.iter().map(|t| t.flag()).collect();
        flags.sort_unstable();
        flags.dedup();
        assert_eq!(flags.len(), Toggle::ALL.len());
    }
}
