use crate::app::models::{Settings, Toggle};
use std::borrow::Cow;
use std::fmt;

const FILE_FLAG: &str = "-f";
const SOURCE_LIST_FLAG: &str = "-s";
const FORMAT_FLAG: &str = "-config";
const WHOIS_HOST_FLAG: &str = "-h";
const WHOIS_PORT_FLAG: &str = "-p";
const WHOIS_PROTOCOL_FLAG: &str = "-protocol";

/// The executable and argument vector for one RtConfig run.
///
/// Arguments are handed to the OS one element each; nothing here is ever
/// joined and re-parsed by a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    /// Derives the invocation from settings. Pure and deterministic: the same
    /// settings always give the same argument order.
    pub fn build(settings: &Settings) -> Self {
        let mut args = Vec::new();

        for file in &settings.include_files {
            args.push(FILE_FLAG.to_string());
            args.push(file.clone());
        }

        push_value(&mut args, SOURCE_LIST_FLAG, settings.source_list.as_deref());
        push_value(&mut args, FORMAT_FLAG, settings.output_format.as_deref());
        push_value(&mut args, WHOIS_HOST_FLAG, settings.whois_host.as_deref());
        if let Some(port) = settings.whois_port {
            args.push(WHOIS_PORT_FLAG.to_string());
            args.push(port.to_string());
        }
        push_value(&mut args, WHOIS_PROTOCOL_FLAG, settings.whois_protocol.as_deref());

        args.extend(
            Toggle::ALL
                .into_iter()
                .filter(|toggle| settings.toggle(*toggle))
                .map(|toggle| toggle.flag().to_string()),
        );

        Self {
            program: settings.command().to_string(),
            args,
        }
    }

    /// Program followed by arguments, as the OS receives them.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }

    /// A copy-pasteable rendering of the invocation for diagnostics.
    ///
    /// Each element is quoted for a POSIX shell when needed, so splitting the
    /// string back yields exactly [`Invocation::argv`].
    pub fn command_line(&self) -> String {
        self.argv()
            .into_iter()
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

fn push_value(args: &mut Vec<String>, flag: &str, value: Option<&str>) {
    if let Some(value) = value {
        args.push(flag.to_string());
        args.push(value.to_string());
    }
}

fn shell_quote(arg: &str) -> Cow<'_, str> {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./,:=+@%".contains(c));
    if plain {
        Cow::Borrowed(arg)
    } else {
        Cow::Owned(format!("'{}'", arg.replace('\'', r"'\''")))
    }
}
