use crate::app::runner::{ExecutionResult, Outcome};
use anyhow::Result;
use serde::Serialize;

/// What the host shows for one rendered page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub page: String,
    pub argv: Vec<String>,
    pub status: &'static str,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub command_line: String,
    pub input: String,
}

impl Report {
    pub fn new(page: &str, result: &ExecutionResult, input: &[u8], debug: bool) -> Self {
        let (status, exit_code) = match &result.outcome {
            Outcome::Completed(code) => ("completed", Some(*code)),
            Outcome::Signaled(_) => ("signaled", None),
            Outcome::LaunchFailed(_) => ("launchFailed", None),
            Outcome::TimedOut(_) => ("timedOut", None),
        };

        Self {
            page: page.to_string(),
            argv: result.invocation.argv().into_iter().map(String::from).collect(),
            status,
            exit_code,
            stdout: String::from_utf8_lossy(&result.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            error: result.error().map(|e| e.to_string()),
            debug: debug.then(|| DebugInfo {
                command_line: result.invocation.command_line(),
                input: String::from_utf8_lossy(input).into_owned(),
            }),
        }
    }
}

pub struct OutputGenerator;

impl OutputGenerator {
    /// Text report. Tool output, stderr and the debug input are copied byte for byte.
    pub fn generate_text(report: &Report, result: &ExecutionResult, input: &[u8]) -> Vec<u8> {
        let mut out = format!(
            "RtConfig autogenerated configuration for {}\n\n",
            report.page
        )
        .into_bytes();

        match &result.outcome {
            Outcome::Completed(0) => {
                out.extend_from_slice(&result.stdout);
                if !result.stderr.is_empty() {
                    push_section(&mut out, "RtConfig warnings:", &result.stderr);
                }
            }
            Outcome::Completed(_) | Outcome::Signaled(_) => {
                out.extend_from_slice(&result.stdout);
                out.extend_from_slice(
                    format!(
                        "\nRtConfig returned an error ({}). Check the options passed to it; the command line was:\n    {}\n",
                        result.outcome,
                        result.invocation.command_line()
                    )
                    .as_bytes(),
                );
                push_section(&mut out, "RtConfig said:", &result.stderr);
            }
            Outcome::LaunchFailed(reason) => {
                out.extend_from_slice(
                    format!(
                        "Failed to launch RtConfig, check whether the path\n    {}\nis valid ({}).\n",
                        result.invocation.program, reason
                    )
                    .as_bytes(),
                );
            }
            Outcome::TimedOut(after) => {
                out.extend_from_slice(&result.stdout);
                out.extend_from_slice(
                    format!(
                        "\nRtConfig did not finish within {}ms and was terminated. The command line was:\n    {}\n",
                        after.as_millis(),
                        result.invocation.command_line()
                    )
                    .as_bytes(),
                );
            }
        }

        if report.debug.is_some() {
            out.extend_from_slice(b"\nDebug\n");
            out.extend_from_slice(
                format!("Command line: {}\n", result.invocation.command_line()).as_bytes(),
            );
            push_section(&mut out, "Input:", input);
            push_section(&mut out, "Stderr:", &result.stderr);
        }

        out
    }

    /// JSON report. JSON strings must be UTF-8, so invalid sequences in the
    /// captured streams show up as U+FFFD here; the text report keeps them.
    pub fn generate_json(report: &Report) -> Result<String> {
        Ok(serde_json::to_string_pretty(report)?)
    }
}

fn push_section(out: &mut Vec<u8>, title: &str, body: &[u8]) {
    if !out.ends_with(b"\n") {
        out.push(b'\n');
    }
    out.extend_from_slice(title.as_bytes());
    out.push(b'\n');
    out.extend_from_slice(body);
    if !body.ends_with(b"\n") {
        out.push(b'\n');
    }
}
