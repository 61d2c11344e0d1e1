//! Submit request inspection.
//!
//! Parses the human-readable output of `osc request list` into typed values
//! and fetches the open submit requests for a package.

use crate::core::{ObsError, ObsResult};
use crate::process::{run_cmd, RunOptions};
use crate::update::UpdaterConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The state of a submit request in the Open Build Service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    Accepted,
    Review,
    Declined,
    New,
    Revoked,
    Superseded,
}

impl RequestState {
    /// The lowercase word osc uses for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Accepted => "accepted",
            RequestState::Review => "review",
            RequestState::Declined => "declined",
            RequestState::New => "new",
            RequestState::Revoked => "revoked",
            RequestState::Superseded => "superseded",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestState {
    type Err = ObsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accepted" => Ok(RequestState::Accepted),
            "review" => Ok(RequestState::Review),
            "declined" => Ok(RequestState::Declined),
            "new" => Ok(RequestState::New),
            "revoked" => Ok(RequestState::Revoked),
            "superseded" => Ok(RequestState::Superseded),
            other => Err(ObsError::RequestParse(format!(
                "unknown request state '{}'",
                other
            ))),
        }
    }
}

/// States queried by default: everything still requiring action.
pub const DEFAULT_REQUEST_STATES: &[RequestState] = &[
    RequestState::New,
    RequestState::Review,
    RequestState::Declined,
];

/// A submission of a package from a source project to a destination project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Unique identifier of this request
    pub id: u64,

    /// The text description set by the submission author
    pub description: String,

    /// The package's source project
    pub source_project: String,

    /// The source package name
    pub source_package: String,

    /// The revision of the source package which was submitted
    pub source_revision: String,

    /// This submission's destination project
    pub destination_project: String,

    /// State of this request
    pub state: RequestState,
}

fn malformed(context: &str, stdout: &str) -> ObsError {
    ObsError::RequestParse(format!("{}: {}", context, stdout))
}

impl SubmitRequest {
    /// Parse a single request stanza as printed by `osc request list`.
    pub fn parse(stdout: &str) -> ObsResult<Self> {
        let lines: Vec<&str> = stdout.trim().lines().collect();
        let header = lines
            .first()
            .ok_or_else(|| malformed("empty request stanza", stdout))?;

        let mut header_fields = header.split_whitespace();
        let id = header_fields
            .next()
            .ok_or_else(|| malformed("missing request id", stdout))?
            .parse::<u64>()
            .map_err(|err| malformed(&format!("invalid request id ({})", err), stdout))?;

        let state_field = header_fields
            .next()
            .ok_or_else(|| malformed("missing request state", stdout))?;
        let state_word = state_field
            .split(':')
            .nth(1)
            .ok_or_else(|| malformed("missing request state", stdout))?;
        // partially approved reviews print as "review(approved)"; the request
        // is still in review
        let partial_review = Regex::new(r"^(?P<state>\S+)\(\S+\)$")
            .map_err(|err| ObsError::RequestParse(format!("invalid regex: {}", err)))?;
        let state_word = match partial_review.captures(state_word).and_then(|c| c.name("state")) {
            Some(m) => m.as_str(),
            None => state_word,
        };
        let state: RequestState = state_word.parse()?;

        // newer osc versions insert a "Created by: $user" line before the
        // submit line
        let submit_idx =
            if lines.get(1).and_then(|l| l.split_whitespace().next()) == Some("Created") {
                2
            } else {
                1
            };
        let submit_line = lines
            .get(submit_idx)
            .ok_or_else(|| malformed("missing submit line", stdout))?;
        let submit_fields: Vec<&str> = submit_line.split_whitespace().collect();
        let (full_source, destination_project) = match submit_fields.as_slice() {
            [keyword, full_source, arrow, destination]
                if *keyword == "submit:" && *arrow == "->" =>
            {
                (*full_source, *destination)
            }
            _ => return Err(malformed("malformed submit line", stdout)),
        };

        let indent_re = Regex::new(r"^\s+")
            .map_err(|err| ObsError::RequestParse(format!("invalid regex: {}", err)))?;
        let indent = indent_re
            .find(submit_line)
            .map(|m| m.as_str().len())
            .ok_or_else(|| malformed("submit line is not indented", stdout))?;
        // a continued description line is indented past the "Descr: " prefix
        let continuation_indent = indent + "Descr: ".len();

        let mut description: Option<String> = None;
        let mut description_started = false;
        for line in &lines[submit_idx + 1..] {
            if description_started {
                let is_continued = line.len() >= continuation_indent
                    && line.as_bytes()[..continuation_indent]
                        .iter()
                        .all(|b| *b == b' ');
                if is_continued {
                    if let Some(description) = description.as_mut() {
                        description.push(' ');
                        description.push_str(line.trim_start());
                    }
                    continue;
                }
                break;
            }

            let mut fields = line.split_whitespace();
            if fields.next() != Some("Descr:") {
                continue;
            }
            description_started = true;
            description = Some(fields.collect::<Vec<_>>().join(" "));
        }

        let description = description
            .filter(|d| !d.is_empty())
            .ok_or_else(|| malformed("request contains no description", stdout))?;

        let (source, source_revision) = full_source
            .split_once('@')
            .ok_or_else(|| malformed("source is missing a revision", stdout))?;
        let (source_project, source_package) = source
            .split_once('/')
            .ok_or_else(|| malformed("malformed source package reference", stdout))?;

        Ok(Self {
            id,
            description,
            source_project: source_project.to_string(),
            source_package: source_package.to_string(),
            source_revision: source_revision.to_string(),
            destination_project: destination_project.to_string(),
            state,
        })
    }
}

/// Parse the full output of `osc request list` into its individual requests.
pub fn parse_request_list(stdout: &str) -> ObsResult<Vec<SubmitRequest>> {
    if stdout.contains("No results for package") {
        return Ok(Vec::new());
    }

    stdout
        .split("\n\n")
        .filter(|stanza| !stanza.trim().is_empty())
        .map(SubmitRequest::parse)
        .collect()
}

/// Fetch the submit requests for `project`/`package` with the given states
/// (defaults to [`DEFAULT_REQUEST_STATES`]).
pub async fn fetch_submitrequests(
    project: &str,
    package: &str,
    config: &UpdaterConfig,
    states: Option<&[RequestState]>,
) -> ObsResult<Vec<SubmitRequest>> {
    let states = states.unwrap_or(DEFAULT_REQUEST_STATES);
    let states_arg = states
        .iter()
        .map(|state| state.as_str())
        .collect::<Vec<_>>()
        .join(",");
    let target = format!("{}/{}", project, package);

    let options = RunOptions {
        timeout: config.command_timeout,
        ..RunOptions::default()
    };
    let output = run_cmd(
        &config.osc_binary,
        &[
            "-A",
            &config.api_url,
            "request",
            "list",
            "-s",
            &states_arg,
            "-t",
            "submit",
            &target,
        ],
        &options,
    )
    .await?;

    parse_request_list(output.stdout.trim())
}
