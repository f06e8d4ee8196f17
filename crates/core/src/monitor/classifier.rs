//! Classification of scheduler banner lines.
//!
//! The English phrases a scheduler writes around a job's output are the only
//! structured signal available. Each backend that needs file monitoring
//! supplies a `LineClassifier`, so a new scheduler or locale only needs a new
//! classifier and never a change to the polling loop.

use crate::monitor::error::{MonitorError, MonitorResult};
use std::fmt::Debug;

/// What a single line of scheduler output means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineClass {
    /// The job finished with exit code 0.
    Completed,
    /// The job finished with the given non-zero exit code.
    ExitedWithCode(i32),
    /// Names the host the job ran on. Does not end monitoring.
    HostAnnounce(String),
    /// Everything after this line is the job's own stdout.
    StdoutBegin,
    /// Job stdout or banner noise, depending on capture mode.
    Plain,
}

pub trait LineClassifier: Send + Sync + Debug {
    /// Classify one line. Fails when a line carries a known marker whose
    /// payload cannot be parsed.
    fn classify(&self, line: &str) -> MonitorResult<LineClass>;
}

const SUCCESS_MARKER: &str = "Successfully completed";
const EXITED_MARKER: &str = "Exited";
const HOST_MARKER: &str = "Job was executed on host";
const OUTPUT_MARKER: &str = "The output (if any) follows:";

/// Classifier for the job report LSF writes to `-oo` files.
#[derive(Debug, Default, Clone, Copy)]
pub struct LsfBannerClassifier;

impl LineClassifier for LsfBannerClassifier {
    fn classify(&self, line: &str) -> MonitorResult<LineClass> {
        if line.starts_with(SUCCESS_MARKER) {
            Ok(LineClass::Completed)
        } else if line.starts_with(EXITED_MARKER) {
            // "Exited with exit code 3."
            match line.split(' ').nth(4) {
                None => Ok(LineClass::ExitedWithCode(1)),
                Some(token) => {
                    let token = token.strip_suffix('.').unwrap_or(token);
                    token
                        .parse::<i32>()
                        .map(LineClass::ExitedWithCode)
                        .map_err(|_| MonitorError::BannerParse(line.to_string()))
                }
            }
        } else if line.starts_with(HOST_MARKER) {
            let host = line
                .split_once('<')
                .and_then(|(_, rest)| rest.split_once('>'))
                .map(|(host, _)| host.to_string())
                .ok_or_else(|| MonitorError::BannerParse(line.to_string()))?;
            Ok(LineClass::HostAnnounce(host))
        } else if line.starts_with(OUTPUT_MARKER) {
            Ok(LineClass::StdoutBegin)
        } else {
            Ok(LineClass::Plain)
        }
    }
}
