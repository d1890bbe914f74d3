//! Message Types for Thread Communication
//!
//! Faults flow from the pipeline threads -> process supervisor

use serde::{Deserialize, Serialize};

/// Conditions the pipeline cannot recover from on its own
///
/// The supervisor owns the policy; the pipeline only reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Fault {
    /// No full frame arrived from the microphone within the watchdog window
    AudioStalled { waited_ms: u64 },
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fault::AudioStalled { waited_ms } => {
                write!(f, "audio input stalled for {waited_ms} ms")
            }
        }
    }
}
