use crate::core::image::Fingerprint;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    Ok,
    Failed,
    Error,
    AttachFailed,
}

impl Classification {
    pub const ALL: [Classification; 4] = [
        Classification::Ok,
        Classification::Failed,
        Classification::Error,
        Classification::AttachFailed,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Failed => "failed",
            Self::Error => "error",
            Self::AttachFailed => "attach-failed",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::Ok => "green",
            Self::Failed => "red",
            Self::Error => "yellow",
            Self::AttachFailed => "magenta",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// What a session concluded about one image, before it is tied to a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub classification: Classification,
    pub message: String,
}

impl Outcome {
    pub fn new(classification: Classification, message: impl Into<String>) -> Self {
        Self {
            classification,
            message: message.into(),
        }
    }
}

/// One reported row. Produced once per unique image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeRecord {
    pub display_name: String,
    pub report_name: String,
    pub fingerprint: Fingerprint,
    pub classification: Classification,
    pub message: String,
}

impl OutcomeRecord {
    pub fn new(
        display_name: impl Into<String>,
        report_name: impl Into<String>,
        fingerprint: Fingerprint,
        outcome: Outcome,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            report_name: report_name.into(),
            fingerprint,
            classification: outcome.classification,
            message: outcome.message,
        }
    }
}
