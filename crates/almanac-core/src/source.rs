use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Upstream APIs the pipeline knows how to ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Japan Meteorological Agency forecast feed.
    Jma,
    /// e-Stat government statistics API.
    Estat,
}

impl ProviderId {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jma => "jma",
            Self::Estat => "estat",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
