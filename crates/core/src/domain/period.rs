use serde::{Deserialize, Serialize};

/// Calendar granularity of a reporting period. The calendar arithmetic
/// itself lives outside this crate; a period is identified by its ISO-style
/// code and compared structurally.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub period_type: PeriodType,
    /// ISO period code, e.g. `2026-06` for a monthly period.
    pub code: String,
}
