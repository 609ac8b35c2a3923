//! Finding and session records

use crate::error::FindexError;
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{Row, ToSql};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Columns selected whenever a full finding is read back
pub(crate) const FINDING_COLUMNS: &str =
    "id, session_id, type, content, context, severity, tags, session_timestamp";

/// Classification of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingType {
    Praise,
    Blocker,
    Suggestion,
    Nitpick,
}

impl FindingType {
    pub const ALL: [FindingType; 4] = [
        FindingType::Praise,
        FindingType::Blocker,
        FindingType::Suggestion,
        FindingType::Nitpick,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FindingType::Praise => "praise",
            FindingType::Blocker => "blocker",
            FindingType::Suggestion => "suggestion",
            FindingType::Nitpick => "nitpick",
        }
    }
}

impl fmt::Display for FindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FindingType {
    type Err = FindexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "praise" => Ok(FindingType::Praise),
            "blocker" => Ok(FindingType::Blocker),
            "suggestion" => Ok(FindingType::Suggestion),
            "nitpick" => Ok(FindingType::Nitpick),
            other => Err(FindexError::InvalidFinding(format!(
                "Unknown finding type '{}'",
                other
            ))),
        }
    }
}

/// How much a finding matters
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = FindexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(FindexError::InvalidFinding(format!(
                "Unknown severity '{}'",
                other
            ))),
        }
    }
}

macro_rules! text_enum_sql {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: FindexError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

text_enum_sql!(FindingType);
text_enum_sql!(Severity);

/// A stored finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: i64,
    pub session_id: String,
    #[serde(rename = "type")]
    pub finding_type: FindingType,
    pub content: String,
    pub context: Option<String>,
    pub severity: Severity,
    pub tags: Vec<String>,
    pub session_timestamp: Option<DateTime<Utc>>,
}

impl Finding {
    /// Map a row selected with [`FINDING_COLUMNS`]
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let tags: Option<String> = row.get(6)?;
        let tags = match tags {
            Some(json) => serde_json::from_str(&json).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
            })?,
            None => Vec::new(),
        };

        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            finding_type: row.get(2)?,
            content: row.get(3)?,
            context: row.get(4)?,
            severity: row.get(5)?,
            tags,
            session_timestamp: row.get(7)?,
        })
    }
}

/// A finding that has not been inserted yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFinding {
    pub session_id: String,
    #[serde(rename = "type")]
    pub finding_type: FindingType,
    pub content: String,
    #[serde(default)]
    pub context: Option<String>,
    pub severity: Severity,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub session_timestamp: Option<DateTime<Utc>>,
}

impl NewFinding {
    pub fn new(
        session_id: impl Into<String>,
        finding_type: FindingType,
        content: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            finding_type,
            content: content.into(),
            context: None,
            severity,
            tags: Vec::new(),
            session_timestamp: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_session_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.session_timestamp = Some(timestamp);
        self
    }

    /// Tags as stored: a JSON array, or NULL when there are none
    pub(crate) fn tags_json(&self) -> Result<Option<String>, FindexError> {
        if self.tags.is_empty() {
            return Ok(None);
        }

        serde_json::to_string(&self.tags)
            .map(Some)
            .map_err(|e| FindexError::Json {
                source: e,
                context: "Failed to serialize finding tags".to_string(),
            })
    }
}

/// Session a finding was extracted from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub project: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub analyzed_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            project: None,
            started_at: None,
            analyzed_at: Utc::now(),
        }
    }
}
