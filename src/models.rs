use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const EMPLOYMENT_FULL_TIME: &str = "full-time";
pub const EMPLOYMENT_PART_TIME: &str = "part-time";

/// Logo references shorter than this are treated as missing.
const MIN_LOGO_URL_LEN: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub name: Option<String>,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
    pub branch: Option<String>, // category, e.g. "IT" or "Verwaltung"
}

/// Parse-style date wrapper: `{"__type": "Date", "iso": "2024-01-31T08:00:00.000Z"}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateEnvelope {
    #[serde(rename = "__type")]
    pub kind: Option<String>,
    pub iso: Option<String>,
}

impl DateEnvelope {
    pub fn new(iso: impl Into<String>) -> Self {
        Self {
            kind: Some("Date".to_string()),
            iso: Some(iso.into()),
        }
    }

    pub fn parse(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(self.iso.as_deref()?)
    }
}

impl fmt::Display for DateEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.iso.as_deref().unwrap_or(""))
    }
}

/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM:SS[.fff]` (assumed UTC) and plain dates.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Other(String),
    Unspecified,
}

impl EmploymentType {
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            None => EmploymentType::Unspecified,
            Some(EMPLOYMENT_FULL_TIME) => EmploymentType::FullTime,
            Some(EMPLOYMENT_PART_TIME) => EmploymentType::PartTime,
            Some(other) => EmploymentType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EmploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmploymentType::FullTime => f.write_str("Full-time"),
            EmploymentType::PartTime => f.write_str("Part-time"),
            EmploymentType::Other(raw) => f.write_str(raw),
            EmploymentType::Unspecified => Ok(()),
        }
    }
}

/// Coarse label for how long ago a posting went up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recency {
    Today,
    Yesterday,
    DaysAgo(i64),
    OverAMonth,
}

impl Recency {
    pub fn from_days(days: i64) -> Self {
        match days {
            i64::MIN..=0 => Recency::Today,
            1 => Recency::Yesterday,
            2..=30 => Recency::DaysAgo(days),
            _ => Recency::OverAMonth,
        }
    }
}

impl fmt::Display for Recency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recency::Today => f.write_str("today"),
            Recency::Yesterday => f.write_str("yesterday"),
            Recency::DaysAgo(days) => write!(f, "{} days ago", days),
            Recency::OverAMonth => f.write_str("over a month ago"),
        }
    }
}

/// What a host web view needs to open a posting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailTarget {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "objectId")]
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "hiringOrganization")]
    pub company: Option<Company>,
    #[serde(rename = "datePosted")]
    pub date_posted: Option<DateEnvelope>,
    #[serde(rename = "sourceUrl")]
    pub source_url: Option<String>,
    #[serde(rename = "sourceId")]
    pub source_id: Option<String>,
    pub url: Option<String>, // external apply page
    #[serde(rename = "employmentType")]
    pub employment_type: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<String>,
}

impl Job {
    pub fn company_name(&self) -> &str {
        self.company
            .as_ref()
            .and_then(|c| c.name.as_deref())
            .unwrap_or("Unknown")
    }

    pub fn logo_url(&self) -> Option<&str> {
        self.company
            .as_ref()
            .and_then(|c| c.image_url.as_deref())
            .filter(|url| url.len() >= MIN_LOGO_URL_LEN)
    }

    /// Lowercased haystack for local matching.
    pub fn search_contents(&self) -> String {
        let date = self
            .date_posted
            .as_ref()
            .map(|d| d.to_string())
            .unwrap_or_default();
        let branch = self
            .company
            .as_ref()
            .and_then(|c| c.branch.as_deref())
            .unwrap_or("");
        format!(
            "{} {} {} {} {} {}",
            self.title.as_deref().unwrap_or(""),
            self.company_name(),
            date,
            branch,
            self.source_url.as_deref().unwrap_or(""),
            self.id.as_deref().unwrap_or(""),
        )
        .to_lowercase()
    }

    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        self.date_posted.as_ref()?.parse()
    }

    /// Whole days between posting and `now`; 0 if the date is missing or unparseable.
    pub fn days_since_posted_at(&self, now: DateTime<Utc>) -> i64 {
        self.posted_at()
            .map(|posted| (now - posted).num_days().max(0))
            .unwrap_or(0)
    }

    pub fn days_since_posted(&self) -> i64 {
        self.days_since_posted_at(Utc::now())
    }

    pub fn recency(&self) -> Recency {
        Recency::from_days(self.days_since_posted())
    }

    pub fn employment_type(&self) -> EmploymentType {
        EmploymentType::from_raw(self.employment_type.as_deref())
    }

    pub fn detail_target(&self) -> Option<DetailTarget> {
        let url = self.url.clone()?;
        Some(DetailTarget {
            url,
            title: self.title.clone().unwrap_or_default(),
        })
    }
}
