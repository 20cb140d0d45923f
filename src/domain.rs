use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::MycoError;

pub type Timestamp = DateTime<FixedOffset>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Assembly,
    Annotation,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Assembly => write!(f, "assembly"),
            Category::Annotation => write!(f, "annotation"),
        }
    }
}

impl FromStr for Category {
    type Err = MycoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "assembly" => Ok(Category::Assembly),
            "annotation" | "gff" => Ok(Category::Annotation),
            _ => Err(MycoError::InvalidCategory(value.to_string())),
        }
    }
}

/// MycoCosm short name of a sequencing project, e.g. `Trire2`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortalId(String);

impl PortalId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PortalId {
    type Err = MycoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        let starts_ok = normalized
            .chars()
            .next()
            .map(|ch| ch.is_ascii_alphanumeric())
            .unwrap_or(false);
        let is_valid = starts_ok
            && normalized
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.'));
        if !is_valid {
            return Err(MycoError::InvalidPortalId(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

/// Ordered taxonomic rank names, broadest first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Lineage(Vec<String>);

impl Lineage {
    pub fn new(ranks: Vec<String>) -> Result<Self, MycoError> {
        if ranks.is_empty() {
            return Err(MycoError::MalformedPortal("empty lineage".to_string()));
        }
        if ranks.iter().any(|rank| rank.trim().is_empty()) {
            return Err(MycoError::MalformedPortal(format!(
                "lineage has an empty rank: {}",
                ranks.join(",")
            )));
        }
        Ok(Self(ranks.into_iter().map(|rank| rank.trim().to_string()).collect()))
    }

    pub fn ranks(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for Lineage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

impl FromStr for Lineage {
    type Err = MycoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().is_empty() {
            return Err(MycoError::MalformedPortal("empty lineage".to_string()));
        }
        Self::new(value.split(',').map(str::to_string).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Portal {
    pub id: PortalId,
    pub accession: String,
    pub taxid: String,
    pub name: String,
    pub lineage: Lineage,
    pub restricted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateFile {
    pub filename: String,
    pub category: Category,
    pub timestamp: Timestamp,
    pub size: u64,
    pub url: String,
    pub masked: bool,
}

/// Stand-in for a listing date that cannot be read; sorts before every real one.
pub fn unknown_timestamp() -> Timestamp {
    DateTime::<Utc>::MIN_UTC.fixed_offset()
}

/// Parses the timestamps found in JGI file listings.
///
/// Accepts the portal's own `Sun Oct 12 11:02:03 PDT 2014` form (US zone
/// abbreviations only), RFC 3339, and bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(value: &str) -> Result<Timestamp, MycoError> {
    let trimmed = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        let utc = FixedOffset::east_opt(0)
            .ok_or_else(|| MycoError::InvalidTimestamp(value.to_string()))?;
        return date
            .and_hms_opt(0, 0, 0)
            .and_then(|naive| naive.and_local_timezone(utc).single())
            .ok_or_else(|| MycoError::InvalidTimestamp(value.to_string()));
    }
    parse_jgi_timestamp(trimmed).ok_or_else(|| MycoError::InvalidTimestamp(value.to_string()))
}

fn parse_jgi_timestamp(value: &str) -> Option<Timestamp> {
    let parts = value.split_whitespace().collect::<Vec<_>>();
    // weekday is ignored; chrono would reject a listing whose weekday disagrees with the date
    let [_weekday, month, day, hms, zone, year] = parts.as_slice() else {
        return None;
    };
    let offset = us_zone_offset(zone)?;
    let normalized = format!("{month} {day} {hms} {offset} {year}");
    DateTime::parse_from_str(&normalized, "%b %d %H:%M:%S %z %Y").ok()
}

fn us_zone_offset(zone: &str) -> Option<&'static str> {
    let offset = match zone {
        "EST" => "-0500",
        "CST" => "-0600",
        "MST" => "-0700",
        "PST" => "-0800",
        "EDT" => "-0400",
        "CDT" => "-0500",
        "MDT" => "-0600",
        "PDT" => "-0700",
        "UTC" | "GMT" => "+0000",
        _ => return None,
    };
    Some(offset)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Datelike, Timelike};

    use super::*;

    #[test]
    fn parse_portal_id_valid() {
        let id: PortalId = " Rhoto_IFO0880_2 ".parse().unwrap();
        assert_eq!(id.as_str(), "Rhoto_IFO0880_2");
    }

    #[test]
    fn parse_portal_id_invalid() {
        let err = "Tri re2".parse::<PortalId>().unwrap_err();
        assert_matches!(err, MycoError::InvalidPortalId(_));
        let err = "../etc".parse::<PortalId>().unwrap_err();
        assert_matches!(err, MycoError::InvalidPortalId(_));
    }

    #[test]
    fn parse_lineage_rejects_empty_rank() {
        let err = "fungi,,ascomycota".parse::<Lineage>().unwrap_err();
        assert_matches!(err, MycoError::MalformedPortal(_));
        let lineage: Lineage = "fungi, dikarya".parse().unwrap();
        assert_eq!(lineage.to_string(), "fungi,dikarya");
    }

    #[test]
    fn parse_jgi_timestamp_with_zone() {
        let ts = parse_timestamp("Sun Oct 12 11:02:03 PDT 2014").unwrap();
        assert_eq!(ts.year(), 2014);
        assert_eq!(ts.month(), 10);
        assert_eq!(ts.hour(), 11);
        assert_eq!(ts.offset().local_minus_utc(), -7 * 3600);
    }

    #[test]
    fn parse_plain_date() {
        let ts = parse_timestamp("2019-01-01").unwrap();
        assert_eq!(ts.day(), 1);
        assert_matches!(
            parse_timestamp("Sun Oct 12 11:02:03 XYZ 2014"),
            Err(MycoError::InvalidTimestamp(_))
        );
    }

    #[test]
    fn category_round_trip() {
        assert_eq!("Annotation".parse::<Category>().unwrap(), Category::Annotation);
        assert_eq!(Category::Assembly.to_string(), "assembly");
    }
}
