//! # Earthquake Query Model
//!
//! Typed representation of a USGS FDSN event query, its validation rules and
//! the defaults applied when the user leaves a parameter out.
//!
//! Three query shapes are valid:
//! - global: time window + magnitude floor
//! - regional: time window + circle OR bounding box
//! - event: `eventid` only

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// API hard cap on `limit`.
pub const MAX_LIMIT: u32 = 20_000;

/// Look-back window used when the configured one is unusable.
pub const DEFAULT_TIMESPAN_DAYS: i64 = 30;

/// Which FDSN endpoint the query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    #[default]
    Query,
    Count,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Query => "/query",
            Endpoint::Count => "/count",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderBy {
    Time,
    TimeAsc,
    Magnitude,
    MagnitudeAsc,
}

impl OrderBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderBy::Time => "time",
            OrderBy::TimeAsc => "time-asc",
            OrderBy::Magnitude => "magnitude",
            OrderBy::MagnitudeAsc => "magnitude-asc",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "time" => Some(OrderBy::Time),
            "time-asc" => Some(OrderBy::TimeAsc),
            "magnitude" => Some(OrderBy::Magnitude),
            "magnitude-asc" => Some(OrderBy::MagnitudeAsc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Automatic,
    Reviewed,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Automatic => "automatic",
            ReviewStatus::Reviewed => "reviewed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "automatic" => Some(ReviewStatus::Automatic),
            "reviewed" => Some(ReviewStatus::Reviewed),
            _ => None,
        }
    }
}

/// PAGER impact alert level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Green,
    Yellow,
    Orange,
    Red,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Green => "green",
            AlertLevel::Yellow => "yellow",
            AlertLevel::Orange => "orange",
            AlertLevel::Red => "red",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "green" => Some(AlertLevel::Green),
            "yellow" => Some(AlertLevel::Yellow),
            "orange" => Some(AlertLevel::Orange),
            "red" => Some(AlertLevel::Red),
            _ => None,
        }
    }
}

/// A USGS event query. Field names follow the FDSN parameter names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EarthquakeQuery {
    #[serde(default)]
    pub endpoint: Endpoint,

    pub eventid: Option<String>,

    pub starttime: Option<String>,
    pub endtime: Option<String>,
    pub updatedafter: Option<String>,

    // Circle: all three together
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub maxradiuskm: Option<f64>,

    // Bounding box: all four together
    pub minlatitude: Option<f64>,
    pub maxlatitude: Option<f64>,
    pub minlongitude: Option<f64>,
    pub maxlongitude: Option<f64>,

    pub minmagnitude: Option<f64>,
    pub maxmagnitude: Option<f64>,

    pub mindepth: Option<f64>,
    pub maxdepth: Option<f64>,

    pub eventtype: Option<String>,
    pub reviewstatus: Option<ReviewStatus>,
    pub alertlevel: Option<AlertLevel>,
    pub producttype: Option<String>,

    pub minfelt: Option<u32>,
    pub minsig: Option<u32>,

    pub orderby: Option<OrderBy>,
    pub limit: Option<u32>,
}

/// Outcome of [`EarthquakeQuery::validate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub problems: Vec<String>,
    pub provided: Vec<&'static str>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            return write!(f, "valid query");
        }
        writeln!(f, "Invalid query:")?;
        for problem in &self.problems {
            writeln!(f, "  - {}", problem)?;
        }
        write!(f, "Fields currently set: {:?}", self.provided)
    }
}

fn num(v: f64) -> String {
    format!("{}", v)
}

impl EarthquakeQuery {
    pub fn count() -> Self {
        Self {
            endpoint: Endpoint::Count,
            ..Default::default()
        }
    }

    fn circle_fields(&self) -> [(&'static str, Option<f64>); 3] {
        [
            ("latitude", self.latitude),
            ("longitude", self.longitude),
            ("maxradiuskm", self.maxradiuskm),
        ]
    }

    fn bbox_fields(&self) -> [(&'static str, Option<f64>); 4] {
        [
            ("minlatitude", self.minlatitude),
            ("maxlatitude", self.maxlatitude),
            ("minlongitude", self.minlongitude),
            ("maxlongitude", self.maxlongitude),
        ]
    }

    pub fn has_full_bbox(&self) -> bool {
        self.bbox_fields().iter().all(|(_, v)| v.is_some())
    }

    pub fn has_circle(&self) -> bool {
        self.circle_fields().iter().all(|(_, v)| v.is_some())
    }

    /// Whether the query carries any geographic constraint.
    pub fn is_regional(&self) -> bool {
        self.circle_fields().iter().any(|(_, v)| v.is_some())
            || self.bbox_fields().iter().any(|(_, v)| v.is_some())
    }

    /// Circle and bounding box are mutually exclusive. When both are present,
    /// keep the more complete group: a full bbox beats a circle, a circle beats
    /// a partial bbox.
    pub fn resolve_geometry_conflict(&mut self) {
        let has_circle = self.latitude.is_some() || self.longitude.is_some();
        let has_full_bbox = self.has_full_bbox();
        let has_any_bbox = self.bbox_fields().iter().any(|(_, v)| v.is_some());

        if has_full_bbox && has_circle {
            self.latitude = None;
            self.longitude = None;
            self.maxradiuskm = None;
        } else if has_circle && has_any_bbox && !has_full_bbox {
            self.minlatitude = None;
            self.maxlatitude = None;
            self.minlongitude = None;
            self.maxlongitude = None;
        }
    }

    /// Names of every filter that is set (endpoint and limit excluded).
    pub fn provided_fields(&self) -> Vec<&'static str> {
        self.to_params()
            .into_iter()
            .map(|(k, _)| k)
            .filter(|k| *k != "format" && *k != "limit")
            .collect()
    }

    /// Check the query for logical consistency before it is sent.
    pub fn validate(&self) -> ValidationReport {
        let mut problems = Vec::new();

        if let (Some(start), Some(end)) = (&self.starttime, &self.endtime) {
            if start > end {
                problems.push(format!(
                    "starttime ({}) must be before endtime ({}).",
                    start, end
                ));
            }
        }

        if let (Some(min), Some(max)) = (self.minmagnitude, self.maxmagnitude) {
            if min > max {
                problems.push(format!(
                    "minmagnitude ({}) must be <= maxmagnitude ({}).",
                    min, max
                ));
            }
        }

        if let (Some(min), Some(max)) = (self.mindepth, self.maxdepth) {
            if min > max {
                problems.push(format!("mindepth ({}) must be <= maxdepth ({}).", min, max));
            }
        }

        for (name, value) in [
            ("latitude", self.latitude),
            ("minlatitude", self.minlatitude),
            ("maxlatitude", self.maxlatitude),
        ] {
            if let Some(v) = value {
                if !(-90.0..=90.0).contains(&v) {
                    problems.push(format!("{} ({}) must be between -90 and 90.", name, v));
                }
            }
        }

        for (name, value) in [
            ("longitude", self.longitude),
            ("minlongitude", self.minlongitude),
            ("maxlongitude", self.maxlongitude),
        ] {
            if let Some(v) = value {
                if !(-360.0..=360.0).contains(&v) {
                    problems.push(format!("{} ({}) must be between -360 and 360.", name, v));
                }
            }
        }

        for (name, value) in [("mindepth", self.mindepth), ("maxdepth", self.maxdepth)] {
            if let Some(v) = value {
                if !(-100.0..=1000.0).contains(&v) {
                    problems.push(format!("{} ({}) must be between -100 and 1000 km.", name, v));
                }
            }
        }

        if let Some(radius) = self.maxradiuskm {
            if radius <= 0.0 {
                problems.push(format!("maxradiuskm ({}) must be positive.", radius));
            }
        }

        if let Some(limit) = self.limit {
            if limit == 0 || limit > MAX_LIMIT {
                problems.push(format!("limit ({}) must be between 1 and {}.", limit, MAX_LIMIT));
            }
        }

        let circle = self.circle_fields();
        let circle_set: Vec<&str> = circle
            .iter()
            .filter(|(_, v)| v.is_some())
            .map(|(k, _)| *k)
            .collect();
        if !circle_set.is_empty() && circle_set.len() != circle.len() {
            let missing: Vec<&str> = circle
                .iter()
                .filter(|(_, v)| v.is_none())
                .map(|(k, _)| *k)
                .collect();
            problems.push(format!(
                "Incomplete circle geometry. Have: {:?}. Also need: {:?}.",
                circle_set, missing
            ));
        }

        let bbox = self.bbox_fields();
        let bbox_set: Vec<&str> = bbox
            .iter()
            .filter(|(_, v)| v.is_some())
            .map(|(k, _)| *k)
            .collect();
        if !bbox_set.is_empty() && bbox_set.len() != bbox.len() {
            let missing: Vec<&str> = bbox
                .iter()
                .filter(|(_, v)| v.is_none())
                .map(|(k, _)| *k)
                .collect();
            problems.push(format!(
                "Incomplete bounding box. Have: {:?}. Also need: {:?}.",
                bbox_set, missing
            ));
        }

        if self.has_circle() && self.has_full_bbox() {
            problems.push(
                "Both circle geometry and bounding box are fully set. Use one or the other; \
                 the API returns their intersection, which is likely empty."
                    .to_string(),
            );
        }

        ValidationReport {
            problems,
            provided: self.provided_fields(),
        }
    }

    /// URL parameters in a stable order, unset fields stripped, `format=geojson` appended.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params: Vec<(&'static str, String)> = Vec::new();

        let mut push_str = |k: &'static str, v: &Option<String>| {
            if let Some(v) = v {
                params.push((k, v.clone()));
            }
        };
        push_str("eventid", &self.eventid);
        push_str("starttime", &self.starttime);
        push_str("endtime", &self.endtime);
        push_str("updatedafter", &self.updatedafter);

        for (k, v) in self
            .circle_fields()
            .into_iter()
            .chain(self.bbox_fields())
            .chain([
                ("minmagnitude", self.minmagnitude),
                ("maxmagnitude", self.maxmagnitude),
                ("mindepth", self.mindepth),
                ("maxdepth", self.maxdepth),
            ])
        {
            if let Some(v) = v {
                params.push((k, num(v)));
            }
        }

        if let Some(v) = &self.eventtype {
            params.push(("eventtype", v.clone()));
        }
        if let Some(v) = self.reviewstatus {
            params.push(("reviewstatus", v.as_str().to_string()));
        }
        if let Some(v) = self.alertlevel {
            params.push(("alertlevel", v.as_str().to_string()));
        }
        if let Some(v) = &self.producttype {
            params.push(("producttype", v.clone()));
        }
        if let Some(v) = self.minfelt {
            params.push(("minfelt", v.to_string()));
        }
        if let Some(v) = self.minsig {
            params.push(("minsig", v.to_string()));
        }

        // /count ignores paging and ordering
        if self.endpoint == Endpoint::Query {
            if let Some(v) = self.orderby {
                params.push(("orderby", v.as_str().to_string()));
            }
            if let Some(v) = self.limit {
                params.push(("limit", v.to_string()));
            }
        }

        params.push(("format", "geojson".to_string()));
        params
    }

    /// Full request URL as it will be sent.
    pub fn url(&self, base_url: &str) -> String {
        let query = self
            .to_params()
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!(
            "{}{}?{}",
            base_url.trim_end_matches('/'),
            self.endpoint.path(),
            query
        )
    }
}

/// Values used when the user leaves a parameter out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDefaults {
    /// Look-back window when no dates are given
    pub timespan_days: i64,
    /// Radius applied to a named point without one (100 km covers a city and surroundings)
    pub radius_km: f64,
    /// Magnitude floor; 4.5 is regionally felt and keeps global queries small
    pub min_magnitude: f64,
    /// Excludes blasts, collapses and other non-earthquake events
    pub event_type: String,
    /// Page size for list queries, well under the API cap
    pub limit: u32,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            timespan_days: DEFAULT_TIMESPAN_DAYS,
            radius_km: 100.0,
            min_magnitude: 4.5,
            event_type: "earthquake".to_string(),
            limit: 100,
        }
    }
}

fn parse_day(s: &str) -> Option<NaiveDate> {
    s.get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
}

impl QueryDefaults {
    /// Start of the look-back window ending at `anchor`, with the span in days.
    ///
    /// A non-positive or out-of-range `timespan_days` falls back to
    /// [`DEFAULT_TIMESPAN_DAYS`].
    fn window_start(&self, anchor: NaiveDate) -> (NaiveDate, i64) {
        let configured = Some(self.timespan_days)
            .filter(|days| *days > 0)
            .and_then(Duration::try_days)
            .and_then(|span| anchor.checked_sub_signed(span));
        match configured {
            Some(start) => (start, self.timespan_days),
            None => {
                tracing::warn!(
                    timespan_days = self.timespan_days,
                    "Unusable default time window, using {} days",
                    DEFAULT_TIMESPAN_DAYS
                );
                (
                    anchor - Duration::days(DEFAULT_TIMESPAN_DAYS),
                    DEFAULT_TIMESPAN_DAYS,
                )
            }
        }
    }

    /// Fill every unset parameter that has a default and describe each one.
    ///
    /// Event lookups by id carry no other filters, so nothing is defaulted for them.
    pub fn apply(&self, query: &mut EarthquakeQuery, today: NaiveDate) -> Vec<String> {
        let mut assumptions = Vec::new();
        if query.eventid.is_some() {
            return assumptions;
        }

        let fmt = |d: NaiveDate| d.format("%Y-%m-%d").to_string();

        match (&query.starttime, &query.endtime) {
            (None, None) => {
                let (start, days) = self.window_start(today);
                let start = fmt(start);
                let end = fmt(today);
                assumptions.push(format!(
                    "No time window specified → defaulted to last {} days (starttime={}, endtime={})",
                    days, start, end
                ));
                query.starttime = Some(start);
                query.endtime = Some(end);
            }
            (None, Some(end)) => {
                let (start, days) = self.window_start(parse_day(end).unwrap_or(today));
                let start = fmt(start);
                assumptions.push(format!(
                    "No start date specified → defaulted starttime={} ({} days before the end date)",
                    start, days
                ));
                query.starttime = Some(start);
            }
            (Some(_), None) => {
                let end = fmt(today);
                assumptions.push(format!(
                    "No end date specified → defaulted endtime={} (today)",
                    end
                ));
                query.endtime = Some(end);
            }
            (Some(_), Some(_)) => {}
        }

        if query.minmagnitude.is_none() && query.maxmagnitude.is_none() {
            query.minmagnitude = Some(self.min_magnitude);
            assumptions.push(format!(
                "No magnitude filter specified → defaulted to minmagnitude={} \
                 (recommended floor; without it a global query returns ~500 events/day)",
                self.min_magnitude
            ));
        }

        if query.eventtype.is_none() {
            query.eventtype = Some(self.event_type.clone());
            assumptions.push(format!(
                "No event type specified → defaulted to eventtype='{}' \
                 (excludes explosions, blasts, and other non-earthquake seismic events)",
                self.event_type
            ));
        }

        if query.endpoint == Endpoint::Query && query.limit.is_none() {
            query.limit = Some(self.limit);
            assumptions.push(format!(
                "No result limit specified → defaulted to limit={}",
                self.limit
            ));
        }

        if let Some(assumption) = self.apply_radius(query) {
            assumptions.push(assumption);
        }

        assumptions
    }

    /// A named point without a radius gets the default radius.
    pub fn apply_radius(&self, query: &mut EarthquakeQuery) -> Option<String> {
        match (query.latitude, query.longitude, query.maxradiuskm) {
            (Some(lat), Some(lon), None) => {
                query.maxradiuskm = Some(self.radius_km);
                Some(format!(
                    "No radius given for location (lat={}, lon={}) → applied default radius of {} km",
                    lat, lon, self.radius_km
                ))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    #[test]
    fn test_full_bbox_beats_circle() {
        let mut q = EarthquakeQuery {
            latitude: Some(35.68),
            longitude: Some(139.69),
            minlatitude: Some(30.0),
            maxlatitude: Some(46.0),
            minlongitude: Some(130.0),
            maxlongitude: Some(146.0),
            ..Default::default()
        };
        q.resolve_geometry_conflict();
        assert!(q.latitude.is_none() && q.longitude.is_none());
        assert!(q.has_full_bbox());
    }

    #[test]
    fn test_circle_beats_partial_bbox() {
        let mut q = EarthquakeQuery {
            latitude: Some(35.68),
            longitude: Some(139.69),
            minlatitude: Some(30.0),
            ..Default::default()
        };
        q.resolve_geometry_conflict();
        assert!(q.minlatitude.is_none());
        assert_eq!(q.latitude, Some(35.68));
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let q = EarthquakeQuery {
            starttime: Some("2024-03-01".into()),
            endtime: Some("2024-01-01".into()),
            minmagnitude: Some(6.0),
            maxmagnitude: Some(5.0),
            latitude: Some(10.0),
            ..Default::default()
        };
        let report = q.validate();
        assert!(!report.is_valid());
        assert_eq!(report.problems.len(), 3);
        assert!(report.to_string().starts_with("Invalid query:"));
    }

    #[test]
    fn test_validation_rejects_both_geometries() {
        let q = EarthquakeQuery {
            latitude: Some(1.0),
            longitude: Some(2.0),
            maxradiuskm: Some(50.0),
            minlatitude: Some(0.0),
            maxlatitude: Some(3.0),
            minlongitude: Some(0.0),
            maxlongitude: Some(3.0),
            ..Default::default()
        };
        let report = q.validate();
        assert_eq!(report.problems.len(), 1);
        assert!(report.problems[0].contains("Both circle geometry and bounding box"));
    }

    #[test]
    fn test_count_params_skip_paging() {
        let q = EarthquakeQuery {
            endpoint: Endpoint::Count,
            minmagnitude: Some(6.0),
            orderby: Some(OrderBy::Magnitude),
            limit: Some(10),
            ..Default::default()
        };
        let params = q.to_params();
        assert!(params.iter().all(|(k, _)| *k != "limit" && *k != "orderby"));
        assert_eq!(params.last().unwrap(), &("format", "geojson".to_string()));
    }

    #[test]
    fn test_url_encodes_values() {
        let q = EarthquakeQuery {
            starttime: Some("2024-01-01T00:00:00".into()),
            minmagnitude: Some(4.5),
            ..Default::default()
        };
        let url = q.url("https://earthquake.usgs.gov/fdsnws/event/1/");
        assert_eq!(
            url,
            "https://earthquake.usgs.gov/fdsnws/event/1/query?starttime=2024-01-01T00%3A00%3A00&minmagnitude=4.5&format=geojson"
        );
    }

    #[test]
    fn test_defaults_record_one_assumption_each() {
        let mut q = EarthquakeQuery {
            latitude: Some(35.68),
            longitude: Some(139.69),
            ..Default::default()
        };
        let assumptions = QueryDefaults::default().apply(&mut q, today());
        assert_eq!(assumptions.len(), 5);
        assert_eq!(q.starttime.as_deref(), Some("2026-09-17"));
        assert_eq!(q.endtime.as_deref(), Some("2026-10-17"));
        assert_eq!(q.minmagnitude, Some(4.5));
        assert_eq!(q.eventtype.as_deref(), Some("earthquake"));
        assert_eq!(q.limit, Some(100));
        assert_eq!(q.maxradiuskm, Some(100.0));
        assert!(q.validate().is_valid());
    }

    #[test]
    fn test_fully_specified_count_needs_no_assumptions() {
        let mut q = EarthquakeQuery {
            endpoint: Endpoint::Count,
            starttime: Some("2026-10-01".into()),
            endtime: Some("2026-10-17".into()),
            minmagnitude: Some(6.0),
            eventtype: Some("earthquake".into()),
            ..Default::default()
        };
        let assumptions = QueryDefaults::default().apply(&mut q, today());
        assert!(assumptions.is_empty());
        assert!(q.limit.is_none());
    }

    #[test]
    fn test_start_default_anchors_on_end_date() {
        let mut q = EarthquakeQuery {
            endtime: Some("2020-01-31".into()),
            ..Default::default()
        };
        QueryDefaults::default().apply(&mut q, today());
        assert_eq!(q.starttime.as_deref(), Some("2020-01-01"));
        assert!(q.validate().is_valid());
    }

    #[test]
    fn test_unusable_timespan_falls_back_to_default_window() {
        for timespan_days in [i64::MAX, i64::MIN, 0] {
            let defaults = QueryDefaults {
                timespan_days,
                ..Default::default()
            };
            let mut q = EarthquakeQuery::default();
            let assumptions = defaults.apply(&mut q, today());
            assert_eq!(q.starttime.as_deref(), Some("2026-09-17"));
            assert!(assumptions[0].contains("last 30 days"), "{}", assumptions[0]);
        }
    }

    #[test]
    fn test_event_lookup_gets_no_defaults() {
        let mut q = EarthquakeQuery {
            eventid: Some("us6000m0xl".into()),
            ..Default::default()
        };
        assert!(QueryDefaults::default().apply(&mut q, today()).is_empty());
        assert_eq!(q.provided_fields(), vec!["eventid"]);
    }
}
