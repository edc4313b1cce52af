//! # Query Glossary
//!
//! Field reference shared by two audiences: users asking what a term means,
//! and the normaliser prompt that maps phrases onto query parameters.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct GlossaryEntry {
    pub field: &'static str,
    pub category: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub description: &'static str,
    pub default: Option<&'static str>,
    pub format: &'static str,
    pub example_phrases: &'static [&'static str],
}

pub const GLOSSARY: &[GlossaryEntry] = &[
    GlossaryEntry {
        field: "endpoint",
        category: "Query type",
        kind: "\"query\" or \"count\"",
        description: "Whether to fetch event records or just count them.",
        default: Some("query"),
        format: "query / count",
        example_phrases: &[
            "how many earthquakes  →  count",
            "show me / list / find earthquakes  →  query",
        ],
    },
    GlossaryEntry {
        field: "eventid",
        category: "Identity",
        kind: "string",
        description: "Look up one specific event by its USGS ID. No other filters needed.",
        default: None,
        format: "e.g. us6000m0xl",
        example_phrases: &[
            "tell me about earthquake us6000m0xl",
            "details for event id us6000m0xl",
        ],
    },
    GlossaryEntry {
        field: "starttime",
        category: "Time",
        kind: "ISO8601 date string",
        description: "Start of the time window to search.",
        default: Some("today minus 30 days"),
        format: "YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS",
        example_phrases: &[
            "since January 2024",
            "from 2024-01-01",
            "in the last week  →  compute starttime = today - 7 days",
            "yesterday  →  compute starttime = yesterday's date",
        ],
    },
    GlossaryEntry {
        field: "endtime",
        category: "Time",
        kind: "ISO8601 date string",
        description: "End of the time window to search.",
        default: Some("today"),
        format: "YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS",
        example_phrases: &[
            "up to March 2024",
            "before 2024-03-01",
            "last week  →  compute endtime = today",
        ],
    },
    GlossaryEntry {
        field: "updatedafter",
        category: "Time",
        kind: "ISO8601 datetime string",
        description: "Return only events updated after this timestamp. \
                      Meant for incremental sync jobs, not typical user questions.",
        default: None,
        format: "YYYY-MM-DDTHH:MM:SS",
        example_phrases: &["events revised since 2025-01-01"],
    },
    GlossaryEntry {
        field: "latitude",
        category: "Geography (circle)",
        kind: "float (-90 to 90)",
        description: "Centre latitude for a circular area search. \
                      Combined with longitude and maxradiuskm.",
        default: None,
        format: "decimal degrees, e.g. 35.68",
        example_phrases: &[
            "near Tokyo  →  latitude=35.68, longitude=139.69",
            "near Los Angeles  →  latitude=34.05, longitude=-118.24",
        ],
    },
    GlossaryEntry {
        field: "longitude",
        category: "Geography (circle)",
        kind: "float (-360 to 360)",
        description: "Centre longitude for a circular area search.",
        default: None,
        format: "decimal degrees, e.g. 139.69 or -118.24",
        example_phrases: &["see latitude examples"],
    },
    GlossaryEntry {
        field: "maxradiuskm",
        category: "Geography (circle)",
        kind: "float (> 0)",
        description: "Radius of the circle in kilometres.",
        default: Some("100 km (~62 miles), applied when latitude/longitude are set without a radius"),
        format: "kilometres, e.g. 100",
        example_phrases: &[
            "within 200 km of Tokyo",
            "within 50 miles of Los Angeles  →  convert to km (× 1.609)",
        ],
    },
    GlossaryEntry {
        field: "minlatitude / maxlatitude / minlongitude / maxlongitude",
        category: "Geography (bounding box)",
        kind: "float",
        description: "Rectangular bounding box. All four must be set together.",
        default: None,
        format: "decimal degrees",
        example_phrases: &[
            "earthquakes in Japan  →  minlat=30, maxlat=46, minlon=130, maxlon=146",
            "earthquakes in California  →  minlat=32, maxlat=42, minlon=-124, maxlon=-114",
            "earthquakes in Turkey  →  minlat=36, maxlat=42, minlon=26, maxlon=45",
        ],
    },
    GlossaryEntry {
        field: "minmagnitude",
        category: "Magnitude",
        kind: "float",
        description: "Minimum magnitude. Magnitude measures the energy released at the \
                      source on a logarithmic scale; each whole step is about 32 times \
                      more energy. The recommended global floor is 4.5.",
        default: Some("4.5"),
        format: "e.g. 4.5",
        example_phrases: &[
            "magnitude 5 or greater  →  minmagnitude=5",
            "M6+  →  minmagnitude=6",
            "big earthquakes  →  assume minmagnitude=6",
            "major earthquakes  →  assume minmagnitude=7",
            "significant earthquakes  →  assume minmagnitude=5",
        ],
    },
    GlossaryEntry {
        field: "maxmagnitude",
        category: "Magnitude",
        kind: "float",
        description: "Maximum magnitude cap.",
        default: None,
        format: "e.g. 6.0",
        example_phrases: &[
            "smaller than M5  →  maxmagnitude=5",
            "between M4 and M6  →  minmagnitude=4, maxmagnitude=6",
        ],
    },
    GlossaryEntry {
        field: "mindepth",
        category: "Depth",
        kind: "float (-100 to 1000 km)",
        description: "Minimum depth in kilometres below the surface.",
        default: None,
        format: "kilometres",
        example_phrases: &[
            "deep earthquakes  →  mindepth=300",
            "deeper than 100 km  →  mindepth=100",
        ],
    },
    GlossaryEntry {
        field: "maxdepth",
        category: "Depth",
        kind: "float (-100 to 1000 km)",
        description: "Maximum depth in kilometres.",
        default: None,
        format: "kilometres",
        example_phrases: &[
            "shallow earthquakes  →  maxdepth=30",
            "near-surface earthquakes  →  maxdepth=10",
        ],
    },
    GlossaryEntry {
        field: "eventtype",
        category: "Event classification",
        kind: "string",
        description: "Filter by event type. 'earthquake' excludes blasts, collapses \
                      and other non-earthquake seismic events.",
        default: Some("earthquake"),
        format: "e.g. earthquake, explosion, quarry blast",
        example_phrases: &[
            "explosions  →  eventtype=explosion",
            "only earthquakes  →  eventtype=earthquake (default)",
        ],
    },
    GlossaryEntry {
        field: "reviewstatus",
        category: "Event classification",
        kind: "\"reviewed\" | \"automatic\"",
        description: "'reviewed' = human-checked, higher quality. \
                      'automatic' = machine-detected, more recent but less accurate. \
                      Omit to return all events.",
        default: None,
        format: "reviewed / automatic (omit for all)",
        example_phrases: &[
            "confirmed earthquakes  →  reviewstatus=reviewed",
            "latest detections  →  reviewstatus=automatic",
        ],
    },
    GlossaryEntry {
        field: "alertlevel",
        category: "Event classification",
        kind: "\"green\" | \"yellow\" | \"orange\" | \"red\"",
        description: "PAGER impact alert level. Red = highest casualty/damage risk.",
        default: None,
        format: "green / yellow / orange / red",
        example_phrases: &[
            "deadly earthquakes  →  alertlevel=red",
            "high impact earthquakes  →  alertlevel=orange or red",
        ],
    },
    GlossaryEntry {
        field: "producttype",
        category: "Event classification",
        kind: "string",
        description: "Filter to events where USGS has produced a specific analysis product.",
        default: None,
        format: "e.g. shakemap, moment-tensor, losspager, dyfi, finite-fault",
        example_phrases: &[
            "earthquakes with ShakeMaps  →  producttype=shakemap",
            "earthquakes with loss estimates  →  producttype=losspager",
        ],
    },
    GlossaryEntry {
        field: "minfelt",
        category: "Impact",
        kind: "int (>= 0)",
        description: "Minimum number of public 'Did You Feel It?' reports. \
                      A good proxy for widely felt events.",
        default: None,
        format: "integer, e.g. 100",
        example_phrases: &[
            "widely felt earthquakes  →  minfelt=100",
            "earthquakes felt by many people  →  minfelt=100",
        ],
    },
    GlossaryEntry {
        field: "minsig",
        category: "Impact",
        kind: "int (>= 0)",
        description: "Minimum USGS significance score (0 to 2000+), a composite of \
                      magnitude, felt reports and impact. 500+ is significant, 1000+ is major.",
        default: None,
        format: "integer, e.g. 500",
        example_phrases: &[
            "most significant earthquakes  →  minsig=1000",
            "notable earthquakes  →  minsig=500",
        ],
    },
    GlossaryEntry {
        field: "orderby",
        category: "Output",
        kind: "\"time\" | \"time-asc\" | \"magnitude\" | \"magnitude-asc\"",
        description: "Sort order of results.",
        default: Some("time (newest first)"),
        format: "time / time-asc / magnitude / magnitude-asc",
        example_phrases: &[
            "biggest earthquakes first  →  orderby=magnitude",
            "oldest first  →  orderby=time-asc",
            "most recent first  →  orderby=time (default)",
        ],
    },
    GlossaryEntry {
        field: "limit",
        category: "Output",
        kind: "int (1 to 20000)",
        description: "Maximum number of results to return.",
        default: Some("100"),
        format: "integer",
        example_phrases: &[
            "top 10  →  limit=10, orderby=magnitude",
            "show me 50  →  limit=50",
        ],
    },
];

fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Entries relevant to a free-text topic such as "magnitude" or "alert level".
pub fn lookup(topic: &str) -> Vec<&'static GlossaryEntry> {
    let needle = squash(topic);
    if needle.is_empty() {
        return Vec::new();
    }
    let words: Vec<String> = topic
        .split_whitespace()
        .map(squash)
        .filter(|w| w.len() >= 4)
        .collect();

    GLOSSARY
        .iter()
        .filter(|entry| {
            let field = squash(entry.field);
            let category = squash(entry.category);
            field.contains(&needle)
                || category.contains(&needle)
                || squash(entry.description).contains(&needle)
                || words
                    .iter()
                    .any(|w| field.contains(w.as_str()) || category.contains(w.as_str()))
        })
        .collect()
}

/// Grouped markdown rendering for display to a user.
pub fn format_for_user(entries: &[&GlossaryEntry]) -> String {
    let mut lines = vec!["**Earthquake Query Glossary**".to_string(), String::new()];
    let mut current_category = "";

    for entry in entries {
        if entry.category != current_category {
            lines.push(format!("**{}**", entry.category));
            current_category = entry.category;
        }
        lines.push(format!("  `{}`  ({})", entry.field, entry.kind));
        lines.push(format!("    {}", entry.description));
        if let Some(default) = entry.default {
            lines.push(format!("    Default: {}", default));
        }
        lines.push(format!("    Format: {}", entry.format));
        if !entry.example_phrases.is_empty() {
            lines.push("    Examples:".to_string());
            for phrase in entry.example_phrases {
                lines.push(format!("      • {}", phrase));
            }
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// The whole glossary for display.
pub fn full_for_user() -> String {
    let all: Vec<&GlossaryEntry> = GLOSSARY.iter().collect();
    format_for_user(&all)
}

/// Compact reference embedded in the normaliser prompt.
pub fn format_for_llm() -> String {
    let mut lines = vec!["QUERY FIELD REFERENCE:".to_string()];
    let mut current_category = "";

    for entry in GLOSSARY {
        if entry.category != current_category {
            lines.push(format!("\n[{}]", entry.category));
            current_category = entry.category;
        }
        let default = entry
            .default
            .map(|d| format!("  default={}", d))
            .unwrap_or_default();
        lines.push(format!("  {} ({}){}", entry.field, entry.kind, default));
        lines.push(format!("    → {}", entry.description));
        lines.push(format!("    format: {}", entry.format));
        for phrase in entry.example_phrases {
            lines.push(format!("    e.g. \"{}\"", phrase));
        }
    }

    lines.join("\n")
}
