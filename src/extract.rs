//! Deterministic rule-based filter extraction.
//!
//! The extractor is the guaranteed-available last line of defense when
//! every translation provider fails: a total function over the query
//! text that never errors. `None` means "no constraints" — the search
//! degrades to a pure similarity query.
//!
//! Entity recognition is gazetteer-driven: a reference list of known
//! author names and a topic vocabulary mapping phrases to hashtag
//! tokens. The gazetteer is injected configuration, not hard-coded
//! literals, so deployments can swap vocabularies without touching the
//! matching logic.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use regex::Regex;

use crate::filter::{FilterExpr, FilterValue, LogicalKind, Scalar};
use crate::schema::{Operator, TIMESTAMP_FIELD};

/// A topic vocabulary entry: any pattern match contributes the tag.
#[derive(Debug, Clone)]
pub struct Topic {
    /// Lowercase phrases matched with word boundaries.
    pub patterns: Vec<String>,
    /// Hashtag token emitted on match (e.g. `"#RohitSharma"`).
    pub tag: String,
}

/// Reference lists used for substring-based entity recognition.
#[derive(Debug, Clone)]
pub struct Gazetteer {
    pub authors: Vec<String>,
    pub topics: Vec<Topic>,
}

impl Gazetteer {
    fn topic(patterns: &[&str], tag: &str) -> Topic {
        Topic {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            tag: tag.to_string(),
        }
    }
}

impl Default for Gazetteer {
    /// The vocabulary of the demo article index: a handful of authors,
    /// cricket players, teams, and tournament keywords.
    fn default() -> Self {
        Self {
            authors: vec![
                "Jane Doe".to_string(),
                "Mary Poppins".to_string(),
                "Akainu".to_string(),
            ],
            topics: vec![
                Self::topic(&["rohit sharma", "rohit"], "#RohitSharma"),
                Self::topic(&["shubman gill", "shubman"], "#ShubmanGill"),
                Self::topic(&["virat kohli", "virat"], "#ViratKohli"),
                Self::topic(&["shikhar dhawan", "shikhar"], "#ShikharDhawan"),
                Self::topic(&["mumbai indians", "mi"], "#MumbaiIndians"),
                Self::topic(&["rajasthan royals", "rr"], "#RajasthanRoyals"),
                Self::topic(&["gujarat titans", "gt"], "#GujaratTitans"),
                Self::topic(&["ipl 2025", "ipl2025", "ipl"], "#IPL2025"),
                Self::topic(&["cricket"], "#Cricket"),
            ],
        }
    }
}

/// Explicit co-occurrence markers that switch multi-tag queries from the
/// default OR reading to AND ("posts containing both A and B").
const AND_MARKERS: &[&str] = &[
    "containing both",
    "with both",
    "having both",
    "includes both",
    "both",
];

const MONTHS: &[(&str, u32)] = &[
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
];

/// Pattern/keyword matcher producing a filter expression from text.
pub struct RuleExtractor {
    gazetteer: Gazetteer,
    iso_date_re: Regex,
    year_re: Regex,
    prev_days_re: Regex,
    neg_author_re: Regex,
    by_author_re: Regex,
}

impl RuleExtractor {
    pub fn new(gazetteer: Gazetteer) -> Self {
        Self {
            gazetteer,
            iso_date_re: Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap(),
            year_re: Regex::new(r"\b((?:19|20)\d{2})\b").unwrap(),
            prev_days_re: Regex::new(r"previous\s+(\d+)\s+days").unwrap(),
            neg_author_re: Regex::new(
                r"\b(?:[Nn]ot\s+[Bb]y|[Ee]xcluding)\s+([A-Z][a-zA-Z'-]+(?:\s+[A-Z][a-zA-Z'-]+)*)",
            )
            .unwrap(),
            by_author_re: Regex::new(r"\b[Bb]y\s+([A-Z][a-zA-Z'-]+(?:\s+[A-Z][a-zA-Z'-]+)*)")
                .unwrap(),
        }
    }

    /// Extract a filter from the query, resolving relative dates against
    /// the current wall clock.
    pub fn extract(&self, query: &str) -> Option<FilterExpr> {
        self.extract_at(query, Utc::now())
    }

    /// Extract a filter from the query, resolving relative dates against
    /// a caller-supplied reference instant.
    pub fn extract_at(&self, query: &str, now: DateTime<Utc>) -> Option<FilterExpr> {
        let lower = query.to_lowercase();

        let mut parts: Vec<FilterExpr> = Vec::new();

        if let Some(author) = self.extract_author(query, &lower) {
            parts.push(author);
        }
        if let Some(tags) = self.extract_tags(&lower) {
            parts.push(tags);
        }
        if let Some((start, end)) = self.extract_date_range(&lower, now) {
            parts.push(FilterExpr::comparison(
                TIMESTAMP_FIELD,
                Operator::Gte,
                FilterValue::Scalar(Scalar::Int(start)),
            ));
            parts.push(FilterExpr::comparison(
                TIMESTAMP_FIELD,
                Operator::Lt,
                FilterValue::Scalar(Scalar::Int(end)),
            ));
        }

        FilterExpr::combine(LogicalKind::And, parts)
    }

    // ============ Author ============

    fn extract_author(&self, query: &str, lower: &str) -> Option<FilterExpr> {
        // Known authors first; the generic "by <Name>" pattern is the
        // fallback for names outside the reference list.
        let name = self
            .gazetteer
            .authors
            .iter()
            .find(|a| find_word(lower, &a.to_lowercase()).is_some())
            .cloned()
            .or_else(|| {
                self.neg_author_re
                    .captures(query)
                    .or_else(|| self.by_author_re.captures(query))
                    .map(|c| c[1].to_string())
            })?;

        let name_lower = name.to_lowercase();
        let negated = lower.contains(&format!("not by {}", name_lower))
            || lower.contains(&format!("excluding {}", name_lower));
        let op = if negated { Operator::Ne } else { Operator::Eq };

        Some(FilterExpr::comparison(
            "author",
            op,
            FilterValue::Scalar(Scalar::Str(name)),
        ))
    }

    // ============ Tags ============

    fn extract_tags(&self, lower: &str) -> Option<FilterExpr> {
        // Each topic contributes at most one tag, ordered by where its
        // first pattern occurs in the query.
        let mut found: Vec<(usize, &str)> = Vec::new();
        for topic in &self.gazetteer.topics {
            let pos = topic
                .patterns
                .iter()
                .filter_map(|p| find_word(lower, p))
                .min();
            if let Some(pos) = pos {
                found.push((pos, topic.tag.as_str()));
            }
        }
        found.sort_by_key(|(pos, _)| *pos);
        let tags: Vec<&str> = found.iter().map(|(_, t)| *t).collect();

        match tags.len() {
            0 => None,
            1 => Some(FilterExpr::eq("tags", Scalar::from(tags[0]))),
            _ => {
                if AND_MARKERS.iter().any(|m| find_word(lower, m).is_some()) {
                    // Co-occurrence: every tag must individually match.
                    Some(FilterExpr::And(
                        tags.iter()
                            .map(|t| FilterExpr::eq("tags", Scalar::from(*t)))
                            .collect(),
                    ))
                } else {
                    // Casual conjunctions read as "about either" — OR.
                    Some(FilterExpr::comparison(
                        "tags",
                        Operator::In,
                        FilterValue::List(tags.iter().map(|t| Scalar::from(*t)).collect()),
                    ))
                }
            }
        }
    }

    // ============ Dates ============

    /// Recognize a date constraint as a half-open `[start, end)` epoch
    /// range, in priority order: explicit ISO date, month name, bare
    /// year, relative phrase.
    fn extract_date_range(&self, lower: &str, now: DateTime<Utc>) -> Option<(i64, i64)> {
        if let Some(caps) = self.iso_date_re.captures(lower) {
            let y: i32 = caps[1].parse().ok()?;
            let m: u32 = caps[2].parse().ok()?;
            let d: u32 = caps[3].parse().ok()?;
            if let Some(range) = day_range(y, m, d) {
                return Some(range);
            }
            // Nonexistent day (e.g. 2025-02-30): coarser month range
            // instead of failing.
            return month_range(y, m);
        }

        let month = MONTHS
            .iter()
            .filter_map(|(name, num)| find_word(lower, name).map(|pos| (pos, *name, *num)))
            .min_by_key(|(pos, _, _)| *pos);
        if let Some((pos, name, m)) = month {
            let y = self
                .year_re
                .captures(lower)
                .and_then(|c| c[1].parse().ok())
                .unwrap_or(now.year());
            if let Some(d) = adjacent_day(lower, pos, name.len()) {
                if let Some(range) = day_range(y, m, d) {
                    return Some(range);
                }
                // "February 30" must not raise; fall back to the month.
            }
            return month_range(y, m);
        }

        if let Some(caps) = self.year_re.captures(lower) {
            let y: i32 = caps[1].parse().ok()?;
            return year_range(y);
        }

        self.relative_range(lower, now)
    }

    fn relative_range(&self, lower: &str, now: DateTime<Utc>) -> Option<(i64, i64)> {
        if lower.contains("this year") {
            return year_range(now.year());
        }
        if lower.contains("last year") {
            return year_range(now.year() - 1);
        }
        if lower.contains("last month") {
            let (y, m) = if now.month() == 1 {
                (now.year() - 1, 12)
            } else {
                (now.year(), now.month() - 1)
            };
            return month_range(y, m);
        }
        if lower.contains("last week") {
            return Some(((now - Duration::days(7)).timestamp(), now.timestamp()));
        }
        if let Some(caps) = self.prev_days_re.captures(lower) {
            // Absurd day counts overflow the date arithmetic; treat
            // them as no constraint rather than panic.
            let days: i64 = caps[1].parse().ok()?;
            let delta = Duration::try_days(days)?;
            let start = now.checked_sub_signed(delta)?;
            return Some((start.timestamp(), now.timestamp()));
        }
        None
    }
}

impl Default for RuleExtractor {
    fn default() -> Self {
        Self::new(Gazetteer::default())
    }
}

// ============ Matching helpers ============

/// Find `pattern` in `text` at word boundaries, returning the byte
/// offset of the first occurrence. Plain substring search would let
/// short aliases like `"mi"` match inside `"mumbai"`.
fn find_word(text: &str, pattern: &str) -> Option<usize> {
    if pattern.is_empty() {
        return None;
    }
    let mut from = 0;
    while let Some(rel) = text[from..].find(pattern) {
        let start = from + rel;
        let end = start + pattern.len();
        let before_ok = start == 0
            || !text[..start]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let after_ok = end == text.len()
            || !text[end..].chars().next().is_some_and(|c| c.is_alphanumeric());
        if before_ok && after_ok {
            return Some(start);
        }
        from = end;
    }
    None
}

/// Look for a day-of-month number adjacent to a month name, accepting
/// "May 5", "5 May", "5th of May", and "May 5, 2025" shapes. Four-digit
/// numbers are years, not days.
fn adjacent_day(lower: &str, month_pos: usize, month_len: usize) -> Option<u32> {
    let parse_day = |token: &str| -> Option<u32> {
        // Strip ordinal suffixes and trailing punctuation ("5th", "5,").
        let digits = token.trim_end_matches(|c: char| !c.is_ascii_digit());
        if digits.is_empty() || digits.len() >= 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    };

    // Token after the month name.
    let after = lower[month_pos + month_len..].trim_start_matches([' ', ',']);
    if let Some(day) = after.split_whitespace().next().and_then(parse_day) {
        return Some(day);
    }

    // Token before, skipping an "of" ("30th of February").
    let mut before: Vec<&str> = lower[..month_pos].split_whitespace().collect();
    if before.last() == Some(&"of") {
        before.pop();
    }
    before.last().and_then(|t| parse_day(t))
}

// ============ Range construction ============

fn epoch(y: i32, m: u32, d: u32) -> Option<i64> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0)
        .single()
        .map(|dt| dt.timestamp())
}

fn day_range(y: i32, m: u32, d: u32) -> Option<(i64, i64)> {
    let start = epoch(y, m, d)?;
    Some((start, start + 86_400))
}

fn month_range(y: i32, m: u32) -> Option<(i64, i64)> {
    let start = epoch(y, m, 1)?;
    let end = if m == 12 {
        epoch(y + 1, 1, 1)?
    } else {
        epoch(y, m + 1, 1)?
    };
    Some((start, end))
}

fn year_range(y: i32) -> Option<(i64, i64)> {
    Some((epoch(y, 1, 1)?, epoch(y + 1, 1, 1)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> RuleExtractor {
        RuleExtractor::default()
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 14, 0, 0, 0).unwrap()
    }

    fn ts_range(expr: &FilterExpr) -> (i64, i64) {
        let comps = expr.comparisons();
        let bound = |wanted: Operator| {
            comps
                .iter()
                .find(|(f, op, _)| *f == TIMESTAMP_FIELD && *op == wanted)
                .map(|(_, _, v)| match v {
                    FilterValue::Scalar(Scalar::Int(i)) => *i,
                    other => panic!("unexpected value {:?}", other),
                })
                .expect("missing timestamp bound")
        };
        (bound(Operator::Gte), bound(Operator::Lt))
    }

    #[test]
    fn test_author_equality() {
        let expr = extractor().extract("articles by Jane Doe").unwrap();
        assert_eq!(expr, FilterExpr::eq("author", Scalar::from("Jane Doe")));
    }

    #[test]
    fn test_author_negation() {
        let expr = extractor().extract("posts not by Jane Doe").unwrap();
        assert_eq!(
            expr,
            FilterExpr::comparison(
                "author",
                Operator::Ne,
                FilterValue::Scalar(Scalar::from("Jane Doe"))
            )
        );

        let expr = extractor()
            .extract("everything excluding Mary Poppins")
            .unwrap();
        assert_eq!(
            expr,
            FilterExpr::comparison(
                "author",
                Operator::Ne,
                FilterValue::Scalar(Scalar::from("Mary Poppins"))
            )
        );
    }

    #[test]
    fn test_generic_by_pattern_for_unknown_author() {
        let expr = extractor()
            .extract("Anything by John Smith on vector search")
            .unwrap();
        assert_eq!(expr, FilterExpr::eq("author", Scalar::from("John Smith")));
    }

    #[test]
    fn test_single_tag() {
        let expr = extractor().extract("posts about Rohit Sharma").unwrap();
        assert_eq!(expr, FilterExpr::eq("tags", Scalar::from("#RohitSharma")));
    }

    #[test]
    fn test_multiple_tags_default_to_or() {
        let expr = extractor()
            .extract("posts about Rohit Sharma and Shubman Gill")
            .unwrap();
        assert_eq!(
            expr,
            FilterExpr::comparison(
                "tags",
                Operator::In,
                FilterValue::List(vec![
                    Scalar::from("#RohitSharma"),
                    Scalar::from("#ShubmanGill")
                ])
            )
        );
    }

    #[test]
    fn test_both_marker_switches_to_and() {
        let expr = extractor()
            .extract("posts containing both Rohit Sharma and Shubman Gill")
            .unwrap();
        assert_eq!(
            expr,
            FilterExpr::And(vec![
                FilterExpr::eq("tags", Scalar::from("#RohitSharma")),
                FilterExpr::eq("tags", Scalar::from("#ShubmanGill")),
            ])
        );
    }

    #[test]
    fn test_short_alias_needs_word_boundary() {
        // "mi" must not fire inside "similar".
        assert_eq!(extractor().extract("posts similar to these"), None);

        let expr = extractor().extract("MI posts from the final").unwrap();
        assert_eq!(expr, FilterExpr::eq("tags", Scalar::from("#MumbaiIndians")));
    }

    #[test]
    fn test_year_range() {
        let expr = extractor().extract("articles from 2025").unwrap();
        assert_eq!(ts_range(&expr), (1735689600, 1767225600));
    }

    #[test]
    fn test_month_range_with_year() {
        let expr = extractor().extract("articles from May 2025").unwrap();
        assert_eq!(ts_range(&expr), (1746057600, 1748736000));
    }

    #[test]
    fn test_month_without_year_uses_reference_year() {
        let expr = extractor()
            .extract_at("posts from June", fixed_now())
            .unwrap();
        assert_eq!(
            ts_range(&expr),
            (epoch(2025, 6, 1).unwrap(), epoch(2025, 7, 1).unwrap())
        );
    }

    #[test]
    fn test_explicit_iso_date_is_one_day_range() {
        let expr = extractor().extract("posts from 2025-05-10").unwrap();
        let start = epoch(2025, 5, 10).unwrap();
        assert_eq!(ts_range(&expr), (start, start + 86_400));
    }

    #[test]
    fn test_day_of_month() {
        let expr = extractor().extract("articles from May 5, 2025").unwrap();
        let start = epoch(2025, 5, 5).unwrap();
        assert_eq!(ts_range(&expr), (start, start + 86_400));

        let expr = extractor()
            .extract("articles from the 5th of May 2025")
            .unwrap();
        assert_eq!(ts_range(&expr), (start, start + 86_400));
    }

    #[test]
    fn test_nonexistent_day_falls_back_to_month() {
        let expr = extractor()
            .extract("articles from February 30, 2025")
            .unwrap();
        assert_eq!(
            ts_range(&expr),
            (epoch(2025, 2, 1).unwrap(), epoch(2025, 3, 1).unwrap())
        );
    }

    #[test]
    fn test_relative_phrases() {
        let now = fixed_now();
        let ex = extractor();

        let expr = ex.extract_at("posts from this year", now).unwrap();
        assert_eq!(ts_range(&expr), (1735689600, 1767225600));

        let expr = ex.extract_at("posts from last year", now).unwrap();
        assert_eq!(
            ts_range(&expr),
            (epoch(2024, 1, 1).unwrap(), epoch(2025, 1, 1).unwrap())
        );

        let expr = ex.extract_at("posts from last month", now).unwrap();
        assert_eq!(
            ts_range(&expr),
            (epoch(2025, 6, 1).unwrap(), epoch(2025, 7, 1).unwrap())
        );

        let expr = ex.extract_at("articles from previous 15 days", now).unwrap();
        assert_eq!(
            ts_range(&expr),
            ((now - Duration::days(15)).timestamp(), now.timestamp())
        );

        let expr = ex.extract_at("posts from last week", now).unwrap();
        assert_eq!(
            ts_range(&expr),
            ((now - Duration::days(7)).timestamp(), now.timestamp())
        );
    }

    #[test]
    fn test_absurd_day_count_is_dropped_not_panicking() {
        let ex = extractor();
        assert_eq!(
            ex.extract_at("articles from previous 100000000 days", fixed_now()),
            None
        );
        assert_eq!(
            ex.extract_at(
                "articles from previous 99999999999999999999 days",
                fixed_now()
            ),
            None
        );
    }

    #[test]
    fn test_january_wraps_to_previous_december() {
        let jan = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
        let expr = extractor()
            .extract_at("posts from last month", jan)
            .unwrap();
        assert_eq!(
            ts_range(&expr),
            (epoch(2024, 12, 1).unwrap(), epoch(2025, 1, 1).unwrap())
        );
    }

    #[test]
    fn test_combined_groups_wrap_in_and() {
        let expr = extractor()
            .extract("posts by Jane Doe about cricket from May 2025")
            .unwrap();
        match &expr {
            FilterExpr::And(parts) => {
                // author + tag + two timestamp bounds
                assert_eq!(parts.len(), 4);
            }
            other => panic!("expected And, got {:?}", other),
        }
        assert_eq!(ts_range(&expr), (1746057600, 1748736000));
    }

    #[test]
    fn test_unconstrained_query_yields_none() {
        assert_eq!(extractor().extract("show me something interesting"), None);
    }
}
