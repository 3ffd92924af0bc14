//! Field-set variants and typed access to the fields of a raw record.
//!
//! A [`FieldSetSpec`] is the ordered list of acceptable required-name
//! combinations for one entity kind. It is generated from a mandatory base
//! set, alternative groups (exactly one of which is used) and optional
//! extension groups (any subset of which may be present). Variants are
//! sorted by size, largest first, ties kept in declaration order, and the
//! first variant covered by the record wins. The order never depends on map
//! iteration.
//!
//! The winning variant is exposed as [`FieldValues`], whose accessors coerce
//! the raw strings (uuid, numbers, booleans, timestamps, GeoJSON, quantities)
//! and turn any failure into [`IngestError::FieldCoercion`].

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::{CoercionCause, IngestError, IngestResult, UnitMappingError};
use crate::normalize::normalize;
use crate::record::{normalize_key, RawRecord};
use crate::units::{KindMismatch, Quantity};
use crate::{EntityKind, GeoPath, GeoPoint};

/// One acceptable combination of required field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSet {
    names: Vec<&'static str>,
}

impl FieldSet {
    pub fn new(names: impl IntoIterator<Item = &'static str>) -> Self {
        let mut unique: Vec<&'static str> = Vec::new();
        for name in names {
            if !unique
                .iter()
                .any(|known| normalize_key(known) == normalize_key(name))
            {
                unique.push(name);
            }
        }
        Self { names: unique }
    }

    /// Field names as declared (camelCase).
    pub fn names(&self) -> &[&'static str] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Whether the set contains the field (any spelling).
    pub fn contains(&self, field: &str) -> bool {
        let key = normalize_key(field);
        self.names.iter().any(|name| normalize_key(name) == key)
    }

    /// Whether every name of the set is present in the record.
    pub fn is_covered_by(&self, record: &RawRecord) -> bool {
        self.names
            .iter()
            .all(|name| record.contains(&normalize_key(name)))
    }
}

impl std::fmt::Display for FieldSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.names.join(", "))
    }
}

/// Ordered field-set variants of one entity kind, most specific first.
#[derive(Debug, Clone)]
pub struct FieldSetSpec {
    kind: EntityKind,
    variants: Vec<FieldSet>,
}

impl FieldSetSpec {
    /// Start a spec from the kind's mandatory base set.
    pub fn builder(kind: EntityKind, base: &[&'static str]) -> FieldSetSpecBuilder {
        FieldSetSpecBuilder {
            kind,
            base: base.to_vec(),
            alternatives: Vec::new(),
            optional: Vec::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn variants(&self) -> &[FieldSet] {
        &self.variants
    }

    /// Pick the first variant whose names are all present in the record.
    pub fn select<'a>(&'a self, record: &'a RawRecord) -> IngestResult<FieldValues<'a>> {
        match self
            .variants
            .iter()
            .position(|variant| variant.is_covered_by(record))
        {
            Some(index) => {
                debug!(
                    kind = %self.kind,
                    record = %record.label(),
                    variant = index,
                    "selected field set"
                );
                Ok(FieldValues {
                    record,
                    variant: &self.variants[index],
                })
            }
            None => Err(IngestError::NoMatchingFieldSet {
                kind: self.kind,
                present: record.keys().map(str::to_string).collect(),
                attempted: self
                    .variants
                    .iter()
                    .map(|variant| variant.names().iter().map(|n| n.to_string()).collect())
                    .collect(),
            }),
        }
    }
}

/// Builder for [`FieldSetSpec`].
#[derive(Debug, Clone)]
pub struct FieldSetSpecBuilder {
    kind: EntityKind,
    base: Vec<&'static str>,
    alternatives: Vec<Vec<&'static str>>,
    optional: Vec<Vec<&'static str>>,
}

impl FieldSetSpecBuilder {
    /// Add an alternative group; exactly one alternative is part of each variant.
    pub fn alternative(mut self, fields: &[&'static str]) -> Self {
        self.alternatives.push(fields.to_vec());
        self
    }

    /// Add an optional extension group; any subset of groups may be present.
    pub fn optional(mut self, fields: &[&'static str]) -> Self {
        self.optional.push(fields.to_vec());
        self
    }

    pub fn build(self) -> FieldSetSpec {
        let alternatives = if self.alternatives.is_empty() {
            vec![Vec::new()]
        } else {
            self.alternatives
        };
        let groups = self.optional.len();

        let mut variants = Vec::with_capacity(alternatives.len() << groups);
        for alternative in &alternatives {
            // Subsets of optional groups, all groups first; bit `groups - 1 - i`
            // selects group `i` so earlier groups win ties.
            for mask in (0..1usize << groups).rev() {
                let mut names = self.base.clone();
                names.extend(alternative.iter().copied());
                for (i, group) in self.optional.iter().enumerate() {
                    if mask & (1 << (groups - 1 - i)) != 0 {
                        names.extend(group.iter().copied());
                    }
                }
                variants.push(FieldSet::new(names));
            }
        }
        // Stable: equal sizes keep declaration order.
        variants.sort_by(|a, b| b.len().cmp(&a.len()));
        variants.dedup();

        FieldSetSpec {
            kind: self.kind,
            variants,
        }
    }
}

/// Fields of a record restricted to the selected variant.
#[derive(Debug, Clone, Copy)]
pub struct FieldValues<'a> {
    record: &'a RawRecord,
    variant: &'a FieldSet,
}

impl<'a> FieldValues<'a> {
    pub fn record(&self) -> &'a RawRecord {
        self.record
    }

    pub fn variant(&self) -> &'a FieldSet {
        self.variant
    }

    /// Whether the field belongs to the selected variant.
    pub fn has(&self, field: &str) -> bool {
        self.variant.contains(field)
    }

    /// Raw value of a field of the selected variant. Extra fields are invisible.
    pub fn raw(&self, field: &str) -> Option<&'a str> {
        if self.has(field) {
            self.record.get(field)
        } else {
            None
        }
    }

    fn required<T>(
        &self,
        field: &str,
        parse: impl FnOnce(&str) -> Result<T, CoercionCause>,
    ) -> IngestResult<T> {
        let raw = self.raw(field).ok_or_else(|| {
            IngestError::coercion(
                field,
                CoercionCause::Constraint("not part of the selected field set".into()),
            )
        })?;
        parse(raw.trim()).map_err(|cause| IngestError::coercion(field, cause))
    }

    fn optional<T>(
        &self,
        field: &str,
        parse: impl FnOnce(&str) -> Result<T, CoercionCause>,
    ) -> IngestResult<Option<T>> {
        match self.raw(field).map(str::trim) {
            Some(raw) if !raw.is_empty() => parse(raw)
                .map(Some)
                .map_err(|cause| IngestError::coercion(field, cause)),
            _ => Ok(None),
        }
    }

    /// Non-empty string.
    pub fn string(&self, field: &str) -> IngestResult<String> {
        self.required(field, |raw| {
            if raw.is_empty() {
                Err(CoercionCause::Constraint("must not be empty".into()))
            } else {
                Ok(raw.to_string())
            }
        })
    }

    pub fn opt_string(&self, field: &str) -> IngestResult<Option<String>> {
        self.optional(field, |raw| Ok(raw.to_string()))
    }

    pub fn uuid(&self, field: &str) -> IngestResult<Uuid> {
        self.required(field, parse_uuid)
    }

    pub fn f64(&self, field: &str) -> IngestResult<f64> {
        self.required(field, |raw| Ok(raw.parse::<f64>()?))
    }

    pub fn i32(&self, field: &str) -> IngestResult<i32> {
        self.required(field, |raw| Ok(raw.parse::<i32>()?))
    }

    pub fn opt_u32(&self, field: &str) -> IngestResult<Option<u32>> {
        self.optional(field, |raw| Ok(raw.parse::<u32>()?))
    }

    pub fn bool(&self, field: &str) -> IngestResult<bool> {
        self.required(field, parse_bool)
    }

    pub fn opt_bool(&self, field: &str) -> IngestResult<Option<bool>> {
        self.optional(field, parse_bool)
    }

    pub fn opt_timestamp(&self, field: &str) -> IngestResult<Option<DateTime<Utc>>> {
        self.optional(field, parse_timestamp)
    }

    pub fn opt_geo_point(&self, field: &str) -> IngestResult<Option<GeoPoint>> {
        self.optional(field, parse_geo_point)
    }

    pub fn opt_geo_path(&self, field: &str) -> IngestResult<Option<GeoPath>> {
        self.optional(field, parse_geo_path)
    }

    /// Physical quantity through the unit table, narrowed to the requested unit.
    pub fn quantity<Q>(&self, field: &str) -> IngestResult<Q>
    where
        Q: TryFrom<Quantity, Error = KindMismatch>,
    {
        self.required(field, |raw| {
            let quantity = normalize(field, raw)?;
            Q::try_from(quantity).map_err(|mismatch| {
                CoercionCause::Unit(UnitMappingError::KindMismatch {
                    field: field.to_string(),
                    expected: mismatch.expected,
                    found: mismatch.found,
                })
            })
        })
    }
}

pub fn parse_uuid(raw: &str) -> Result<Uuid, CoercionCause> {
    Ok(Uuid::parse_str(raw)?)
}

/// `true/false`, `1/0`, `yes/no`, case-insensitive.
pub fn parse_bool(raw: &str) -> Result<bool, CoercionCause> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(CoercionCause::Boolean(raw.to_string())),
    }
}

/// RFC 3339 (an optional trailing `[Zone/Id]` is ignored) or
/// `YYYY-MM-DD HH:MM:SS`, read as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, CoercionCause> {
    let trimmed = match raw.find('[') {
        Some(bracket) if raw.ends_with(']') => &raw[..bracket],
        _ => raw,
    };
    match DateTime::parse_from_rfc3339(trimmed) {
        Ok(parsed) => Ok(parsed.with_timezone(&Utc)),
        Err(_) => Ok(NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")?.and_utc()),
    }
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum GeoJson {
    Point { coordinates: Vec<f64> },
    LineString { coordinates: Vec<Vec<f64>> },
}

fn geo_coordinate(values: &[f64]) -> Result<GeoPoint, CoercionCause> {
    match values {
        [x, y, ..] => Ok(GeoPoint { x: *x, y: *y }),
        _ => Err(CoercionCause::GeoJson(format!(
            "coordinate needs at least two values, got {}",
            values.len()
        ))),
    }
}

fn parse_geo_json(raw: &str) -> Result<GeoJson, CoercionCause> {
    serde_json::from_str(raw).map_err(|err| CoercionCause::GeoJson(err.to_string()))
}

/// GeoJSON `Point`.
pub fn parse_geo_point(raw: &str) -> Result<GeoPoint, CoercionCause> {
    match parse_geo_json(raw)? {
        GeoJson::Point { coordinates } => geo_coordinate(&coordinates),
        GeoJson::LineString { .. } => {
            Err(CoercionCause::GeoJson("expected Point, got LineString".into()))
        }
    }
}

/// GeoJSON `LineString`.
pub fn parse_geo_path(raw: &str) -> Result<GeoPath, CoercionCause> {
    match parse_geo_json(raw)? {
        GeoJson::LineString { coordinates } => Ok(GeoPath {
            points: coordinates
                .iter()
                .map(|c| geo_coordinate(c))
                .collect::<Result<_, _>>()?,
        }),
        GeoJson::Point { .. } => {
            Err(CoercionCause::GeoJson("expected LineString, got Point".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{Kilovolts, Kilowatts};
    use chrono::{Datelike, Timelike};

    fn spec() -> FieldSetSpec {
        FieldSetSpec::builder(EntityKind::Node, &["uuid", "id"])
            .alternative(&["voltLvl", "vRated"])
            .alternative(&["vRated"])
            .optional(&["operatesFrom"])
            .optional(&["geoPosition"])
            .build()
    }

    #[test]
    fn test_variants_are_sorted_most_specific_first() {
        let spec = spec();
        let sizes: Vec<usize> = spec.variants().iter().map(FieldSet::len).collect();
        let mut sorted = sizes.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(sizes, sorted);
        assert_eq!(spec.variants().len(), 8);
        assert_eq!(
            spec.variants()[0].names(),
            &["uuid", "id", "voltLvl", "vRated", "operatesFrom", "geoPosition"]
        );
        assert_eq!(spec.variants()[7].names(), &["uuid", "id", "vRated"]);
    }

    #[test]
    fn test_selection_prefers_largest_covered_variant() {
        let spec = spec();
        let record = RawRecord::new(
            EntityKind::Node,
            [
                ("uuid", "x"),
                ("id", "n"),
                ("volt_lvl", "mv"),
                ("v_rated", "20"),
                ("operates_from", ""),
                ("unrelated", "?"),
            ],
        );
        let values = spec.select(&record).unwrap();
        assert!(values.has("voltLvl"));
        assert!(values.has("operatesFrom"));
        assert!(!values.has("geoPosition"));
        assert_eq!(values.raw("unrelated"), None);
        assert_eq!(values.opt_timestamp("operatesFrom").unwrap(), None);
    }

    #[test]
    fn test_selection_falls_back_to_alternative() {
        let spec = spec();
        let record = RawRecord::new(EntityKind::Node, [("uuid", "x"), ("id", "n"), ("vrated", "1")]);
        let values = spec.select(&record).unwrap();
        assert_eq!(values.variant().names(), &["uuid", "id", "vRated"]);
    }

    #[test]
    fn test_no_matching_variant_lists_all_attempts() {
        let spec = spec();
        let record = RawRecord::new(EntityKind::Node, [("uuid", "x")]);
        match spec.select(&record) {
            Err(IngestError::NoMatchingFieldSet {
                kind,
                present,
                attempted,
            }) => {
                assert_eq!(kind, EntityKind::Node);
                assert_eq!(present, vec!["uuid".to_string()]);
                assert_eq!(attempted.len(), spec.variants().len());
            }
            other => panic!("expected NoMatchingFieldSet, got {other:?}"),
        }
    }

    #[test]
    fn test_typed_accessors() {
        let spec = FieldSetSpec::builder(EntityKind::Node, &["uuid", "p", "vRated", "slack", "count"])
            .build();
        let record = RawRecord::new(
            EntityKind::Node,
            [
                ("uuid", "4ca90220-74c2-4369-9afa-a18bf068840d"),
                ("p", "3.5"),
                ("v_rated", "0.4"),
                ("slack", "Yes"),
                ("count", "x"),
            ],
        );
        let values = spec.select(&record).unwrap();
        assert_eq!(
            values.uuid("uuid").unwrap().to_string(),
            "4ca90220-74c2-4369-9afa-a18bf068840d"
        );
        assert_eq!(values.quantity::<Kilowatts>("p").unwrap(), Kilowatts(3.5));
        assert_eq!(values.quantity::<Kilovolts>("vRated").unwrap(), Kilovolts(0.4));
        assert!(values.bool("slack").unwrap());
        match values.i32("count") {
            Err(IngestError::FieldCoercion { field, cause }) => {
                assert_eq!(field, "count");
                assert!(matches!(cause, CoercionCause::Integer(_)));
            }
            other => panic!("expected coercion failure, got {other:?}"),
        }
        match values.quantity::<Kilowatts>("vRated") {
            Err(IngestError::FieldCoercion {
                cause: CoercionCause::Unit(UnitMappingError::KindMismatch { .. }),
                ..
            }) => {}
            other => panic!("expected kind mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_timestamp_formats() {
        let zoned = parse_timestamp("2020-03-24T15:11:31Z[UTC]").unwrap();
        assert_eq!((zoned.year(), zoned.hour()), (2020, 15));
        let offset = parse_timestamp("2020-03-24T15:11:31+01:00").unwrap();
        assert_eq!(offset.hour(), 14);
        let plain = parse_timestamp("2020-03-24 15:11:31").unwrap();
        assert_eq!(plain, zoned);
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(CoercionCause::Timestamp(_))
        ));
    }

    #[test]
    fn test_geo_json() {
        let point = parse_geo_point(r#"{"type":"Point","coordinates":[7.41,51.49]}"#).unwrap();
        assert_eq!(point, GeoPoint { x: 7.41, y: 51.49 });
        let path = parse_geo_path(
            r#"{"type":"LineString","coordinates":[[7.41,51.49,0.0],[7.42,51.50]]}"#,
        )
        .unwrap();
        assert_eq!(path.points.len(), 2);
        assert!(parse_geo_point(r#"{"type":"LineString","coordinates":[]}"#).is_err());
        assert!(parse_geo_point(r#"{"type":"Point","coordinates":[7.41]}"#).is_err());
        assert!(parse_geo_path("not json").is_err());
    }

    #[test]
    fn test_bool_spellings() {
        assert_eq!(parse_bool("TRUE").unwrap(), true);
        assert_eq!(parse_bool("0").unwrap(), false);
        assert!(parse_bool("maybe").is_err());
    }
}
