//! GeoJSON feed decoding.
//!
//! The upstream returns a feature collection; each feature carries
//! `properties.{time,mag,place,url}` and `geometry.coordinates = [lon, lat, depth]`.
//! Anything missing decodes to an unknown value rather than an error.

use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::domain::EventRecord;

#[derive(Debug, Default, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct Feature {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    properties: Option<Properties>,
    #[serde(default, deserialize_with = "lenient")]
    geometry: Option<Geometry>,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    /// Milliseconds since the Unix epoch.
    #[serde(default, deserialize_with = "lenient")]
    time: Option<i64>,
    #[serde(default, deserialize_with = "lenient")]
    mag: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    place: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Geometry {
    #[serde(default, deserialize_with = "lenient")]
    coordinates: Option<Vec<Value>>,
}

/// A value of the wrong type decodes to `None` instead of failing its parent.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// Decode a feature collection body into event records, in feed order.
///
/// Only a body that is not a JSON object with a `features` array is an error.
/// Entries that are not objects are skipped.
pub fn parse_feed(body: &str) -> Result<Vec<EventRecord>, serde_json::Error> {
    let collection: FeatureCollection = serde_json::from_str(body)?;
    let total = collection.features.len();
    let records: Vec<EventRecord> = collection
        .features
        .into_iter()
        .filter_map(|value| Feature::deserialize(value).ok())
        .map(into_record)
        .collect();

    if records.len() < total {
        tracing::warn!(
            skipped = total - records.len(),
            "Skipped feed entries that are not features"
        );
    }
    Ok(records)
}

fn into_record(feature: Feature) -> EventRecord {
    let props = feature.properties.unwrap_or_default();
    let coords = feature
        .geometry
        .and_then(|g| g.coordinates)
        .unwrap_or_default();
    let coord = |i: usize| coords.get(i).and_then(Value::as_f64);

    EventRecord {
        event_id: feature.id.unwrap_or_default(),
        time: props.time.and_then(DateTime::<Utc>::from_timestamp_millis),
        magnitude: props.mag,
        place: props.place,
        longitude: coord(0),
        latitude: coord(1),
        depth_km: coord(2),
        url: props.url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn decodes_a_complete_feature() {
        let body = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "id": "us7000abcd",
                "properties": {
                    "time": 1714564800123,
                    "mag": 4.6,
                    "place": "10 km SSW of Somewhere",
                    "url": "https://earthquake.usgs.gov/earthquakes/eventpage/us7000abcd"
                },
                "geometry": {"type": "Point", "coordinates": [-117.5, 35.25, 8.1]}
            }]
        }"#;

        let records = parse_feed(body).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.event_id, "us7000abcd");
        assert_eq!(
            r.time,
            Some(Utc.timestamp_millis_opt(1_714_564_800_123).unwrap())
        );
        assert_eq!(r.magnitude, Some(4.6));
        assert_eq!(r.longitude, Some(-117.5));
        assert_eq!(r.latitude, Some(35.25));
        assert_eq!(r.depth_km, Some(8.1));
        assert_eq!(r.place.as_deref(), Some("10 km SSW of Somewhere"));
    }

    #[test]
    fn missing_fields_become_unknown() {
        let body = r#"{"features": [
            {"id": "a", "properties": {"mag": null}, "geometry": null},
            {"properties": null, "geometry": {"coordinates": [1.5]}},
            {}
        ]}"#;

        let records = parse_feed(body).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].event_id, "a");
        assert_eq!(records[0].time, None);
        assert_eq!(records[0].magnitude, None);
        assert_eq!(records[0].longitude, None);
        assert_eq!(records[1].event_id, "");
        assert_eq!(records[1].longitude, Some(1.5));
        assert_eq!(records[1].latitude, None);
        assert_eq!(records[2].depth_km, None);
    }

    #[test]
    fn wrongly_typed_fields_do_not_reject_the_batch() {
        let body = r#"{"features": [
            {"id": "bad", "properties": {"time": 1.5e12, "mag": "4.2", "place": 7},
             "geometry": {"coordinates": ["x", 35.0, null]}},
            {"id": 42, "properties": "oops", "geometry": [1, 2]},
            "not a feature",
            {"id": "good", "properties": {"time": 1700000000000, "mag": 3.3}}
        ]}"#;

        let records = parse_feed(body).unwrap();
        assert_eq!(records.len(), 3);

        let bad = &records[0];
        assert_eq!(bad.event_id, "bad");
        assert_eq!(bad.time, None);
        assert_eq!(bad.magnitude, None);
        assert_eq!(bad.place, None);
        assert_eq!(bad.longitude, None);
        assert_eq!(bad.latitude, Some(35.0));
        assert_eq!(bad.depth_km, None);

        assert_eq!(records[1].event_id, "");
        assert_eq!(records[1].magnitude, None);

        assert_eq!(records[2].event_id, "good");
        assert_eq!(records[2].magnitude, Some(3.3));
    }

    #[test]
    fn features_must_be_an_array() {
        assert!(parse_feed(r#"{"features": {"id": "x"}}"#).is_err());
    }

    #[test]
    fn empty_collection_is_empty() {
        assert!(parse_feed(r#"{"type":"FeatureCollection","features":[]}"#)
            .unwrap()
            .is_empty());
        assert!(parse_feed("{}").unwrap().is_empty());
    }

    #[test]
    fn non_json_is_an_error() {
        assert!(parse_feed("<html>maintenance</html>").is_err());
    }
}
