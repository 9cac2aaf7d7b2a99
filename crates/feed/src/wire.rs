use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

use callwatch_recon::model::FEED_TIME_ZONE;
use callwatch_recon::{ActiveCall, Category};

use crate::client::FeedError;

/// Layout of `callReceived`, e.g. `3/23/2022 11:22:39 PM`.
pub const FEED_TIME_LAYOUT: &str = "%m/%d/%Y %I:%M:%S %p";

/// One element of the feed's JSON array. Missing or null fields are empty.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FeedRecord {
    #[serde(default, deserialize_with = "nullable")]
    id: String,
    #[serde(default)]
    call_received: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    location: String,
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    kind: String,
    #[serde(default, deserialize_with = "nullable")]
    current_status: String,
    #[serde(default, deserialize_with = "nullable")]
    area: String,
    #[serde(default, deserialize_with = "nullable")]
    priority: String,
    #[serde(default, deserialize_with = "nullable")]
    call_received_formatted: String,
}

fn nullable<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(de)?.unwrap_or_default())
}

impl FeedRecord {
    pub(crate) fn into_active(self, category: Category) -> Result<ActiveCall, FeedError> {
        let received = parse_received(self.call_received.as_deref())
            .map_err(|e| FeedError::Parse(format!("call {}: {}", self.id, e)))?;
        Ok(ActiveCall {
            id: self.id,
            category,
            location: self.location,
            reason: self.kind,
            status: self.current_status,
            received,
            area: self.area,
            priority: self.priority,
            received_display: self.call_received_formatted,
        })
    }
}

/// Parse a feed timestamp in the feed's zone.
///
/// A missing or `null` value is the zero timestamp (Unix epoch). A local
/// time that falls in a daylight-saving gap is moved forward by an hour.
pub fn parse_received(raw: Option<&str>) -> Result<DateTime<FixedOffset>, String> {
    let Some(raw) = raw.filter(|s| *s != "null") else {
        return Ok(DateTime::<Utc>::default().fixed_offset());
    };

    let naive = NaiveDateTime::parse_from_str(raw.trim(), FEED_TIME_LAYOUT)
        .map_err(|e| format!("invalid callReceived {:?}: {}", raw, e))?;

    FEED_TIME_ZONE
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            FEED_TIME_ZONE
                .from_local_datetime(&(naive + Duration::hours(1)))
                .earliest()
        })
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| format!("callReceived {:?} does not exist in {}", raw, FEED_TIME_ZONE))
}

/// Decode a response body into active calls for `category`.
pub(crate) fn decode(body: &str, category: Category) -> Result<Vec<ActiveCall>, FeedError> {
    let trimmed = body.trim_start_matches('\u{feff}');
    let records: Vec<FeedRecord> = serde_json::from_str(trimmed).map_err(|e| {
        FeedError::Parse(format!(
            "{} (body: {})",
            e,
            trimmed.chars().take(200).collect::<String>(),
        ))
    })?;
    records
        .into_iter()
        .map(|record| record.into_active(category))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_evening_edt() {
        let dt = parse_received(Some("3/23/2022 11:22:39 PM")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2022-03-23T23:22:39-04:00");
        assert_eq!(
            dt.with_timezone(&Utc).to_rfc3339(),
            "2022-03-24T03:22:39+00:00"
        );
    }

    #[test]
    fn parses_noon_and_winter_offset() {
        let dt = parse_received(Some("3/27/2022 12:30:25 PM")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2022-03-27T12:30:25-04:00");

        let dt = parse_received(Some("1/2/2022 3:04:05 AM")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2022-01-02T03:04:05-05:00");
    }

    #[test]
    fn null_is_epoch() {
        let epoch = DateTime::<Utc>::default();
        assert_eq!(parse_received(None).unwrap(), epoch);
        assert_eq!(parse_received(Some("null")).unwrap(), epoch);
    }

    #[test]
    fn garbage_is_an_error() {
        let err = parse_received(Some("yesterday")).unwrap_err();
        assert!(err.contains("invalid callReceived"), "{err}");
    }

    #[test]
    fn spring_forward_gap_moves_ahead() {
        let dt = parse_received(Some("3/13/2022 2:30:00 AM")).unwrap();
        assert_eq!(dt.to_rfc3339(), "2022-03-13T03:30:00-04:00");
    }

    #[test]
    fn decode_maps_fields() {
        let body = r#"[{
            "id": "1234",
            "callReceived": "3/27/2022 12:30:25 PM",
            "location": "123XX DIFFERENT ST",
            "type": "EMS CALL",
            "currentStatus": "Dispatched",
            "area": "F20",
            "priority": "3",
            "callReceivedFormatted": "3/27/2022 12:30 PM"
        }]"#;
        let calls = decode(body, Category::Fire).unwrap();
        assert_eq!(calls.len(), 1);
        let call = &calls[0];
        assert_eq!(call.id, "1234");
        assert_eq!(call.category, Category::Fire);
        assert_eq!(call.reason, "EMS CALL");
        assert_eq!(call.status, "Dispatched");
        assert_eq!(call.area, "F20");
        assert_eq!(call.received_display, "3/27/2022 12:30 PM");
    }

    #[test]
    fn decode_tolerates_missing_and_null_fields() {
        let body = "\u{feff}[{\"id\": \"9\", \"callReceived\": null, \"area\": null}]";
        let calls = decode(body, Category::Police).unwrap();
        assert_eq!(calls[0].id, "9");
        assert_eq!(calls[0].area, "");
        assert_eq!(calls[0].location, "");
        assert_eq!(calls[0].received, DateTime::<Utc>::default());
    }

    #[test]
    fn decode_rejects_non_array() {
        let err = decode("{\"message\": \"nope\"}", Category::Police).unwrap_err();
        assert!(matches!(err, FeedError::Parse(_)), "{err:?}");
    }

    #[test]
    fn decode_bad_timestamp_names_the_call() {
        let err = decode(r#"[{"id": "77", "callReceived": "soon"}]"#, Category::Police).unwrap_err();
        let FeedError::Parse(msg) = err else {
            panic!("expected parse error");
        };
        assert!(msg.starts_with("call 77:"), "{msg}");
    }
}
