//! Call query filters and their local validation.

use chrono::{DateTime, Utc};

use crate::error::EnreachError;

/// Widest time window the calls endpoints accept, in whole days.
pub const MAX_RANGE_DAYS: i64 = 31;

const WIRE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const RESERVED: [&str; 5] = [
    "CallId",
    "StartTime",
    "EndTime",
    "ModifiedAfter",
    "ModifiedBefore",
];

/// Filter for `get_usercalls` and `get_inbound_queuecalls`.
///
/// At least one of a call id, a `StartTime`/`EndTime` pair or a
/// `ModifiedAfter`/`ModifiedBefore` pair is required. Other documented
/// filter parameters pass through `extra` verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallFilter {
    pub call_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub modified_after: Option<DateTime<Utc>>,
    pub modified_before: Option<DateTime<Utc>>,
    pub extra: Vec<(String, String)>,
}

impl CallFilter {
    pub fn by_call_id(call_id: impl Into<String>) -> Self {
        Self {
            call_id: Some(call_id.into()),
            ..Self::default()
        }
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start_time: Some(start),
            end_time: Some(end),
            ..Self::default()
        }
    }

    pub fn modified_between(after: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        Self {
            modified_after: Some(after),
            modified_before: Some(before),
            ..Self::default()
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }

    /// Validate and render as query parameters.
    pub fn to_query(&self) -> Result<Vec<(String, String)>, EnreachError> {
        let times = pair("StartTime", "EndTime", self.start_time, self.end_time)?;
        let modified = pair(
            "ModifiedAfter",
            "ModifiedBefore",
            self.modified_after,
            self.modified_before,
        )?;
        let call_id = self
            .call_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty());

        if times.is_none() && modified.is_none() && call_id.is_none() {
            return Err(EnreachError::parameter(
                "a CallId, a StartTime/EndTime pair or a ModifiedAfter/ModifiedBefore pair is required",
            ));
        }
        if let Some((name, _)) = self.extra.iter().find(|(k, _)| RESERVED.contains(&k.as_str())) {
            return Err(EnreachError::parameter(format!(
                "{name} must be set through its dedicated filter field"
            )));
        }

        let mut query = Vec::new();
        if let Some((start, end)) = times {
            query.push(("StartTime".to_string(), format_time(start)));
            query.push(("EndTime".to_string(), format_time(end)));
        }
        if let Some((after, before)) = modified {
            query.push(("ModifiedAfter".to_string(), format_time(after)));
            query.push(("ModifiedBefore".to_string(), format_time(before)));
        }
        if let Some(id) = call_id {
            query.push(("CallId".to_string(), id.to_string()));
        }
        query.extend(self.extra.iter().cloned());
        Ok(query)
    }
}

fn pair(
    first: &str,
    second: &str,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>, EnreachError> {
    match (from, to) {
        (None, None) => Ok(None),
        (Some(from), Some(to)) => {
            if to < from {
                return Err(EnreachError::parameter(format!(
                    "{second} must not be earlier than {first}"
                )));
            }
            if (to - from).num_days() > MAX_RANGE_DAYS {
                return Err(EnreachError::parameter(format!(
                    "time range cannot be more than {MAX_RANGE_DAYS} days"
                )));
            }
            Ok(Some((from, to)))
        }
        _ => Err(EnreachError::parameter(format!(
            "{first} and {second} must be given together"
        ))),
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format(WIRE_TIME_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::error::ErrorKind;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn empty_filter_is_rejected() {
        let err = CallFilter::default().to_query().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
    }

    #[test]
    fn time_range_renders_in_wire_format() {
        let query = CallFilter::between(at(1, 6), at(2, 6)).to_query().unwrap();
        assert_eq!(
            query,
            vec![
                ("StartTime".to_string(), "2024-01-01 06:00:00".to_string()),
                ("EndTime".to_string(), "2024-01-02 06:00:00".to_string()),
            ]
        );
    }

    #[test]
    fn half_a_pair_is_rejected() {
        let filter = CallFilter {
            start_time: Some(at(1, 0)),
            ..CallFilter::default()
        };
        assert_eq!(filter.to_query().unwrap_err().kind(), ErrorKind::Parameter);

        let filter = CallFilter {
            call_id: Some("abc".to_string()),
            modified_before: Some(at(1, 0)),
            ..CallFilter::default()
        };
        assert_eq!(filter.to_query().unwrap_err().kind(), ErrorKind::Parameter);
    }

    #[test]
    fn range_over_a_month_is_rejected() {
        let start = at(1, 0);
        assert!(CallFilter::between(start, start + Duration::days(31) + Duration::hours(23))
            .to_query()
            .is_ok());
        let err = CallFilter::between(start, start + Duration::days(32))
            .to_query()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
    }

    #[test]
    fn reversed_range_is_rejected() {
        let err = CallFilter::between(at(2, 0), at(1, 0)).to_query().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
    }

    #[test]
    fn call_id_alone_is_enough() {
        let query = CallFilter::by_call_id("abc")
            .with_param("Direction", "Inbound")
            .to_query()
            .unwrap();
        assert_eq!(
            query,
            vec![
                ("CallId".to_string(), "abc".to_string()),
                ("Direction".to_string(), "Inbound".to_string()),
            ]
        );
    }

    #[test]
    fn reserved_names_cannot_be_smuggled_through_extra() {
        let err = CallFilter::by_call_id("abc")
            .with_param("StartTime", "2024-01-01 00:00:00")
            .to_query()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parameter);
    }
}
