//! Preapproved window model, window validation, and visitor codes.
//!
//! All window math takes an explicit timezone and an explicit `now` so the
//! rules are testable with frozen clocks. Nothing in this module reads the
//! ambient system time.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::VisitError;

/// Grace margin for backdated windows: instants up to this many minutes in
/// the past are tolerated to absorb client clock skew.
pub const PAST_GRACE_MINUTES: i64 = 5;

/// The admissible arrival/departure range for a preapproved visiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PreapprovedWindow {
    pub id: Uuid,
    pub visiting_id: Uuid,
    pub in_time: DateTime<Utc>,
    pub out_time: DateTime<Utc>,
    /// Recurring pass rather than a one-off window.
    pub is_frequent: bool,
    /// Shareable gate-lookup code. One-off windows always carry one;
    /// frequent passes are matched by resident/destination instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visitor_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PreapprovedWindow {
    /// Whether the window still admits an arrival at `now`.
    pub fn admits(&self, now: DateTime<Utc>) -> bool {
        self.out_time >= now
    }
}

/// Caller-supplied window, in the visit's local time.
#[derive(Debug, Clone, Copy)]
pub struct WindowSpec {
    pub in_time_local: NaiveDateTime,
    pub out_time_local: NaiveDateTime,
    /// When set, the out time becomes `in + duration` and no end-of-day
    /// normalization applies.
    pub duration_hours: Option<i64>,
    pub is_frequent: bool,
}

/// Resolves a local-time window spec into UTC instants and validates it.
///
/// Rules:
/// - with `duration_hours`, `out = in + duration`;
/// - otherwise the caller-given out instant is used, normalized to
///   end-of-day in `tz` for non-frequent windows;
/// - `in <= out`, and neither instant may precede `now` by more than the
///   grace margin.
///
/// This is the single validation gate for both create and update.
pub fn resolve_window(
    spec: WindowSpec,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), VisitError> {
    let in_time = local_to_utc(spec.in_time_local, tz)?;

    let out_time = match spec.duration_hours {
        Some(hours) => {
            if hours <= 0 {
                return Err(VisitError::InvalidWindow(
                    "approval duration must be positive".into(),
                ));
            }
            in_time + Duration::hours(hours)
        }
        None if spec.is_frequent => local_to_utc(spec.out_time_local, tz)?,
        None => {
            let end_of_day = spec
                .out_time_local
                .date()
                .and_hms_opt(23, 59, 59)
                .expect("23:59:59 is a valid time of day");
            local_to_utc(end_of_day, tz)?
        }
    };

    if in_time > out_time {
        return Err(VisitError::InvalidWindow(
            "in time must not be after out time".into(),
        ));
    }

    let floor = now - Duration::minutes(PAST_GRACE_MINUTES);
    if in_time < floor || out_time < floor {
        return Err(VisitError::InvalidWindow(
            "window must not lie in the past".into(),
        ));
    }

    Ok((in_time, out_time))
}

fn local_to_utc(local: NaiveDateTime, tz: Tz) -> Result<DateTime<Utc>, VisitError> {
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| {
            VisitError::InvalidWindow(format!("{local} does not exist in timezone {tz}"))
        })
}

/// Generate a random visitor code in XXX-XXX-XXX format.
pub fn generate_visitor_code() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let chars: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789"; // Avoiding confusing chars: 0, O, I, 1

    let mut generate_segment = || -> String {
        (0..3)
            .map(|_| {
                let idx = rng.gen_range(0..chars.len());
                chars[idx] as char
            })
            .collect()
    };

    format!(
        "{}-{}-{}",
        generate_segment(),
        generate_segment(),
        generate_segment()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const TZ: Tz = chrono_tz::Asia::Kolkata;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn utc_of(local_dt: NaiveDateTime) -> DateTime<Utc> {
        TZ.from_local_datetime(&local_dt)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_window_with_duration() {
        let in_local = local(2024, 1, 1, 10, 0);
        let now = utc_of(in_local) - Duration::hours(1);
        let (in_time, out_time) = resolve_window(
            WindowSpec {
                in_time_local: in_local,
                out_time_local: in_local,
                duration_hours: Some(4),
                is_frequent: false,
            },
            TZ,
            now,
        )
        .unwrap();
        assert_eq!(out_time - in_time, Duration::hours(4));
    }

    #[test]
    fn test_one_off_window_normalizes_to_end_of_day() {
        let in_local = local(2024, 1, 1, 10, 0);
        let out_local = local(2024, 1, 1, 18, 0);
        let now = utc_of(in_local) - Duration::hours(1);
        let (_, out_time) = resolve_window(
            WindowSpec {
                in_time_local: in_local,
                out_time_local: out_local,
                duration_hours: None,
                is_frequent: false,
            },
            TZ,
            now,
        )
        .unwrap();
        assert_eq!(out_time, utc_of(local(2024, 1, 1, 23, 59) + Duration::seconds(59)));
    }

    #[test]
    fn test_frequent_window_keeps_exact_out_time() {
        let in_local = local(2024, 1, 1, 10, 0);
        let out_local = local(2024, 1, 1, 18, 0);
        let now = utc_of(in_local) - Duration::hours(1);
        let (_, out_time) = resolve_window(
            WindowSpec {
                in_time_local: in_local,
                out_time_local: out_local,
                duration_hours: None,
                is_frequent: true,
            },
            TZ,
            now,
        )
        .unwrap();
        assert_eq!(out_time, utc_of(out_local));
    }

    #[test]
    fn test_inverted_window_rejected() {
        let in_local = local(2024, 1, 2, 10, 0);
        let out_local = local(2024, 1, 1, 18, 0);
        let now = utc_of(local(2024, 1, 1, 9, 0));
        let err = resolve_window(
            WindowSpec {
                in_time_local: in_local,
                out_time_local: out_local,
                duration_hours: None,
                is_frequent: true,
            },
            TZ,
            now,
        )
        .unwrap_err();
        assert!(matches!(err, VisitError::InvalidWindow(_)));
    }

    #[test]
    fn test_backdated_window_rejected_past_grace() {
        let in_local = local(2024, 1, 1, 10, 0);
        // now is 6 minutes after the in time: outside the 5 minute grace
        let now = utc_of(in_local) + Duration::minutes(6);
        let err = resolve_window(
            WindowSpec {
                in_time_local: in_local,
                out_time_local: in_local,
                duration_hours: Some(2),
                is_frequent: false,
            },
            TZ,
            now,
        )
        .unwrap_err();
        assert!(matches!(err, VisitError::InvalidWindow(_)));
    }

    #[test]
    fn test_slightly_backdated_window_tolerated() {
        let in_local = local(2024, 1, 1, 10, 0);
        // now is 4 minutes after the in time: inside the grace margin
        let now = utc_of(in_local) + Duration::minutes(4);
        assert!(resolve_window(
            WindowSpec {
                in_time_local: in_local,
                out_time_local: in_local,
                duration_hours: Some(2),
                is_frequent: false,
            },
            TZ,
            now,
        )
        .is_ok());
    }

    #[test]
    fn test_zero_duration_rejected() {
        let in_local = local(2024, 1, 1, 10, 0);
        let now = utc_of(in_local);
        let err = resolve_window(
            WindowSpec {
                in_time_local: in_local,
                out_time_local: in_local,
                duration_hours: Some(0),
                is_frequent: false,
            },
            TZ,
            now,
        )
        .unwrap_err();
        assert!(matches!(err, VisitError::InvalidWindow(_)));
    }

    #[test]
    fn test_window_admits() {
        let now = Utc::now();
        let window = PreapprovedWindow {
            id: Uuid::new_v4(),
            visiting_id: Uuid::new_v4(),
            in_time: now - Duration::hours(1),
            out_time: now + Duration::hours(1),
            is_frequent: false,
            visitor_code: Some(generate_visitor_code()),
            created_at: now,
            updated_at: now,
        };
        assert!(window.admits(now));
        assert!(!window.admits(now + Duration::hours(2)));
    }

    #[test]
    fn test_generate_visitor_code_format() {
        let code = generate_visitor_code();
        assert_eq!(code.len(), 11); // XXX-XXX-XXX
        assert_eq!(&code[3..4], "-");
        assert_eq!(&code[7..8], "-");

        for (i, c) in code.chars().enumerate() {
            if i == 3 || i == 7 {
                assert_eq!(c, '-');
            } else {
                assert!(c.is_ascii_uppercase() || c.is_ascii_digit());
                assert!(c != 'O' && c != 'I' && c != '0' && c != '1');
            }
        }
    }

    #[test]
    fn test_generate_visitor_code_uniqueness() {
        let codes: Vec<String> = (0..100).map(|_| generate_visitor_code()).collect();
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert!(unique.len() >= 99);
    }
}
