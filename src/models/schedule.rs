use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serialize};

/// One opening window, `HH:MM` 24-hour clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub start_time: String,
    pub end_time: String,
}

impl TimeSlot {
    pub fn new(start: &str, end: &str) -> Self {
        Self {
            start_time: start.to_string(),
            end_time: end.to_string(),
        }
    }

    fn validate(&self, day: &str) -> Result<(), String> {
        let start = parse_hhmm(&self.start_time)
            .ok_or_else(|| format!("{day}: invalid startTime '{}'", self.start_time))?;
        let end = parse_hhmm(&self.end_time)
            .ok_or_else(|| format!("{day}: invalid endTime '{}'", self.end_time))?;
        if start >= end {
            return Err(format!("{day}: startTime must be before endTime"));
        }
        Ok(())
    }
}

fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

/// Weekly availability. A `None` day is closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySlots {
    #[serde(default, deserialize_with = "nullable_slot")]
    pub monday: Option<TimeSlot>,
    #[serde(default, deserialize_with = "nullable_slot")]
    pub tuesday: Option<TimeSlot>,
    #[serde(default, deserialize_with = "nullable_slot")]
    pub wednesday: Option<TimeSlot>,
    #[serde(default, deserialize_with = "nullable_slot")]
    pub thursday: Option<TimeSlot>,
    #[serde(default, deserialize_with = "nullable_slot")]
    pub friday: Option<TimeSlot>,
    #[serde(default, deserialize_with = "nullable_slot")]
    pub saturday: Option<TimeSlot>,
    #[serde(default, deserialize_with = "nullable_slot")]
    pub sunday: Option<TimeSlot>,
}

impl Default for WeeklySlots {
    /// Weekdays 09:00–18:00, Saturday 10:00–14:00, Sunday closed.
    fn default() -> Self {
        let weekday = || Some(TimeSlot::new("09:00", "18:00"));
        Self {
            monday: weekday(),
            tuesday: weekday(),
            wednesday: weekday(),
            thursday: weekday(),
            friday: weekday(),
            saturday: Some(TimeSlot::new("10:00", "14:00")),
            sunday: None,
        }
    }
}

impl WeeklySlots {
    pub fn days(&self) -> [(&'static str, Option<&TimeSlot>); 7] {
        [
            ("monday", self.monday.as_ref()),
            ("tuesday", self.tuesday.as_ref()),
            ("wednesday", self.wednesday.as_ref()),
            ("thursday", self.thursday.as_ref()),
            ("friday", self.friday.as_ref()),
            ("saturday", self.saturday.as_ref()),
            ("sunday", self.sunday.as_ref()),
        ]
    }

    /// Check every open day has a well-formed, non-empty window.
    pub fn validate(&self) -> Result<(), String> {
        for (day, slot) in self.days() {
            if let Some(slot) = slot {
                slot.validate(day)?;
            }
        }
        Ok(())
    }

    pub fn open_days(&self) -> usize {
        self.days().iter().filter(|(_, s)| s.is_some()).count()
    }
}

/// Accepts `null`, a full slot, or `{startTime: null, endTime: null}` (closed).
fn nullable_slot<'de, D>(deserializer: D) -> Result<Option<TimeSlot>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct RawSlot {
        start_time: Option<String>,
        end_time: Option<String>,
    }

    let raw: Option<RawSlot> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(RawSlot {
            start_time: None,
            end_time: None,
        }) => Ok(None),
        Some(RawSlot {
            start_time: Some(start_time),
            end_time: Some(end_time),
        }) => Ok(Some(TimeSlot {
            start_time,
            end_time,
        })),
        Some(_) => Err(serde::de::Error::custom(
            "startTime and endTime must both be set or both be null",
        )),
    }
}
