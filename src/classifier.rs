use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::Measurement;

pub const HEAVY_CONGESTION_PCT: f64 = 40.0;
pub const MODERATE_CONGESTION_PCT: f64 = 20.0;
pub const LIGHT_CONGESTION_PCT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficLevel {
    Clear,
    Light,
    Moderate,
    Heavy,
    Unavailable,
}

/// severity used when the status is shown to a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Alert {
    Success,
    Info,
    Warning,
    Error,
}

impl TrafficLevel {
    pub fn alert(&self) -> Alert {
        match self {
            TrafficLevel::Clear => Alert::Success,
            TrafficLevel::Light => Alert::Info,
            TrafficLevel::Moderate | TrafficLevel::Unavailable => Alert::Warning,
            TrafficLevel::Heavy => Alert::Error,
        }
    }
}

/// classification of the latest measurement of a series. never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficStatus {
    pub level: TrafficLevel,
    pub message: String,
    pub congestion_pct: f64,
}

/// relative speed deficit against free flow, in percent. a free-flow speed of
/// `0` means the baseline is unknown and yields `0`.
pub fn congestion_pct(measurement: &Measurement) -> f64 {
    let free_flow = measurement.free_flow_speed;
    if free_flow > 0.0 {
        ((free_flow - measurement.current_speed) / free_flow) * 100.0
    } else {
        0.0
    }
}

/// thresholds are inclusive lower bounds, checked from heaviest down.
pub fn level_for(congestion_pct: f64) -> TrafficLevel {
    if congestion_pct >= HEAVY_CONGESTION_PCT {
        TrafficLevel::Heavy
    } else if congestion_pct >= MODERATE_CONGESTION_PCT {
        TrafficLevel::Moderate
    } else if congestion_pct >= LIGHT_CONGESTION_PCT {
        TrafficLevel::Light
    } else {
        TrafficLevel::Clear
    }
}

fn message_for(level: TrafficLevel, pct: f64, current: f64, free_flow: f64) -> String {
    match level {
        TrafficLevel::Heavy => format!(
            "Heavy Traffic Alert! {pct:.1}% slower than normal (Current: {current:.1} km/h vs Free Flow: {free_flow:.1} km/h)"
        ),
        TrafficLevel::Moderate => format!(
            "Moderate Traffic: {pct:.1}% slower than usual (Current: {current:.1} km/h vs Normal: {free_flow:.1} km/h)"
        ),
        TrafficLevel::Light => format!(
            "Light Traffic: {pct:.1}% slower than average (Current: {current:.1} km/h vs Expected: {free_flow:.1} km/h)"
        ),
        TrafficLevel::Clear => format!(
            "Clear Traffic: Flowing normally at {current:.1} km/h (Free Flow Speed: {free_flow:.1} km/h)"
        ),
        TrafficLevel::Unavailable => String::from("No data available"),
    }
}

/// classifies the last measurement of `series`; earlier ones are ignored.
pub fn classify(series: &[Measurement]) -> TrafficStatus {
    let Some(latest) = series.last() else {
        return TrafficStatus {
            level: TrafficLevel::Unavailable,
            message: message_for(TrafficLevel::Unavailable, 0.0, 0.0, 0.0),
            congestion_pct: 0.0,
        };
    };
    let pct = congestion_pct(latest);
    let level = level_for(pct);
    TrafficStatus {
        level,
        message: message_for(level, pct, latest.current_speed, latest.free_flow_speed),
        congestion_pct: pct,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub timestamp: NaiveDateTime,
    /// free-flow minus current speed, km/h.
    pub speed_deficit: f64,
}

pub fn speed_deficit_trend(series: &[Measurement]) -> Vec<TrendPoint> {
    series
        .iter()
        .map(|m| TrendPoint {
            timestamp: m.timestamp,
            speed_deficit: m.free_flow_speed - m.current_speed,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SpeedTotals {
    pub current: f64,
    pub free_flow: f64,
}

impl SpeedTotals {
    /// share of the combined total that is actual speed, `None` for an empty total.
    pub fn current_share(&self) -> Option<f64> {
        let total = self.current + self.free_flow;
        if total > 0.0 {
            Some(self.current / total)
        } else {
            None
        }
    }
}

pub fn speed_totals(series: &[Measurement]) -> SpeedTotals {
    series.iter().fold(SpeedTotals::default(), |acc, m| SpeedTotals {
        current: acc.current + m.current_speed,
        free_flow: acc.free_flow + m.free_flow_speed,
    })
}
