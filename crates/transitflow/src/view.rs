#![forbid(unsafe_code)]

//! Text rendering of [`TripModel`].

use transitflow_core::{CyclePhase, Trend, TripParameters, WhatIfField};
use transitflow_runtime::Frame;

use crate::app::TripModel;
use crate::command::HELP;

const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const MAX_CATALOG_SHOWN: usize = 8;

pub fn render(model: &TripModel, frame: &mut Frame) {
    frame.line("TransitFlow trip delay estimator");
    frame.rule('=');
    trip_section(model.params(), frame);
    frame.line(format!("Status: {}", status(model)));
    frame.rule('-');

    prediction_section(model, frame);
    routes_section(model, frame);
    if let Some(trend) = model.cycle().trend() {
        trend_section(trend, frame);
    }
    agencies_section(model, frame);
    history_section(model, frame);

    frame.rule('-');
    if let Some(notice) = model.notice() {
        frame.line(format!("? {notice}"));
    }
    if model.show_help() {
        for (usage, what) in HELP {
            frame.line(format!("  {usage:<22}{what}"));
        }
    } else {
        frame.line("Type 'help' for commands.");
    }
}

fn trip_section(p: &TripParameters, frame: &mut Frame) {
    frame.line(format!(
        "From: {:<30} To: {}",
        or_dash(&p.origin),
        or_dash(&p.destination)
    ));
    frame.line(format!(
        "Route: {}   Weather: {}   Event: {}   {} {:02}:00",
        p.route_id.as_deref().unwrap_or("-"),
        p.weather_condition,
        p.event_type,
        DAYS.get(usize::from(p.day_of_week)).copied().unwrap_or("?"),
        p.hour,
    ));
    frame.line(format!(
        "What-if: {:.1} C{}   {:.1} mm{}   {} people{}",
        p.temperature,
        pin(p, WhatIfField::Temperature),
        p.precipitation,
        pin(p, WhatIfField::Precipitation),
        p.event_attendance,
        pin(p, WhatIfField::EventAttendance),
    ));
}

fn pin(p: &TripParameters, field: WhatIfField) -> &'static str {
    if p.is_overridden(field) { "*" } else { "" }
}

fn or_dash(s: &str) -> &str {
    if s.trim().is_empty() { "-" } else { s }
}

fn status(model: &TripModel) -> String {
    if model.gate().has_pending() {
        return "waiting for input to settle".to_string();
    }
    let cycle = model.cycle();
    let trigger = cycle.trigger().map_or("", |t| t.as_str());
    match cycle.phase() {
        CyclePhase::Idle => "idle".to_string(),
        CyclePhase::Pending => format!("predicting (#{}, {trigger})", cycle.generation()),
        CyclePhase::Settled => format!("ready (#{})", cycle.generation()),
        CyclePhase::Stale => "superseded".to_string(),
        CyclePhase::Failed => format!("prediction failed (#{})", cycle.generation()),
    }
}

fn prediction_section(model: &TripModel, frame: &mut Frame) {
    let cycle = model.cycle();
    match cycle.result() {
        Some(result) => {
            frame.line(format!(
                "Arrival: {}   (+{:.1} min predicted, {} delay)",
                model.arrival(),
                result.predicted_extra_delay,
                result.severity
            ));
        }
        None => frame.line(format!("Arrival: {}", model.arrival())),
    }
    if let Some(traffic) = model.traffic() {
        if traffic.has_traffic {
            frame.line(format!(
                "Traffic: +{} min heavier than usual",
                traffic.delay_minutes
            ));
        } else {
            frame.line("Traffic: normal");
        }
    }
    if let Some(error) = cycle.visible_error() {
        frame.line(format!("Error: {error}"));
    }
}

fn routes_section(model: &TripModel, frame: &mut Frame) {
    let routes = model.routes();
    if routes.is_empty() {
        let catalog = model.catalog();
        if !catalog.is_empty() {
            let shown: Vec<&str> = catalog
                .iter()
                .take(MAX_CATALOG_SHOWN)
                .map(String::as_str)
                .collect();
            let more = catalog.len().saturating_sub(MAX_CATALOG_SHOWN);
            let suffix = if more > 0 { format!(" (+{more})") } else { String::new() };
            frame.line(format!("Catalog routes: {}{suffix}", shown.join(", ")));
        }
        return;
    }
    frame.blank();
    frame.line("Routes:");
    for (i, route) in routes.routes().iter().enumerate() {
        let marker = if i == routes.selected_index() { '>' } else { ' ' };
        let minutes = route
            .first_leg()
            .map_or(0, |leg| (leg.effective_seconds() as f64 / 60.0).round() as i64);
        let summary = if route.summary.is_empty() {
            "(unnamed)"
        } else {
            route.summary.as_str()
        };
        frame.line(format!(" {marker} [{}] {summary}  {minutes} min", i + 1));
    }
}

fn trend_section(trend: &Trend, frame: &mut Frame) {
    let points = trend.points();
    let max = points.iter().map(|p| p.delay).fold(0.0_f64, f64::max);
    let line: String = points
        .iter()
        .map(|p| {
            if max <= 0.0 {
                SPARK[0]
            } else {
                let level = ((p.delay.max(0.0) / max) * (SPARK.len() - 1) as f64).round();
                SPARK[(level as usize).min(SPARK.len() - 1)]
            }
        })
        .collect();
    frame.blank();
    frame.line(format!("Delay by hour: {line}"));
    if let Some(peak) = trend.peak() {
        frame.line(format!(
            "Worst hour: {:02}:00 (+{:.1} min)",
            peak.hour, peak.delay
        ));
    }
}

fn agencies_section(model: &TripModel, frame: &mut Frame) {
    let agencies = model.agencies();
    if agencies.is_empty() {
        return;
    }
    frame.blank();
    frame.line("Nearby operators:");
    for agency in agencies {
        let rating = agency
            .rating
            .map(|r| format!(" ({r:.1})"))
            .unwrap_or_default();
        match &agency.address {
            Some(address) => frame.line(format!("  {}{rating} - {address}", agency.name)),
            None => frame.line(format!("  {}{rating}", agency.name)),
        }
    }
}

fn history_section(model: &TripModel, frame: &mut Frame) {
    let history = model.history();
    if history.is_empty() {
        return;
    }
    frame.blank();
    frame.line("Recent searches:");
    for (i, entry) in history.iter().enumerate() {
        let p = &entry.params;
        frame.line(format!(
            "  [{}] {} -> {}  {}, {}, {:02}:00  {}",
            i + 1,
            p.origin,
            p.destination,
            p.weather_condition,
            p.event_type,
            p.hour,
            entry.timestamp.format("%Y-%m-%d %H:%M"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transitflow_core::TrendPoint;

    #[test]
    fn trend_sparkline_spans_full_scale() {
        let points = (0..24)
            .map(|hour| TrendPoint {
                hour,
                delay: if hour == 18 { 12.0 } else { 0.0 },
            })
            .collect();
        let trend = Trend::try_from_points(points).unwrap();
        let mut frame = Frame::new(80);
        trend_section(&trend, &mut frame);
        let spark = frame.lines()[1].trim_start_matches("Delay by hour: ");
        assert_eq!(spark.chars().count(), 24);
        assert_eq!(spark.chars().nth(18), Some('█'));
        assert_eq!(spark.chars().nth(0), Some('▁'));
        assert!(frame.contains("Worst hour: 18:00 (+12.0 min)"));
    }

    #[test]
    fn pinned_fields_are_marked() {
        let mut p = TripParameters::default();
        p.overridden_fields.insert(WhatIfField::Precipitation);
        let mut frame = Frame::new(80);
        trip_section(&p, &mut frame);
        assert!(frame.lines()[2].contains("mm*"));
        assert!(!frame.lines()[2].contains("C*"));
        assert!(frame.lines()[0].starts_with("From: -"));
    }
}
