use axum::{
    Json,
    extract::{FromRequest, FromRequestParts},
};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Value, json};

use crate::error::AppError;

/// `Json` with rejections rendered as [`AppError`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `Path` with rejections rendered as [`AppError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

pub fn message(text: &str) -> Json<Value> {
    Json(json!({ "message": text }))
}

pub fn now() -> f64 {
    to_seconds(Utc::now())
}

fn to_seconds<Tz: TimeZone>(time: DateTime<Tz>) -> f64 {
    time.timestamp_micros() as f64 / 1_000_000.0
}

/// Numbers pass through, strings are parsed as ISO-8601. Anything missing,
/// falsy or unparseable becomes `now`.
pub fn resolve_last_used(input: Option<&Value>, now: f64) -> f64 {
    match input {
        Some(Value::Number(n)) => n.as_f64().filter(|n| *n != 0.0).unwrap_or(now),
        Some(Value::String(s)) if !s.is_empty() => parse_timestamp(s).unwrap_or(now),
        _ => now,
    }
}

pub fn parse_timestamp(input: &str) -> Option<f64> {
    let input = input.trim().replace(' ', "T");

    if let Ok(time) = DateTime::parse_from_rfc3339(&input) {
        return Some(to_seconds(time));
    }

    let naive = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&input, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(&input, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(to_seconds)
}
