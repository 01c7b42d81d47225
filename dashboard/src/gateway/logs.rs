//! Log service calls and log line formatting

use std::fmt::Display;

use chrono::{DateTime, TimeZone};
use pipeline_api::models::logs::{GetLogEventsInput, GetLogEventsOutput};

use crate::errors::{GatewayError, GatewayResult};
use crate::gateway::client::ServiceClient;
use crate::models::pipeline::{LogBundle, LogLocation};

/// Failure message when the log service returns no event list
pub const LOGS_MISSING: &str = "Could not find logs";

impl ServiceClient {
    /// Get the events of one log stream
    pub async fn get_log_events(&self, location: &LogLocation) -> GatewayResult<GetLogEventsOutput> {
        self.call(
            "GetLogEvents",
            &GetLogEventsInput {
                log_group_name: location.log_group.clone(),
                log_stream_name: location.log_stream.clone(),
                start_from_head: None,
                next_token: None,
            },
        )
        .await
    }
}

/// Format one log line as `yyyy-mm-dd, h:mm AM: message` in `tz`
pub fn format_log_line<Tz>(timestamp_ms: i64, message: &str, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match DateTime::from_timestamp_millis(timestamp_ms) {
        Some(utc) => format!(
            "{}: {}",
            utc.with_timezone(tz).format("%Y-%m-%d, %-I:%M %p"),
            message
        ),
        None => format!("{}: {}", timestamp_ms, message),
    }
}

/// Turn a log events response into a bundle, formatting times in `tz`
pub fn bundle_from_events<Tz>(
    output: GetLogEventsOutput,
    location: &LogLocation,
    tz: &Tz,
) -> GatewayResult<LogBundle>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let events = output
        .events
        .ok_or_else(|| GatewayError::missing(LOGS_MISSING))?;

    Ok(LogBundle {
        lines: events
            .iter()
            .map(|event| {
                format_log_line(
                    event.timestamp.unwrap_or_default(),
                    event.message.as_deref().unwrap_or_default(),
                    tz,
                )
            })
            .collect(),
        log_group: location.log_group.clone(),
        log_stream: location.log_stream.clone(),
    })
}
