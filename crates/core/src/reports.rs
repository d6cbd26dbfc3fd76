//! Operator reports over the event store.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;

use crate::event::{EventState, ServiceRequest};

const UNKNOWN_ACTION: &str = "unknown";

fn with_requests(states: &[EventState]) -> impl Iterator<Item = (&EventState, &ServiceRequest)> {
    states
        .iter()
        .filter_map(|state| state.service_request.as_ref().map(|sr| (state, sr)))
}

fn csv_row<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|v| format!("\"{}\"", v.as_ref().replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",")
}

/// CSV of every event with a service request, header included.
///
/// Empty when no event has been submitted.
pub fn list_service_requests(states: &[EventState]) -> String {
    let mut rows = with_requests(states).peekable();
    if rows.peek().is_none() {
        return String::new();
    }

    let mut out = csv_row(&[
        "serviceRequestNumber",
        "incidentDate",
        "incidentDateTime",
        "zones",
        "eventId",
    ]);
    out.push('\n');
    for (state, sr) in rows {
        out.push_str(&csv_row(&[
            sr.service_request_number.as_str(),
            sr.incident_date.as_str(),
            sr.incident_date_time.as_str(),
            state.event.zones.join(" ").as_str(),
            state.event.id.as_str(),
        ]));
        out.push('\n');
    }
    out
}

/// Request numbers grouped by incident date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportsByDate {
    pub total: usize,
    /// Incident date to sorted request numbers, in first-seen date order.
    pub dates: Vec<(String, Vec<String>)>,
}

impl ReportsByDate {
    pub fn from_states(states: &[EventState]) -> Self {
        let mut dates: Vec<(String, Vec<String>)> = Vec::new();
        let mut total = 0;
        for (_, sr) in with_requests(states) {
            total += 1;
            match dates.iter_mut().find(|(date, _)| *date == sr.incident_date) {
                Some((_, numbers)) => numbers.push(sr.service_request_number.clone()),
                None => dates.push((
                    sr.incident_date.clone(),
                    vec![sr.service_request_number.clone()],
                )),
            }
        }
        for (_, numbers) in &mut dates {
            numbers.sort();
        }
        Self { total, dates }
    }

    /// Plain-text rendering for terminals.
    pub fn render(&self) -> String {
        let mut out = format!("\nTotal reports: {}\n\n", self.total);
        for (date, numbers) in &self.dates {
            let _ = write!(out, "\nDate: {}\n\n{}\n\nTotal: {}\n", date, numbers.join(" "), numbers.len());
        }
        out
    }
}

/// Number of events per resolution action text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionSummary {
    pub counts: BTreeMap<String, usize>,
}

impl ResolutionSummary {
    pub fn from_states(states: &[EventState]) -> Self {
        let mut counts = BTreeMap::new();
        counts.insert(UNKNOWN_ACTION.to_string(), 0);
        for state in states {
            let action = state
                .service_request_status
                .as_ref()
                .and_then(|s| s.resolution_action.as_deref())
                .unwrap_or(UNKNOWN_ACTION);
            *counts.entry(action.to_string()).or_insert(0) += 1;
        }
        Self { counts }
    }

    pub fn render(&self) -> String {
        self.counts
            .iter()
            .map(|(action, count)| format!("{}, {}\n", count, action))
            .collect()
    }
}
