//! Begin/complete logging around a unit of work
//!
//! A scope logs `{NAME}_BEGIN` when opened. Closing it with `complete` logs
//! `{NAME}_COMPLETE` with the elapsed time; `fail` logs `{NAME}_FAILED`.
//! A scope dropped without either logs `{NAME}_INCOMPLETE` at WARN.

use std::time::Instant;

use super::logger::{Logger, Severity};

pub struct ObservationScope {
    name: &'static str,
    fields: Vec<(&'static str, String)>,
    started: Instant,
    closed: bool,
}

impl ObservationScope {
    pub fn new(name: &'static str) -> Self {
        Self::with_fields(name, Vec::new())
    }

    /// Opens a scope whose fields are repeated on every event it logs
    pub fn with_fields(name: &'static str, fields: Vec<(&'static str, String)>) -> Self {
        let scope = Self {
            name,
            fields,
            started: Instant::now(),
            closed: false,
        };
        scope.emit(Severity::Info, "BEGIN", &[]);
        scope
    }

    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    pub fn complete_with_fields(mut self, extra: &[(&str, &str)]) {
        self.closed = true;
        let elapsed = self.elapsed_ms().to_string();
        let mut fields: Vec<(&str, &str)> = extra.to_vec();
        fields.push(("elapsed_ms", &elapsed));
        self.emit(Severity::Info, "COMPLETE", &fields);
    }

    pub fn fail(mut self, reason: &str) {
        self.closed = true;
        self.emit(Severity::Error, "FAILED", &[("reason", reason)]);
    }

    /// Failure that ends the query lifecycle
    pub fn fail_fatal(mut self, reason: &str) {
        self.closed = true;
        self.emit(Severity::Fatal, "FAILED", &[("reason", reason)]);
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }

    fn emit(&self, severity: Severity, suffix: &str, extra: &[(&str, &str)]) {
        let event = format!("{}_{}", self.name, suffix);
        let mut fields: Vec<(&str, &str)> = self
            .fields
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .collect();
        fields.extend_from_slice(extra);
        Logger::log(severity, &event, &fields);
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.closed {
            self.emit(
                Severity::Warn,
                "INCOMPLETE",
                &[("reason", "scope dropped without completion")],
            );
        }
    }
}
