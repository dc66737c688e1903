//! Structured remark stream (spec §4.K). Every remark is emitted through
//! `tracing` at a level appropriate to its lifecycle event **and** pushed
//! onto an in-memory buffer so tests can assert on the exact text from
//! §6 without installing a subscriber.

use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemarkEvent {
    SchedulingNew,
    QueuingInitial,
    Skipping,
    ReadingDeps,
    FingerprintChanged,
    InvalidatedExternally,
    DisabledIncremental,
    PriorsDiscarded,
    InvariantViolation,
    OldestOutputCurrent,
    DifferentArguments,
}

impl RemarkEvent {
    pub fn tag(self) -> &'static str {
        match self {
            RemarkEvent::SchedulingNew => "scheduling-new",
            RemarkEvent::QueuingInitial => "queuing-initial",
            RemarkEvent::Skipping => "skipping",
            RemarkEvent::ReadingDeps => "reading-deps",
            RemarkEvent::FingerprintChanged => "fingerprint-changed",
            RemarkEvent::InvalidatedExternally => "invalidated-externally",
            RemarkEvent::DisabledIncremental => "disabled-incremental",
            RemarkEvent::PriorsDiscarded => "priors-discarded",
            RemarkEvent::InvariantViolation => "invariant-violation",
            RemarkEvent::OldestOutputCurrent => "oldest-output-current",
            RemarkEvent::DifferentArguments => "different-arguments",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remark {
    pub event: RemarkEvent,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct Reporter {
    remarks: Vec<Remark>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remarks(&self) -> &[Remark] {
        &self.remarks
    }

    fn push(&mut self, event: RemarkEvent, text: String) {
        match event {
            RemarkEvent::InvariantViolation | RemarkEvent::PriorsDiscarded => {
                tracing::warn!(event = event.tag(), "{text}")
            }
            RemarkEvent::SchedulingNew
            | RemarkEvent::QueuingInitial
            | RemarkEvent::InvalidatedExternally
            | RemarkEvent::DisabledIncremental
            | RemarkEvent::DifferentArguments => {
                tracing::info!(event = event.tag(), "{text}")
            }
            _ => tracing::debug!(event = event.tag(), "{text}"),
        }
        self.remarks.push(Remark { event, text });
    }

    pub fn scheduling_new(&mut self, input: &Path) {
        let text = fmt::scheduling_new(input);
        self.push(RemarkEvent::SchedulingNew, text);
    }

    pub fn queuing_initial(&mut self, input: &Path) {
        let text = fmt::queuing_initial(input);
        self.push(RemarkEvent::QueuingInitial, text);
    }

    pub fn skipping(&mut self, input: &Path) {
        let text = fmt::skipping(input);
        self.push(RemarkEvent::Skipping, text);
    }

    pub fn reading_deps(&mut self, input: &Path) {
        let text = fmt::reading_deps(input);
        self.push(RemarkEvent::ReadingDeps, text);
    }

    pub fn fingerprint_changed(&mut self, key_desc: &str) {
        let text = fmt::fingerprint_changed(key_desc);
        self.push(RemarkEvent::FingerprintChanged, text);
    }

    pub fn invalidated_externally(&mut self, path: &Path) {
        let text = fmt::invalidated_externally(path);
        self.push(RemarkEvent::InvalidatedExternally, text);
    }

    pub fn disabled_incremental(&mut self, reason: &str) {
        let text = fmt::disabled_incremental(reason);
        self.push(RemarkEvent::DisabledIncremental, text);
    }

    pub fn priors_discarded(&mut self, reason: &str) {
        let text = fmt::priors_discarded(reason);
        self.push(RemarkEvent::PriorsDiscarded, text);
    }

    pub fn invariant_violation(&mut self, reason: &str) {
        let text = fmt::invariant_violation(reason);
        self.push(RemarkEvent::InvariantViolation, text);
    }

    pub fn oldest_output_current(&mut self) {
        let text = fmt::oldest_output_current();
        self.push(RemarkEvent::OldestOutputCurrent, text);
    }

    pub fn different_arguments(&mut self) {
        let text = fmt::different_arguments();
        self.push(RemarkEvent::DifferentArguments, text);
    }
}

/// The literal textual phrasing of each remark — kept in one place so the
/// external contract (spec §6, consumed by `--show-incremental` users and
/// downstream test harnesses) has a single source of truth.
pub mod fmt {
    use std::path::Path;

    pub fn scheduling_new(input: &Path) -> String {
        format!("Queuing {} because it was newly added", input.display())
    }

    pub fn queuing_initial(input: &Path) -> String {
        format!("Queuing {} for the initial wave", input.display())
    }

    pub fn skipping(input: &Path) -> String {
        format!("Skipping {}: up to date", input.display())
    }

    pub fn reading_deps(input: &Path) -> String {
        format!("Reading dependencies for {}", input.display())
    }

    pub fn fingerprint_changed(key_desc: &str) -> String {
        format!("Fingerprint changed for {key_desc}")
    }

    pub fn invalidated_externally(path: &Path) -> String {
        format!("Invalidated because {} changed externally", path.display())
    }

    pub fn disabled_incremental(reason: &str) -> String {
        format!("Incremental compilation has been disabled: {reason}")
    }

    pub fn priors_discarded(reason: &str) -> String {
        format!("Incremental compilation could not read build record: {reason}")
    }

    pub fn invariant_violation(reason: &str) -> String {
        format!("Disabling incremental build: {reason}")
    }

    pub fn oldest_output_current() -> String {
        "oldest output is current".to_string()
    }

    pub fn different_arguments() -> String {
        "different arguments were passed".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn remarks_are_buffered_in_emission_order() {
        let mut reporter = Reporter::new();
        reporter.scheduling_new(&PathBuf::from("main.swift"));
        reporter.skipping(&PathBuf::from("other.swift"));

        let remarks = reporter.remarks();
        assert_eq!(remarks.len(), 2);
        assert_eq!(remarks[0].event, RemarkEvent::SchedulingNew);
        assert_eq!(remarks[1].event, RemarkEvent::Skipping);
    }

    #[test]
    fn different_arguments_remark_matches_external_contract_text() {
        let mut reporter = Reporter::new();
        reporter.different_arguments();
        assert_eq!(reporter.remarks()[0].text, "different arguments were passed");
    }
}
