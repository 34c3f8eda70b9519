use crate::domain::classifier::Classification;
use crate::domain::error::AnalysisError;
use crate::domain::plan::{RecompilationPlan, ScheduleReason};
use crate::domain::ports::DiagnosticsSink;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    Classified(Classification),
    Scheduled {
        unit: String,
        round: usize,
        reason: ScheduleReason,
    },
    AnalysisFailed(AnalysisError),
    PlanReady { units: usize },
}

/// Keeps every event in memory; safe to share between threads.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn classifications(&self) -> Vec<Classification> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DiagnosticEvent::Classified(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: DiagnosticEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl DiagnosticsSink for RecordingSink {
    fn classified(&self, classification: &Classification) {
        self.push(DiagnosticEvent::Classified(classification.clone()));
    }

    fn scheduled(&self, unit: &str, round: usize, reason: &ScheduleReason) {
        self.push(DiagnosticEvent::Scheduled {
            unit: unit.to_string(),
            round,
            reason: reason.clone(),
        });
    }

    fn analysis_failed(&self, error: &AnalysisError) {
        self.push(DiagnosticEvent::AnalysisFailed(error.clone()));
    }

    fn plan_ready(&self, plan: &RecompilationPlan) {
        self.push(DiagnosticEvent::PlanReady { units: plan.len() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::classifier::ClassChange;
    use std::sync::Arc;

    #[test]
    fn test_concurrent_reporting() {
        let sink = Arc::new(RecordingSink::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    sink.classified(&Classification {
                        binary_name: format!("p.C{i}"),
                        changes: vec![ClassChange::Unchanged],
                        lost_requires: Vec::new(),
                    });
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(sink.classifications().len(), 4);
    }
}
