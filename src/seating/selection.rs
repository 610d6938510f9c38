use crate::config::{BookingConfig, SelectionPolicyKind, MAX_SEATS_PER_ORDER};
use crate::{BoxOfficeError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ToggleOutcome {
    Selected,
    Deselected,
    /// The new seat went in and the oldest selection was released.
    Replaced { evicted: String },
}

/// Decides what a toggle does once the selection already holds `target` seats.
pub trait SelectionPolicy: Send + Sync {
    fn admit_at_cap(&self, selected: &mut Vec<String>, target: usize, seat_id: &str) -> Result<ToggleOutcome>;
}

pub struct SlidingWindowPolicy;

impl SelectionPolicy for SlidingWindowPolicy {
    fn admit_at_cap(&self, selected: &mut Vec<String>, _target: usize, seat_id: &str) -> Result<ToggleOutcome> {
        let evicted = selected.remove(0);
        selected.push(seat_id.to_string());
        Ok(ToggleOutcome::Replaced { evicted })
    }
}

pub struct RejectAtCapPolicy;

impl SelectionPolicy for RejectAtCapPolicy {
    fn admit_at_cap(&self, _selected: &mut Vec<String>, target: usize, _seat_id: &str) -> Result<ToggleOutcome> {
        Err(BoxOfficeError::SelectionFull { target })
    }
}

pub fn policy_for(kind: SelectionPolicyKind) -> Arc<dyn SelectionPolicy> {
    match kind {
        SelectionPolicyKind::SlidingWindow => Arc::new(SlidingWindowPolicy),
        SelectionPolicyKind::RejectAtCap => Arc::new(RejectAtCapPolicy),
    }
}

/// One browsing session's seat picks, in the order they were made.
pub struct SeatSelection {
    selected: Vec<String>,
    target_count: usize,
    max_count: usize,
    submitting: bool,
    policy: Arc<dyn SelectionPolicy>,
}

impl SeatSelection {
    pub fn new(target_count: usize, config: &BookingConfig) -> Self {
        Self::with_policy(
            target_count,
            config.max_seats_per_order,
            policy_for(config.selection_policy),
        )
    }

    pub fn with_policy(target_count: usize, max_count: usize, policy: Arc<dyn SelectionPolicy>) -> Self {
        let max_count = max_count.clamp(1, MAX_SEATS_PER_ORDER);
        Self {
            selected: Vec::new(),
            target_count: target_count.clamp(1, max_count),
            max_count,
            submitting: false,
            policy,
        }
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    pub fn is_complete(&self) -> bool {
        self.selected.len() == self.target_count
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn toggle(&mut self, seat_id: &str) -> Result<ToggleOutcome> {
        self.ensure_idle()?;

        if let Some(pos) = self.selected.iter().position(|s| s == seat_id) {
            self.selected.remove(pos);
            return Ok(ToggleOutcome::Deselected);
        }

        if self.selected.len() < self.target_count {
            self.selected.push(seat_id.to_string());
            return Ok(ToggleOutcome::Selected);
        }

        self.policy
            .admit_at_cap(&mut self.selected, self.target_count, seat_id)
    }

    /// Clamps `n` into range and releases the newest picks beyond it.
    pub fn set_target_count(&mut self, n: usize) -> Result<Vec<String>> {
        self.ensure_idle()?;
        self.target_count = n.clamp(1, self.max_count);
        if self.selected.len() > self.target_count {
            Ok(self.selected.split_off(self.target_count))
        } else {
            Ok(Vec::new())
        }
    }

    pub fn clear(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.selected.clear();
        Ok(())
    }

    /// Marks a checkout as in flight and hands back the seats to submit.
    pub fn begin_submit(&mut self) -> Result<Vec<String>> {
        self.ensure_idle()?;
        if !self.is_complete() {
            return Err(BoxOfficeError::InvalidSeatCount {
                count: self.selected.len(),
                max: self.target_count,
            });
        }
        self.submitting = true;
        Ok(self.selected.clone())
    }

    /// Ends the in-flight checkout; a successful one clears the selection.
    pub fn finish_submit(&mut self, succeeded: bool) {
        self.submitting = false;
        if succeeded {
            self.selected.clear();
        }
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.submitting {
            Err(BoxOfficeError::CheckoutInFlight)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sliding(target: usize) -> SeatSelection {
        SeatSelection::new(target, &BookingConfig::default())
    }

    fn ids(seats: &[&str]) -> Vec<String> {
        seats.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn toggle_selects_and_deselects() {
        let mut selection = sliding(2);
        assert_eq!(selection.toggle("A1").unwrap(), ToggleOutcome::Selected);
        assert_eq!(selection.toggle("A1").unwrap(), ToggleOutcome::Deselected);
        assert!(selection.selected().is_empty());
    }

    #[test]
    fn sliding_window_evicts_oldest() {
        let mut selection = sliding(2);
        selection.toggle("A1").unwrap();
        selection.toggle("A2").unwrap();
        assert_eq!(
            selection.toggle("A3").unwrap(),
            ToggleOutcome::Replaced { evicted: "A1".to_string() }
        );
        assert_eq!(selection.selected(), ids(&["A2", "A3"]).as_slice());
    }

    #[test]
    fn reject_policy_keeps_selection() {
        let config = BookingConfig {
            selection_policy: SelectionPolicyKind::RejectAtCap,
            ..BookingConfig::default()
        };
        let mut selection = SeatSelection::new(1, &config);
        selection.toggle("B1").unwrap();
        assert!(matches!(
            selection.toggle("B2"),
            Err(BoxOfficeError::SelectionFull { target: 1 })
        ));
        assert_eq!(selection.selected(), ids(&["B1"]).as_slice());
    }

    #[test]
    fn toggle_sequences_respect_cap_and_uniqueness() {
        let seats = ["A1", "A2", "A3", "B1", "B2", "C4", "A1", "A2", "C4", "D5", "A3", "A3"];
        for target in 1..=4 {
            let mut selection = sliding(target);
            for (i, seat) in seats.iter().cycle().take(60).enumerate() {
                selection.toggle(seat).unwrap();
                if i % 7 == 0 {
                    selection.set_target_count((i % 5) + 1).unwrap();
                }
                let picked = selection.selected();
                assert!(picked.len() <= selection.target_count());
                let mut unique = picked.to_vec();
                unique.sort();
                unique.dedup();
                assert_eq!(unique.len(), picked.len());
            }
        }
    }

    #[test]
    fn shrinking_target_keeps_oldest() {
        let mut selection = sliding(4);
        for seat in ["A1", "A2", "A3", "A4"] {
            selection.toggle(seat).unwrap();
        }
        let released = selection.set_target_count(2).unwrap();
        assert_eq!(selection.selected(), ids(&["A1", "A2"]).as_slice());
        assert_eq!(released, ids(&["A3", "A4"]));
    }

    #[test]
    fn target_is_clamped() {
        let mut selection = sliding(0);
        assert_eq!(selection.target_count(), 1);
        selection.set_target_count(9).unwrap();
        assert_eq!(selection.target_count(), 4);
    }

    #[test]
    fn in_flight_submit_blocks_toggles() {
        let mut selection = sliding(1);
        selection.toggle("A1").unwrap();
        assert_eq!(selection.begin_submit().unwrap(), ids(&["A1"]));
        assert!(matches!(selection.toggle("A2"), Err(BoxOfficeError::CheckoutInFlight)));
        assert!(matches!(selection.begin_submit(), Err(BoxOfficeError::CheckoutInFlight)));

        selection.finish_submit(false);
        assert_eq!(selection.selected(), ids(&["A1"]).as_slice());
        selection.begin_submit().unwrap();
        selection.finish_submit(true);
        assert!(selection.selected().is_empty());
    }

    #[test]
    fn submit_requires_full_selection() {
        let mut selection = sliding(2);
        selection.toggle("A1").unwrap();
        assert!(matches!(
            selection.begin_submit(),
            Err(BoxOfficeError::InvalidSeatCount { count: 1, max: 2 })
        ));
    }

    #[test]
    fn oversized_limit_is_capped() {
        let config = BookingConfig {
            max_seats_per_order: 6,
            ..BookingConfig::default()
        };
        let mut selection = SeatSelection::new(6, &config);
        assert_eq!(selection.target_count(), MAX_SEATS_PER_ORDER);
        assert!(selection.set_target_count(6).unwrap().is_empty());
        assert_eq!(selection.target_count(), MAX_SEATS_PER_ORDER);
    }
}
