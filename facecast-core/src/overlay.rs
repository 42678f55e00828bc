//! What the render loop draws.
//!
//! [`OverlayContent`] is a plain owned record. Each field has exactly one
//! writer role: task slots are written by the task-update handler (and
//! cleared by its delayed clears), `frame_rate` by the statistics
//! sampler, `session` by the status handler. The render loop only reads.

use std::sync::Arc;

use crate::protocol::RecognitionTask;
use crate::state::SessionStatus;

/// One of the two task slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Latest task whose detection stage succeeded.
    Detected,
    /// Latest task whose search stage succeeded.
    Result,
}

/// Rolling statistics shown in the corner of the overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsContent {
    /// Render-loop executions in the last sampling window.
    pub frame_rate: u32,
    pub session: SessionStatus,
}

#[derive(Debug, Clone)]
pub struct OverlayContent {
    detected: Option<Arc<RecognitionTask>>,
    result: Option<Arc<RecognitionTask>>,
    stats: StatsContent,
}

impl Default for OverlayContent {
    fn default() -> Self {
        Self {
            detected: None,
            result: None,
            stats: StatsContent {
                frame_rate: 0,
                session: SessionStatus::closed(String::new()),
            },
        }
    }
}

impl OverlayContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detected(&self) -> Option<&RecognitionTask> {
        self.detected.as_deref()
    }

    pub fn result(&self) -> Option<&RecognitionTask> {
        self.result.as_deref()
    }

    pub fn slot(&self, slot: Slot) -> Option<&Arc<RecognitionTask>> {
        match slot {
            Slot::Detected => self.detected.as_ref(),
            Slot::Result => self.result.as_ref(),
        }
    }

    pub fn stats(&self) -> &StatsContent {
        &self.stats
    }

    pub fn set_frame_rate(&mut self, frame_rate: u32) {
        self.stats.frame_rate = frame_rate;
    }

    /// Record a status change.
    ///
    /// Request ids restart with every session, so when the session id
    /// changes both slots are emptied: the old session's tasks are stale
    /// and their ids must not gate the new session's results.
    pub fn set_session(&mut self, status: SessionStatus) {
        if status.session_id != self.stats.session.session_id {
            self.detected = None;
            self.result = None;
        }
        self.stats.session = status;
    }

    /// Route a task update into the slots its stages qualify for.
    ///
    /// Returns every slot that now holds the task, so the caller can
    /// schedule the matching clears.
    pub fn apply_task(&mut self, task: RecognitionTask) -> Vec<(Slot, Arc<RecognitionTask>)> {
        let task = Arc::new(task);
        let mut placed = Vec::new();
        if task.detection_succeeded() && self.set(Slot::Detected, Arc::clone(&task)) {
            placed.push((Slot::Detected, Arc::clone(&task)));
        }
        if task.search_succeeded() && self.set(Slot::Result, Arc::clone(&task)) {
            placed.push((Slot::Result, task));
        }
        placed
    }

    /// Put `task` into `slot`.
    ///
    /// A task carrying a request id older than the one already shown is
    /// refused, since it answers an earlier frame. Returns whether the
    /// slot was written.
    pub fn set(&mut self, slot: Slot, task: Arc<RecognitionTask>) -> bool {
        let current = self.slot_mut(slot);
        if let (Some(shown), Some(incoming)) = (
            current.as_ref().and_then(|t| t.request_id),
            task.request_id,
        ) {
            if incoming < shown {
                return false;
            }
        }
        *current = Some(task);
        true
    }

    /// Clear `slot` only if it still holds this exact task instance.
    pub fn clear_if_same(&mut self, slot: Slot, task: &Arc<RecognitionTask>) -> bool {
        let current = self.slot_mut(slot);
        if current.as_ref().is_some_and(|shown| Arc::ptr_eq(shown, task)) {
            *current = None;
            return true;
        }
        false
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut Option<Arc<RecognitionTask>> {
        match slot {
            Slot::Detected => &mut self.detected,
            Slot::Result => &mut self.result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::StageState;
    use crate::state::ConnectionState;

    fn task(detection: StageState, search: StageState, request_id: Option<u64>) -> RecognitionTask {
        let mut t = RecognitionTask {
            request_id,
            ..Default::default()
        };
        t.detection.state = detection;
        t.search.state = search;
        t
    }

    #[test]
    fn detection_only_fills_detected_slot() {
        let mut overlay = OverlayContent::new();
        let placed = overlay.apply_task(task(StageState::Succeeded, StageState::Running, None));
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].0, Slot::Detected);
        assert!(overlay.detected().is_some());
        assert!(overlay.result().is_none());
    }

    #[test]
    fn full_task_fills_both_slots_with_same_instance() {
        let mut overlay = OverlayContent::new();
        let placed = overlay.apply_task(task(StageState::Succeeded, StageState::Succeeded, None));
        assert_eq!(placed.len(), 2);
        assert!(Arc::ptr_eq(
            overlay.slot(Slot::Detected).unwrap(),
            overlay.slot(Slot::Result).unwrap()
        ));
    }

    #[test]
    fn pending_task_touches_nothing() {
        let mut overlay = OverlayContent::new();
        assert!(overlay.apply_task(task(StageState::Running, StageState::Pending, None)).is_empty());
        assert!(overlay.detected().is_none());
    }

    #[test]
    fn stale_clear_does_not_wipe_newer_task() {
        let mut overlay = OverlayContent::new();
        let first = Arc::new(task(StageState::Succeeded, StageState::Pending, None));
        let second = Arc::new(task(StageState::Succeeded, StageState::Pending, None));
        overlay.set(Slot::Detected, Arc::clone(&first));
        overlay.set(Slot::Detected, Arc::clone(&second));

        assert!(!overlay.clear_if_same(Slot::Detected, &first));
        assert!(Arc::ptr_eq(overlay.slot(Slot::Detected).unwrap(), &second));

        assert!(overlay.clear_if_same(Slot::Detected, &second));
        assert!(overlay.detected().is_none());
    }

    #[test]
    fn equal_but_distinct_instances_are_not_the_same_task() {
        let mut overlay = OverlayContent::new();
        let shown = Arc::new(task(StageState::Succeeded, StageState::Pending, None));
        let lookalike = Arc::new(task(StageState::Succeeded, StageState::Pending, None));
        overlay.set(Slot::Detected, Arc::clone(&shown));
        assert!(!overlay.clear_if_same(Slot::Detected, &lookalike));
        assert!(overlay.detected().is_some());
    }

    #[test]
    fn older_request_id_is_refused() {
        let mut overlay = OverlayContent::new();
        overlay.apply_task(task(StageState::Succeeded, StageState::Succeeded, Some(5)));
        let placed = overlay.apply_task(task(StageState::Succeeded, StageState::Succeeded, Some(4)));
        assert!(placed.is_empty());
        assert_eq!(overlay.result().unwrap().request_id, Some(5));

        // Later progress on the same request is accepted.
        let placed = overlay.apply_task(task(StageState::Succeeded, StageState::Succeeded, Some(5)));
        assert_eq!(placed.len(), 2);
    }

    #[test]
    fn tasks_without_ids_are_taken_in_arrival_order() {
        let mut overlay = OverlayContent::new();
        overlay.apply_task(task(StageState::Succeeded, StageState::Pending, Some(9)));
        let placed = overlay.apply_task(task(StageState::Succeeded, StageState::Pending, None));
        assert_eq!(placed.len(), 1);
        assert_eq!(overlay.detected().unwrap().request_id, None);
    }

    #[test]
    fn new_session_resets_request_ordering() {
        let mut overlay = OverlayContent::new();
        let mut status = SessionStatus::closed("c-1");
        status.state = ConnectionState::Ready;
        status.session_id = Some("sess-1".into());
        overlay.set_session(status.clone());
        overlay.apply_task(task(StageState::Succeeded, StageState::Succeeded, Some(37)));

        // Same session again: nothing is dropped.
        overlay.set_session(status.clone());
        assert_eq!(overlay.result().unwrap().request_id, Some(37));

        overlay.set_session(SessionStatus::closed("c-1"));
        assert!(overlay.detected().is_none());
        assert!(overlay.result().is_none());

        status.session_id = Some("sess-2".into());
        overlay.set_session(status);
        let placed = overlay.apply_task(task(StageState::Succeeded, StageState::Succeeded, Some(1)));
        assert_eq!(placed.len(), 2);
        assert_eq!(overlay.result().unwrap().request_id, Some(1));
    }

    #[test]
    fn stats_writers() {
        let mut overlay = OverlayContent::new();
        overlay.set_frame_rate(40);
        let mut status = SessionStatus::closed("c-1");
        status.session_id = Some("s".into());
        overlay.set_session(status.clone());
        assert_eq!(overlay.stats().frame_rate, 40);
        assert_eq!(overlay.stats().session, status);
    }
}
