//! In-memory seating layout: periods -> rows -> pods -> students, plus a
//! per-period pool of unassigned students.
//!
//! Every change goes through [`reduce`], which never mutates its input and
//! either applies an action fully or hands back an unchanged copy.

use std::collections::HashSet;

use shared::{
    domain::{ClassPeriod, Row, Student, StudentId, POD_CAPACITY},
    protocol::{ActionOutcome, LayoutAction, LayoutSnapshot, RejectReason},
};
use thiserror::Error;
use tracing::debug;

pub mod render;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutState {
    periods: Vec<ClassPeriod>,
    selected_period: Option<usize>,
    adding_period: bool,
    /// `None` once every id has been handed out.
    next_student_id: Option<i64>,
}

impl Default for LayoutState {
    fn default() -> Self {
        Self {
            periods: vec![ClassPeriod::new(1)],
            selected_period: Some(0),
            adding_period: false,
            next_student_id: Some(1),
        }
    }
}

impl LayoutState {
    /// A layout with no periods at all and nothing selected.
    pub fn empty() -> Self {
        Self {
            periods: Vec::new(),
            selected_period: None,
            adding_period: false,
            next_student_id: Some(1),
        }
    }

    /// Rebuilds a state from a snapshot, e.g. one sent back by a client.
    /// Out-of-range selections are dropped; a snapshot that breaks any layout
    /// invariant, or whose ids leave no room for another student, is refused.
    pub fn from_snapshot(snapshot: LayoutSnapshot) -> Result<Self, InvariantViolation> {
        let selected_period = snapshot
            .selected_period_index
            .filter(|index| *index < snapshot.periods.len());
        let mut state = Self {
            periods: snapshot.periods,
            selected_period,
            adding_period: snapshot.adding_period,
            next_student_id: Some(1),
        };
        check_invariants(&state)?;
        let fresh = state
            .fresh_student_id()
            .ok_or(InvariantViolation::StudentIdsExhausted)?;
        state.next_student_id = Some(fresh.0);
        Ok(state)
    }

    pub fn periods(&self) -> &[ClassPeriod] {
        &self.periods
    }

    pub fn selected_period_index(&self) -> Option<usize> {
        self.selected_period
    }

    pub fn selected_period(&self) -> Option<&ClassPeriod> {
        self.periods.get(self.selected_period?)
    }

    pub fn is_adding_period(&self) -> bool {
        self.adding_period
    }

    pub fn snapshot(&self) -> LayoutSnapshot {
        LayoutSnapshot {
            periods: self.periods.clone(),
            selected_period_index: self.selected_period,
            adding_period: self.adding_period,
        }
    }

    fn selected_period_mut(&mut self) -> Result<&mut ClassPeriod, RejectReason> {
        let index = self.selected_period.ok_or(RejectReason::NoPeriodSelected)?;
        self.periods
            .get_mut(index)
            .ok_or(RejectReason::NoPeriodSelected)
    }

    /// Next id that has never been handed out and is not held by anyone.
    /// `None` once the id space is used up.
    fn fresh_student_id(&self) -> Option<StudentId> {
        let max_existing = self
            .periods
            .iter()
            .flat_map(|period| period.students())
            .map(|s| s.id.0)
            .max()
            .unwrap_or(0);
        let next = self.next_student_id?;
        Some(StudentId(next.max(max_existing.checked_add(1)?)))
    }
}

/// Where a student sits inside one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Unassigned,
    Pod { row: usize, pod: usize },
}

/// Relocates one student between two containers of the same period.
///
/// All checks run before anything is touched: the source must hold the
/// student, the target must exist and have a free seat.
pub fn move_student(
    period: &mut ClassPeriod,
    from: Placement,
    to: Placement,
    id: StudentId,
) -> Result<(), RejectReason> {
    let source_pos = match from {
        Placement::Unassigned => period.unassigned_students.iter().position(|s| s.id == id),
        Placement::Pod { row, pod } => period
            .pod(row, pod)
            .ok_or(RejectReason::InvalidIndex)?
            .students
            .iter()
            .position(|s| s.id == id),
    }
    .ok_or(RejectReason::StudentNotFound)?;

    if from == to {
        return Ok(());
    }

    if let Placement::Pod { row, pod } = to {
        let target = period.pod(row, pod).ok_or(RejectReason::InvalidIndex)?;
        if target.is_full() {
            return Err(RejectReason::PodFull);
        }
    }

    let student = match from {
        Placement::Unassigned => period.unassigned_students.remove(source_pos),
        Placement::Pod { row, pod } => period
            .pod_mut(row, pod)
            .ok_or(RejectReason::InvalidIndex)?
            .students
            .remove(source_pos),
    };
    match to {
        Placement::Unassigned => period.unassigned_students.push(student),
        Placement::Pod { row, pod } => period
            .pod_mut(row, pod)
            .ok_or(RejectReason::InvalidIndex)?
            .students
            .push(student),
    }
    Ok(())
}

/// Applies `action` to a copy of `state`. A rejected action returns a state
/// equal to the input.
pub fn reduce(state: &LayoutState, action: &LayoutAction) -> (LayoutState, ActionOutcome) {
    let mut next = state.clone();
    let outcome = ActionOutcome::from(apply(&mut next, action));
    if outcome.is_accepted() {
        (next, outcome)
    } else {
        (state.clone(), outcome)
    }
}

fn apply(state: &mut LayoutState, action: &LayoutAction) -> Result<(), RejectReason> {
    match action {
        LayoutAction::SelectPeriod { index } => {
            if *index >= state.periods.len() {
                return Err(RejectReason::InvalidIndex);
            }
            state.selected_period = Some(*index);
            state.adding_period = false;
        }
        LayoutAction::BeginNewPeriod => {
            state.selected_period = None;
            state.adding_period = true;
        }
        LayoutAction::CancelNewPeriod => {
            state.adding_period = false;
            state.selected_period = (!state.periods.is_empty()).then_some(0);
        }
        LayoutAction::AddPeriod { label } => {
            if label.trim().is_empty() {
                return Err(RejectReason::EmptyName);
            }
            let number = u32::try_from(state.periods.len() + 1).map_err(|_| RejectReason::InvalidIndex)?;
            state.periods.push(ClassPeriod::new(number));
            state.selected_period = Some(state.periods.len() - 1);
            state.adding_period = false;
        }
        LayoutAction::AddStudent { name } => {
            let name = name.trim();
            if name.is_empty() {
                return Err(RejectReason::EmptyName);
            }
            let id = state
                .fresh_student_id()
                .ok_or(RejectReason::StudentIdsExhausted)?;
            state.selected_period_mut()?.unassigned_students.push(Student {
                id,
                name: name.to_string(),
            });
            state.next_student_id = id.0.checked_add(1);
        }
        LayoutAction::RemoveUnassignedStudent { student_id } => {
            let period = state.selected_period_mut()?;
            let pos = period
                .unassigned_students
                .iter()
                .position(|s| s.id == *student_id)
                .ok_or(RejectReason::StudentNotFound)?;
            period.unassigned_students.remove(pos);
        }
        LayoutAction::AddRow => {
            state.selected_period_mut()?.rows.push(Row::with_empty_pod());
        }
        LayoutAction::AddPod { row_index } => {
            state
                .selected_period_mut()?
                .rows
                .get_mut(*row_index)
                .ok_or(RejectReason::InvalidIndex)?
                .pods
                .push(Default::default());
        }
        LayoutAction::DeletePod {
            row_index,
            pod_index,
        } => {
            let period = state.selected_period_mut()?;
            let (row, pod) = (*row_index, *pod_index);
            let seated: Vec<StudentId> = period
                .pod(row, pod)
                .ok_or(RejectReason::InvalidIndex)?
                .students
                .iter()
                .map(|s| s.id)
                .collect();
            for id in seated {
                move_student(period, Placement::Pod { row, pod }, Placement::Unassigned, id)?;
            }
            period.rows[row].pods.remove(pod);
        }
        LayoutAction::AssignStudent {
            row_index,
            pod_index,
            student_id,
        } => {
            let period = state.selected_period_mut()?;
            move_student(
                period,
                Placement::Unassigned,
                Placement::Pod {
                    row: *row_index,
                    pod: *pod_index,
                },
                *student_id,
            )?;
        }
    }
    Ok(())
}

/// Owns the current layout; the single writer for everything above.
#[derive(Debug, Clone, Default)]
pub struct LayoutStore {
    state: LayoutState,
}

impl LayoutStore {
    pub fn new(state: LayoutState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &LayoutState {
        &self.state
    }

    pub fn snapshot(&self) -> LayoutSnapshot {
        self.state.snapshot()
    }

    pub fn dispatch(&mut self, action: &LayoutAction) -> ActionOutcome {
        let (next, outcome) = reduce(&self.state, action);
        if let ActionOutcome::Rejected { reason } = outcome {
            debug!(action = action.kind(), ?reason, "layout action rejected");
        }
        self.state = next;
        outcome
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("student {id:?} appears more than once in period {period}")]
    DuplicateStudent { period: usize, id: StudentId },
    #[error("pod {row}/{pod} in period {period} holds {count} students, over pod capacity")]
    PodOverCapacity {
        period: usize,
        row: usize,
        pod: usize,
        count: usize,
    },
    #[error("selected period {index} is out of range ({len} periods)")]
    SelectionOutOfRange { index: usize, len: usize },
    #[error("no student ids left to hand out")]
    StudentIdsExhausted,
}

/// Verifies the structural guarantees every reachable state must keep.
pub fn check_invariants(state: &LayoutState) -> Result<(), InvariantViolation> {
    if let Some(index) = state.selected_period {
        if index >= state.periods.len() {
            return Err(InvariantViolation::SelectionOutOfRange {
                index,
                len: state.periods.len(),
            });
        }
    }

    for (period_index, period) in state.periods.iter().enumerate() {
        for (row_index, row) in period.rows.iter().enumerate() {
            for (pod_index, pod) in row.pods.iter().enumerate() {
                if pod.students.len() > POD_CAPACITY {
                    return Err(InvariantViolation::PodOverCapacity {
                        period: period_index,
                        row: row_index,
                        pod: pod_index,
                        count: pod.students.len(),
                    });
                }
            }
        }

        let mut seen = HashSet::new();
        for student in period.students() {
            if !seen.insert(student.id) {
                return Err(InvariantViolation::DuplicateStudent {
                    period: period_index,
                    id: student.id,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
