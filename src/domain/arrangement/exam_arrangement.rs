use std::collections::BTreeMap;

use crate::domain::arrangement::transaction::ExamTransaction;
use crate::domain::arrangement::validation::ValidationError;
use crate::domain::catalog::room_catalog::RoomAsset;
use crate::domain::utils::id::RoomName;

pub const DEFAULT_EXAM_CAPACITY_MULTIPLIER: u32 = 3;

/// Seating policy for exams: the selected rooms together must seat
/// `multiplier` times the expected headcount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamCapacityPolicy {
    pub multiplier: u32,
}

impl Default for ExamCapacityPolicy {
    fn default() -> Self {
        ExamCapacityPolicy { multiplier: DEFAULT_EXAM_CAPACITY_MULTIPLIER }
    }
}

impl ExamCapacityPolicy {
    pub fn required_capacity(&self, headcount: u32) -> u32 {
        headcount.saturating_mul(self.multiplier)
    }
}

/// Room selection of one exam arrangement. An exam occupies a single time
/// window, so the plan is a flat set of rooms.
#[derive(Debug, Clone)]
pub struct ExamArrangementState {
    transaction: ExamTransaction,
    policy: ExamCapacityPolicy,
    rooms: BTreeMap<RoomName, u32>,
}

impl ExamArrangementState {
    pub fn new(transaction: ExamTransaction, policy: ExamCapacityPolicy) -> Self {
        ExamArrangementState { transaction, policy, rooms: BTreeMap::new() }
    }

    pub fn get_transaction(&self) -> &ExamTransaction {
        &self.transaction
    }

    /// Selected rooms with their capacity.
    pub fn get_rooms(&self) -> &BTreeMap<RoomName, u32> {
        &self.rooms
    }

    pub fn capacity_sum(&self) -> u32 {
        self.rooms.values().sum()
    }

    pub fn required_capacity(&self) -> u32 {
        self.policy.required_capacity(self.transaction.expected_headcount)
    }

    /// Seats still missing, 0 once the rule is met.
    pub fn shortfall(&self) -> u32 {
        self.required_capacity().saturating_sub(self.capacity_sum())
    }

    /// Returns whether the room is selected afterwards.
    pub fn toggle_room(&mut self, room: &RoomAsset) -> Result<bool, ValidationError> {
        if self.transaction.window.is_none() {
            return Err(ValidationError::ExamWindowMissing);
        }
        if self.rooms.remove(&room.name).is_some() {
            return Ok(false);
        }

        self.rooms.insert(room.name.clone(), room.capacity);
        Ok(true)
    }

    pub fn remove_room(&mut self, room: &RoomName) -> bool {
        self.rooms.remove(room).is_some()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.transaction.window.is_none() {
            return Err(ValidationError::ExamWindowMissing);
        }
        if self.transaction.expected_headcount == 0 {
            return Ok(());
        }

        let selected = self.capacity_sum();
        let required = self.required_capacity();
        if selected < required {
            return Err(ValidationError::InsufficientCapacity { selected, required });
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn blocking_reason(&self) -> Option<String> {
        self.validate().err().map(|e| e.to_string())
    }
}
