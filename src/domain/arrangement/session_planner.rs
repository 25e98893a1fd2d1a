use crate::domain::arrangement::validation::ValidationError;

/// How a course's class hours split into weekly sessions.
///
/// Every week delivers `per_session` lessons except a trailing partial week,
/// which delivers the `remainder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPlan {
    pub total_class_hours: u32,
    pub per_session: u32,
    pub full_weeks: u32,
    pub remainder: u32,
    pub required_weeks: u32,
    pub last_week_count: u32,
}

impl SessionPlan {
    pub fn compute(total_class_hours: u32, per_session: u32) -> Result<SessionPlan, ValidationError> {
        if total_class_hours == 0 || per_session == 0 {
            return Err(ValidationError::InvalidClassHours { total: total_class_hours, per_session });
        }

        let full_weeks = total_class_hours / per_session;
        let remainder = total_class_hours - full_weeks * per_session;

        Ok(SessionPlan {
            total_class_hours,
            per_session,
            full_weeks,
            remainder,
            required_weeks: full_weeks + u32::from(remainder > 0),
            last_week_count: if remainder > 0 { remainder } else { per_session },
        })
    }

    pub fn has_partial_week(&self) -> bool {
        self.remainder > 0
    }

    /// Lesson target of a week, depending on whether it is the chronologically
    /// last selected week.
    pub fn target_for(&self, is_last_week: bool) -> u32 {
        if is_last_week { self.last_week_count } else { self.per_session }
    }
}
