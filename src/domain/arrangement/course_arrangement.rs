use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::domain::arrangement::session_planner::SessionPlan;
use crate::domain::arrangement::transaction::CourseTransaction;
use crate::domain::arrangement::validation::ValidationError;
use crate::domain::catalog::calendar_index::CalendarEntry;
use crate::domain::catalog::lesson_timetable::MAX_LESSON_INDEX;
use crate::domain::utils::id::RoomName;

/// Lessons and room of one selected week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekPlan {
    pub date: NaiveDate,
    /// Set when the calendar marks the day as a holiday. Such a week takes no lessons.
    pub holiday_name: Option<String>,
    pub lessons: BTreeSet<u8>,
    pub room: Option<RoomName>,
}

impl WeekPlan {
    fn from_entry(entry: &CalendarEntry) -> Self {
        let holiday_name = entry.is_holiday().then(|| entry.holiday_name.clone().unwrap_or_else(|| "holiday".to_string()));
        WeekPlan { date: entry.date, holiday_name, lessons: BTreeSet::new(), room: None }
    }

    pub fn is_holiday(&self) -> bool {
        self.holiday_name.is_some()
    }

    fn clear(&mut self) {
        self.lessons.clear();
        self.room = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoursePhase {
    Empty,
    DayChosen,
    SessionLengthChosen,
    WeeksChosen,
    PerWeekFilling,
    Complete,
}

/// Selection state of one course arrangement.
///
/// All operations are synchronous and leave the state consistent; the
/// completeness of the plan is derived from the current state on demand.
#[derive(Debug, Clone)]
pub struct CourseArrangementState {
    transaction: CourseTransaction,
    weekday: Option<u8>,
    plan: Option<SessionPlan>,
    weeks: BTreeMap<u32, WeekPlan>,
}

impl CourseArrangementState {
    pub fn new(transaction: CourseTransaction) -> Self {
        CourseArrangementState { transaction, weekday: None, plan: None, weeks: BTreeMap::new() }
    }

    pub fn get_transaction(&self) -> &CourseTransaction {
        &self.transaction
    }

    pub fn get_weekday(&self) -> Option<u8> {
        self.weekday
    }

    pub fn get_session_plan(&self) -> Option<&SessionPlan> {
        self.plan.as_ref()
    }

    /// Lessons per session, 0 while not chosen.
    pub fn get_per_session(&self) -> u32 {
        self.plan.map(|plan| plan.per_session).unwrap_or(0)
    }

    pub fn get_weeks(&self) -> &BTreeMap<u32, WeekPlan> {
        &self.weeks
    }

    pub fn get_week(&self, week: u32) -> Option<&WeekPlan> {
        self.weeks.get(&week)
    }

    pub fn selected_dates(&self) -> Vec<NaiveDate> {
        self.weeks.values().map(|plan| plan.date).collect()
    }

    /// Lessons selected over all weeks.
    pub fn class_hours(&self) -> u32 {
        self.weeks.values().map(|plan| plan.lessons.len() as u32).sum()
    }

    /// Lesson target of a selected week. The chronologically last selected
    /// week takes the partial count.
    pub fn target_for(&self, week: u32) -> Option<u32> {
        let plan = self.plan?;
        if !self.weeks.contains_key(&week) {
            return None;
        }
        let last = self.weeks.keys().next_back().copied();
        Some(plan.target_for(last == Some(week)))
    }

    /// Returns `true` when the weekday changed. A change drops every week
    /// chosen under the previous weekday.
    pub fn select_weekday(&mut self, weekday: u8) -> Result<bool, ValidationError> {
        if !self.transaction.eligible_weekdays.contains(&weekday) {
            return Err(ValidationError::WeekdayNotEligible(weekday));
        }
        if self.weekday == Some(weekday) {
            return Ok(false);
        }

        if !self.weeks.is_empty() {
            log::info!("Weekday of course {} changed to {}; dropping {} selected weeks.", self.transaction.course_code, weekday, self.weeks.len());
        }
        self.weekday = Some(weekday);
        self.weeks.clear();
        Ok(true)
    }

    /// Re-derives the weekly targets. Weeks beyond the new requirement are
    /// dropped from the end, and every remaining week whose lessons no longer
    /// match its target loses its lessons and room.
    pub fn set_per_session(&mut self, per_session: u32) -> Result<bool, ValidationError> {
        let plan = SessionPlan::compute(self.transaction.total_class_hours, per_session)?;
        if self.plan == Some(plan) {
            return Ok(false);
        }
        self.plan = Some(plan);

        while self.weeks.len() as u32 > plan.required_weeks {
            if let Some((week, _)) = self.weeks.pop_last() {
                log::info!("Week {} dropped: {} weeks are enough at {} lessons per session.", week, plan.required_weeks, per_session);
            }
        }

        self.clear_weeks_where(|selected, target| selected != target);
        Ok(true)
    }

    fn clear_weeks_where(&mut self, mismatch: impl Fn(u32, u32) -> bool) {
        let Some(plan) = self.plan else { return };
        let last = self.weeks.keys().next_back().copied();

        for (week, week_plan) in self.weeks.iter_mut() {
            let target = plan.target_for(last == Some(*week));
            let selected = week_plan.lessons.len() as u32;

            if selected > 0 && mismatch(selected, target) {
                log::debug!("Week {} cleared: {} lessons selected, target is now {}.", week, selected, target);
                week_plan.clear();
            } else if selected != target {
                week_plan.room = None;
            }
        }
    }

    /// Adds the week `entry` resolves to. Only possible while fewer weeks than
    /// required are selected.
    pub fn add_week(&mut self, entry: &CalendarEntry) -> Result<(), ValidationError> {
        let weekday = self.weekday.ok_or(ValidationError::WeekdayNotChosen)?;
        let plan = self.plan.ok_or(ValidationError::SessionLengthNotChosen)?;

        if entry.weekday != weekday || entry.semester != self.transaction.semester {
            return Err(ValidationError::WeekUnavailable { week: entry.week, weekday });
        }
        if self.weeks.contains_key(&entry.week) {
            return Err(ValidationError::WeekAlreadySelected(entry.week));
        }
        if self.weeks.len() as u32 >= plan.required_weeks {
            return Err(ValidationError::WeekLimitReached { required: plan.required_weeks });
        }

        if entry.is_holiday() {
            log::warn!("Week {} of course {} falls on a holiday ({}).", entry.week, self.transaction.course_code, entry.holiday_name.as_deref().unwrap_or("holiday"));
        }
        self.weeks.insert(entry.week, WeekPlan::from_entry(entry));
        self.clear_weeks_where(|selected, target| selected > target);
        Ok(())
    }

    pub fn remove_week(&mut self, week: u32) -> Result<WeekPlan, ValidationError> {
        let removed = self.weeks.remove(&week).ok_or(ValidationError::WeekNotSelected(week))?;
        self.clear_weeks_where(|selected, target| selected > target);
        Ok(removed)
    }

    /// Returns whether the lesson is selected afterwards. Any change releases
    /// the week's room, which was chosen for the old lessons.
    pub fn toggle_lesson(&mut self, week: u32, lesson: u8) -> Result<bool, ValidationError> {
        if lesson == 0 || lesson > MAX_LESSON_INDEX {
            return Err(ValidationError::UnknownLesson(lesson));
        }
        let target = self.target_for(week).ok_or(ValidationError::WeekNotSelected(week))?;
        let week_plan = self.weeks.get_mut(&week).ok_or(ValidationError::WeekNotSelected(week))?;

        if week_plan.lessons.remove(&lesson) {
            week_plan.room = None;
            return Ok(false);
        }

        if let Some(holiday) = &week_plan.holiday_name {
            return Err(ValidationError::HolidayWeek { week, holiday: holiday.clone() });
        }
        if week_plan.lessons.len() as u32 >= target {
            return Err(ValidationError::LessonTargetReached { week, target });
        }

        week_plan.lessons.insert(lesson);
        week_plan.room = None;
        Ok(true)
    }

    /// Assigns a room to a week whose lessons are complete. Whether the room
    /// is free is checked by the caller against fresh occupancy.
    pub fn assign_room(&mut self, week: u32, room: RoomName) -> Result<(), ValidationError> {
        let target = self.target_for(week).ok_or(ValidationError::WeekNotSelected(week))?;
        let week_plan = self.weeks.get_mut(&week).ok_or(ValidationError::WeekNotSelected(week))?;

        if let Some(holiday) = &week_plan.holiday_name {
            return Err(ValidationError::HolidayWeek { week, holiday: holiday.clone() });
        }
        let selected = week_plan.lessons.len() as u32;
        if selected != target {
            return Err(ValidationError::LessonsIncomplete { week, selected, target });
        }

        week_plan.room = Some(room);
        Ok(())
    }

    pub fn clear_room(&mut self, week: u32) -> Result<(), ValidationError> {
        let week_plan = self.weeks.get_mut(&week).ok_or(ValidationError::WeekNotSelected(week))?;
        week_plan.room = None;
        Ok(())
    }

    pub fn phase(&self) -> CoursePhase {
        if self.weekday.is_none() {
            return CoursePhase::Empty;
        }
        let Some(plan) = self.plan else {
            return CoursePhase::DayChosen;
        };
        if (self.weeks.len() as u32) < plan.required_weeks {
            return CoursePhase::SessionLengthChosen;
        }
        if self.is_complete() {
            return CoursePhase::Complete;
        }
        if self.weeks.values().all(|week| week.lessons.is_empty() && week.room.is_none()) {
            return CoursePhase::WeeksChosen;
        }
        CoursePhase::PerWeekFilling
    }

    /// First reason the plan cannot be submitted, checked week by week in
    /// chronological order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.weekday.ok_or(ValidationError::WeekdayNotChosen)?;
        let plan = self.plan.ok_or(ValidationError::SessionLengthNotChosen)?;

        let selected = self.weeks.len() as u32;
        if selected != plan.required_weeks {
            return Err(ValidationError::WeekCountMismatch { selected, required: plan.required_weeks });
        }

        for (week, week_plan) in &self.weeks {
            if let Some(holiday) = &week_plan.holiday_name {
                return Err(ValidationError::HolidayWeek { week: *week, holiday: holiday.clone() });
            }

            let target = self.target_for(*week).unwrap_or(plan.per_session);
            let selected = week_plan.lessons.len() as u32;
            if selected != target {
                return Err(ValidationError::LessonsIncomplete { week: *week, selected, target });
            }
            if week_plan.room.is_none() {
                return Err(ValidationError::RoomMissing(*week));
            }
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }

    /// Inline reason for a disabled submit action.
    pub fn blocking_reason(&self) -> Option<String> {
        self.validate().err().map(|e| e.to_string())
    }

    /// One message per selected holiday week.
    pub fn holiday_messages(&self) -> Vec<String> {
        self.weeks
            .iter()
            .filter_map(|(week, plan)| plan.holiday_name.as_ref().map(|holiday| ValidationError::HolidayWeek { week: *week, holiday: holiday.clone() }.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::calendar_index::DayType;
    use crate::domain::utils::id::{CampusId, CourseCode, SemesterCode, TransactionId};

    const MONDAY: u8 = 1;
    const WEDNESDAY: u8 = 3;

    fn course(total_class_hours: u32) -> CourseTransaction {
        CourseTransaction {
            id: TransactionId::new("T-1"),
            course_code: CourseCode::new("CS101"),
            semester: SemesterCode::new("2025S"),
            campus: CampusId::new("Main"),
            max_headcount: 40,
            eligible_weekdays: BTreeSet::from([MONDAY, WEDNESDAY]),
            total_class_hours,
        }
    }

    fn entry(weekday: u8, week: u32) -> CalendarEntry {
        CalendarEntry {
            semester: SemesterCode::new("2025S"),
            weekday,
            week,
            date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap() + chrono::Duration::days(7 * (week as i64 - 1) + (weekday as i64 - 1)),
            day_type: DayType::Normal,
            holiday_name: None,
        }
    }

    fn holiday(weekday: u8, week: u32, name: &str) -> CalendarEntry {
        CalendarEntry { day_type: DayType::Holiday, holiday_name: Some(name.to_string()), ..entry(weekday, week) }
    }

    fn fill(state: &mut CourseArrangementState, week: u32) {
        let target = state.target_for(week).unwrap();
        let mut lesson = 1;
        while (state.get_week(week).unwrap().lessons.len() as u32) < target {
            if !state.get_week(week).unwrap().lessons.contains(&lesson) {
                state.toggle_lesson(week, lesson).unwrap();
            }
            lesson += 1;
        }
        state.assign_room(week, RoomName::new(format!("R{}", week))).unwrap();
    }

    fn filled_state(total: u32, per: u32, weeks: &[u32]) -> CourseArrangementState {
        let mut state = CourseArrangementState::new(course(total));
        state.select_weekday(MONDAY).unwrap();
        state.set_per_session(per).unwrap();
        for week in weeks {
            state.add_week(&entry(MONDAY, *week)).unwrap();
        }
        for week in weeks {
            fill(&mut state, *week);
        }
        state
    }

    #[test]
    fn test_phases_follow_selection() {
        let mut state = CourseArrangementState::new(course(6));
        assert_eq!(state.phase(), CoursePhase::Empty);

        state.select_weekday(MONDAY).unwrap();
        assert_eq!(state.phase(), CoursePhase::DayChosen);

        state.set_per_session(3).unwrap();
        assert_eq!(state.phase(), CoursePhase::SessionLengthChosen);

        state.add_week(&entry(MONDAY, 1)).unwrap();
        state.add_week(&entry(MONDAY, 2)).unwrap();
        assert_eq!(state.phase(), CoursePhase::WeeksChosen);

        state.toggle_lesson(1, 1).unwrap();
        assert_eq!(state.phase(), CoursePhase::PerWeekFilling);

        state.toggle_lesson(1, 2).unwrap();
        state.toggle_lesson(1, 3).unwrap();
        state.assign_room(1, RoomName::new("A101")).unwrap();
        fill(&mut state, 2);
        assert_eq!(state.phase(), CoursePhase::Complete);
        assert!(state.blocking_reason().is_none());
    }

    #[test]
    fn test_ineligible_weekday_is_rejected() {
        let mut state = CourseArrangementState::new(course(6));

        assert_eq!(state.select_weekday(5), Err(ValidationError::WeekdayNotEligible(5)));
        assert_eq!(state.get_weekday(), None);
    }

    #[test]
    fn test_switching_weekday_clears_all_weeks() {
        let mut state = filled_state(6, 3, &[1, 2]);
        assert!(state.is_complete());

        assert!(state.select_weekday(WEDNESDAY).unwrap());

        assert!(state.get_weeks().is_empty());
        assert_eq!(state.phase(), CoursePhase::SessionLengthChosen);
    }

    #[test]
    fn test_reselecting_same_weekday_keeps_weeks() {
        let mut state = filled_state(6, 3, &[1, 2]);

        assert!(!state.select_weekday(MONDAY).unwrap());
        assert!(state.is_complete());
    }

    #[test]
    fn test_week_limit() {
        let mut state = CourseArrangementState::new(course(6));
        state.select_weekday(MONDAY).unwrap();
        state.set_per_session(3).unwrap();

        state.add_week(&entry(MONDAY, 1)).unwrap();
        state.add_week(&entry(MONDAY, 2)).unwrap();

        assert_eq!(state.add_week(&entry(MONDAY, 3)), Err(ValidationError::WeekLimitReached { required: 2 }));
        assert_eq!(state.add_week(&entry(MONDAY, 2)), Err(ValidationError::WeekAlreadySelected(2)));

        state.remove_week(2).unwrap();
        state.add_week(&entry(MONDAY, 3)).unwrap();
        assert_eq!(state.get_weeks().keys().copied().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_week_of_other_weekday_is_rejected() {
        let mut state = CourseArrangementState::new(course(6));
        state.select_weekday(MONDAY).unwrap();
        state.set_per_session(3).unwrap();

        assert_eq!(state.add_week(&entry(WEDNESDAY, 1)), Err(ValidationError::WeekUnavailable { week: 1, weekday: MONDAY }));
    }

    #[test]
    fn test_weeks_require_weekday_and_session_length() {
        let mut state = CourseArrangementState::new(course(6));
        assert_eq!(state.add_week(&entry(MONDAY, 1)), Err(ValidationError::WeekdayNotChosen));

        state.select_weekday(MONDAY).unwrap();
        assert_eq!(state.add_week(&entry(MONDAY, 1)), Err(ValidationError::SessionLengthNotChosen));
    }

    #[test]
    fn test_last_week_takes_the_remainder() {
        let mut state = CourseArrangementState::new(course(7));
        state.select_weekday(MONDAY).unwrap();
        state.set_per_session(3).unwrap();
        for week in [4, 1, 2] {
            state.add_week(&entry(MONDAY, week)).unwrap();
        }

        assert_eq!(state.target_for(1), Some(3));
        assert_eq!(state.target_for(2), Some(3));
        assert_eq!(state.target_for(4), Some(1));

        state.toggle_lesson(4, 5).unwrap();
        assert_eq!(state.toggle_lesson(4, 6), Err(ValidationError::LessonTargetReached { week: 4, target: 1 }));
    }

    #[test]
    fn test_lesson_toggle_on_rejected_at_target_and_off_clears_room() {
        let mut state = filled_state(6, 3, &[1, 2]);

        assert_eq!(state.toggle_lesson(1, 9), Err(ValidationError::LessonTargetReached { week: 1, target: 3 }));

        assert!(!state.toggle_lesson(1, 2).unwrap());
        assert_eq!(state.get_week(1).unwrap().room, None);
        assert!(!state.is_complete());
        assert_eq!(state.validate(), Err(ValidationError::LessonsIncomplete { week: 1, selected: 2, target: 3 }));
    }

    #[test]
    fn test_room_requires_complete_lessons() {
        let mut state = CourseArrangementState::new(course(6));
        state.select_weekday(MONDAY).unwrap();
        state.set_per_session(3).unwrap();
        state.add_week(&entry(MONDAY, 1)).unwrap();
        state.toggle_lesson(1, 1).unwrap();

        assert_eq!(state.assign_room(1, RoomName::new("A101")), Err(ValidationError::LessonsIncomplete { week: 1, selected: 1, target: 3 }));
    }

    #[test]
    fn test_holiday_week_is_read_only_and_blocks_completion() {
        let mut state = CourseArrangementState::new(course(6));
        state.select_weekday(MONDAY).unwrap();
        state.set_per_session(3).unwrap();
        state.add_week(&entry(MONDAY, 1)).unwrap();
        state.add_week(&holiday(MONDAY, 2, "Spring Festival")).unwrap();

        assert_eq!(state.toggle_lesson(2, 1), Err(ValidationError::HolidayWeek { week: 2, holiday: "Spring Festival".to_string() }));
        assert_eq!(state.get_weeks().len(), 2);
        fill(&mut state, 1);

        assert!(!state.is_complete());
        assert_eq!(state.holiday_messages().len(), 1);
        assert!(state.blocking_reason().unwrap().contains("Spring Festival"));

        state.remove_week(2).unwrap();
        state.add_week(&entry(MONDAY, 3)).unwrap();
        fill(&mut state, 3);
        assert!(state.is_complete());
    }

    #[test]
    fn test_changing_session_length_clears_mismatched_weeks_and_rooms() {
        // 12 hours at 3 per session: four full weeks.
        let mut state = filled_state(12, 3, &[1, 2, 3, 4]);
        assert!(state.is_complete());

        // 12 hours at 4 per session: three weeks of 4, the latest week is dropped.
        state.set_per_session(4).unwrap();

        assert_eq!(state.get_weeks().len(), 3);
        for (week, plan) in state.get_weeks() {
            assert!(plan.lessons.is_empty(), "week {} kept lessons that no longer match", week);
            assert!(plan.room.is_none(), "week {} kept an orphaned room", week);
        }
        assert!(!state.is_complete());
    }

    #[test]
    fn test_changing_session_length_keeps_matching_weeks() {
        // 7 hours at 3: weeks 1, 2 take 3 and week 3 takes 1.
        let mut state = filled_state(7, 3, &[1, 2, 3]);
        assert!(state.is_complete());

        // 7 hours at 2: four weeks of 2, 2, 2, 1. Week 3 is still last and keeps its single lesson.
        state.set_per_session(2).unwrap();

        assert_eq!(state.get_session_plan().unwrap().required_weeks, 4);
        for week in [1, 2] {
            let plan = state.get_week(week).unwrap();
            assert!(plan.lessons.is_empty() && plan.room.is_none());
        }
        assert_eq!(state.get_week(3).unwrap().lessons.len(), 1);
        assert_eq!(state.get_week(3).unwrap().room, Some(RoomName::new("R3")));

        // Week 4 takes over the partial count; week 3 now needs 2 and loses its room.
        state.add_week(&entry(MONDAY, 4)).unwrap();
        assert_eq!(state.get_week(3).unwrap().lessons.len(), 1);
        assert_eq!(state.get_week(3).unwrap().room, None);

        for week in [1, 2, 3, 4] {
            fill(&mut state, week);
        }
        assert!(state.is_complete());
        assert_eq!(state.class_hours(), 7);
    }

    #[test]
    fn test_adding_later_week_clears_overfull_former_last_week() {
        let mut state = CourseArrangementState::new(course(7));
        state.select_weekday(MONDAY).unwrap();
        state.set_per_session(3).unwrap();
        state.add_week(&entry(MONDAY, 5)).unwrap();
        // Week 5 is the only week, so it takes the remainder of 1.
        state.toggle_lesson(5, 1).unwrap();
        state.add_week(&entry(MONDAY, 2)).unwrap();
        // Now week 2 is not last and takes 3; week 5 stays at 1 and keeps its lesson.
        assert_eq!(state.get_week(5).unwrap().lessons.len(), 1);

        fill(&mut state, 2);
        state.remove_week(5).unwrap();
        // Week 2 became last with target 1 but holds 3 lessons: cleared.
        let week = state.get_week(2).unwrap();
        assert!(week.lessons.is_empty());
        assert!(week.room.is_none());
    }

    #[test]
    fn test_complete_never_reported_with_wrong_lesson_count() {
        for total in 1..=12 {
            for per in 1..=4 {
                let plan = SessionPlan::compute(total, per).unwrap();
                let weeks: Vec<u32> = (1..=plan.required_weeks).collect();
                let mut state = filled_state(total, per, &weeks);
                assert!(state.is_complete());

                // Drop one lesson from every week in turn: never complete.
                for week in &weeks {
                    let lesson = *state.get_week(*week).unwrap().lessons.iter().next().unwrap();
                    state.toggle_lesson(*week, lesson).unwrap();
                    assert!(!state.is_complete(), "total={} per={} week={}", total, per, week);
                    state.toggle_lesson(*week, lesson).unwrap();
                    state.assign_room(*week, RoomName::new("R")).unwrap();
                }

                for (week, plan) in state.get_weeks() {
                    assert_eq!(Some(plan.lessons.len() as u32), state.target_for(*week));
                }
            }
        }
    }

    #[test]
    fn test_unknown_lesson_index() {
        let mut state = filled_state(6, 3, &[1, 2]);

        assert_eq!(state.toggle_lesson(1, 14), Err(ValidationError::UnknownLesson(14)));
        assert_eq!(state.toggle_lesson(1, 0), Err(ValidationError::UnknownLesson(0)));
    }
}
