
use arrangement_engine::api::table_dto::tables;
use arrangement_engine::domain::arrangement::course_arrangement::CoursePhase;
use arrangement_engine::domain::arrangement::validation::ValidationError;
use arrangement_engine::domain::session::arrangement_session::{ArrangementSession, SubmissionOutcome};
use arrangement_engine::domain::utils::id::RoomName;
use arrangement_engine::domain::utils::interval::TimeInterval;
use arrangement_engine::error::Error;
use portal_fixture::*;

fn names(rooms: &[arrangement_engine::domain::catalog::room_catalog::RoomAsset]) -> Vec<&str> {
    rooms.iter().map(|room| room.name.as_str()).collect()
}

async fn fill_week(session: &mut ArrangementSession, week: u32, lessons: &[u8]) {
    for lesson in lessons {
        assert!(session.toggle_lesson(week, *lesson).await.unwrap());
    }
}

async fn assign(session: &mut ArrangementSession, week: u32, room: &str) {
    let candidates = session.course_room_candidates(week).await.unwrap();
    session.assign_room(&candidates, &RoomName::new(room)).unwrap();
}

/// T-100 on Mondays, 3 lessons per session, weeks 1 and 2 with lessons 1-3.
async fn planned_course(store: &arrangement_engine::domain::remote::portal_store_mock::InMemoryPortalStore) -> ArrangementSession {
    let mut session = session_with(store, "T-100").await;
    session.select_weekday(MONDAY).unwrap();
    session.set_per_session(3).unwrap();
    session.select_week(1).await.unwrap();
    session.select_week(2).await.unwrap();
    fill_week(&mut session, 1, &[1, 2, 3]).await;
    fill_week(&mut session, 2, &[1, 2, 3]).await;
    session
}

#[tokio::test]
async fn test_phases_follow_the_selection() {
    let store = store();
    let mut session = session_with(&store, "T-100").await;
    assert_eq!(session.course_phase().unwrap(), CoursePhase::Empty);

    session.select_weekday(MONDAY).unwrap();
    assert_eq!(session.course_phase().unwrap(), CoursePhase::DayChosen);

    session.set_per_session(3).unwrap();
    assert_eq!(session.course_phase().unwrap(), CoursePhase::SessionLengthChosen);

    session.select_week(1).await.unwrap();
    session.select_week(2).await.unwrap();
    assert_eq!(session.course_phase().unwrap(), CoursePhase::WeeksChosen);

    session.toggle_lesson(1, 1).await.unwrap();
    assert_eq!(session.course_phase().unwrap(), CoursePhase::PerWeekFilling);
}

#[tokio::test]
async fn test_ineligible_weekday_is_refused() {
    let store = store();
    let mut session = session_with(&store, "T-100").await;

    let result = session.select_weekday(5);
    assert!(matches!(result, Err(Error::Validation(ValidationError::WeekdayNotEligible(5)))));
}

#[tokio::test]
async fn test_room_candidates_exclude_small_and_occupied_rooms() {
    let store = store();
    store.add_occupancy(booking("N101", monday(1), 8, 9)).unwrap();
    store.add_occupancy(booking("N201", monday(1), 12, 13)).unwrap();
    let session = planned_course(&store).await;

    let candidates = session.course_room_candidates(1).await.unwrap();

    // N301 seats 30 < 35, N101 overlaps lesson 1, N201 is booked after lesson 3 ends, N999 is inactive.
    assert_eq!(names(&candidates.value.rooms), vec!["N102", "N201"]);
    assert_eq!(candidates.value.date, monday(1));

    let week_two = session.course_room_candidates(2).await.unwrap();
    assert_eq!(names(&week_two.value.rooms), vec!["N101", "N102", "N201"]);
}

#[tokio::test]
async fn test_occupied_room_cannot_be_assigned() {
    let store = store();
    store.add_occupancy(booking("N101", monday(1), 8, 9)).unwrap();
    let mut session = planned_course(&store).await;

    let candidates = session.course_room_candidates(1).await.unwrap();
    let result = session.assign_room(&candidates, &RoomName::new("N101"));

    assert!(matches!(result, Err(Error::Validation(ValidationError::RoomNotAvailable { .. }))));
    assert_eq!(session.course_state().unwrap().get_week(1).unwrap().room, None);
}

#[tokio::test]
async fn test_week_resolved_under_old_weekday_is_stale() {
    let store = store();
    let mut session = session_with(&store, "T-100").await;
    session.select_weekday(MONDAY).unwrap();
    session.set_per_session(3).unwrap();

    let resolved = session.resolve_week(1).await.unwrap();
    assert_eq!(resolved.value.date, monday(1));

    session.select_weekday(WEDNESDAY).unwrap();
    assert!(matches!(session.add_week(resolved), Err(Error::StaleSelection)));
    assert!(session.course_state().unwrap().get_weeks().is_empty());

    session.select_week(1).await.unwrap();
    assert_eq!(session.course_state().unwrap().get_week(1).unwrap().date, wednesday(1));
}

#[tokio::test]
async fn test_candidates_for_old_lessons_are_stale() {
    let store = store();
    let mut session = planned_course(&store).await;

    let candidates = session.course_room_candidates(1).await.unwrap();
    session.toggle_lesson(1, 3).await.unwrap();
    session.toggle_lesson(1, 4).await.unwrap();

    assert!(matches!(session.assign_room(&candidates, &RoomName::new("N102")), Err(Error::StaleSelection)));
}

#[tokio::test]
async fn test_last_week_takes_the_remainder() {
    let store = store();
    let mut session = session_with(&store, "T-101").await;
    session.select_weekday(MONDAY).unwrap();
    session.set_per_session(3).unwrap();

    let plan = *session.course_state().unwrap().get_session_plan().unwrap();
    assert_eq!((plan.required_weeks, plan.last_week_count), (3, 1));

    for week in [3, 1, 2] {
        session.select_week(week).await.unwrap();
    }
    let result = session.select_week(4).await;
    assert!(matches!(result, Err(Error::Validation(ValidationError::WeekLimitReached { required: 3 }))));

    let state = session.course_state().unwrap();
    assert_eq!(state.target_for(1), Some(3));
    assert_eq!(state.target_for(3), Some(1));

    session.toggle_lesson(3, 1).await.unwrap();
    let result = session.toggle_lesson(3, 2).await;
    assert!(matches!(result, Err(Error::Validation(ValidationError::LessonTargetReached { week: 3, target: 1 }))));
}

#[tokio::test]
async fn test_holiday_week_blocks_submission() {
    let store = store();
    let mut session = session_with(&store, "T-100").await;
    session.select_weekday(MONDAY).unwrap();
    session.set_per_session(3).unwrap();
    session.select_week(1).await.unwrap();
    session.select_week(HOLIDAY_WEEK).await.unwrap();

    let state = session.course_state().unwrap();
    assert_eq!(state.holiday_messages().len(), 1);
    assert!(state.holiday_messages()[0].contains("Easter Monday"));

    let result = session.toggle_lesson(HOLIDAY_WEEK, 1).await;
    assert!(matches!(result, Err(Error::Validation(ValidationError::HolidayWeek { week: HOLIDAY_WEEK, .. }))));
    assert!(matches!(session.course_room_candidates(HOLIDAY_WEEK).await, Err(Error::Validation(ValidationError::HolidayWeek { .. }))));

    session.remove_week(HOLIDAY_WEEK).unwrap();
    session.select_week(6).await.unwrap();
    assert!(session.course_state().unwrap().holiday_messages().is_empty());
}

#[tokio::test]
async fn test_unknown_lesson_is_refused() {
    let store = store();
    let mut session = planned_course(&store).await;

    let result = session.toggle_lesson(1, 14).await;
    assert!(matches!(result, Err(Error::Validation(ValidationError::UnknownLesson(14)))));
}

#[tokio::test]
async fn test_complete_plan_is_submitted() {
    let store = store();
    store.add_occupancy(booking("N101", monday(1), 8, 9)).unwrap();
    let mut session = planned_course(&store).await;

    assign(&mut session, 1, "N102").await;
    assert!(!session.is_complete());
    assert_eq!(session.blocking_reason(), Some(ValidationError::RoomMissing(2).to_string()));

    assign(&mut session, 2, "N101").await;
    assert!(session.is_complete());
    assert_eq!(session.course_phase().unwrap(), CoursePhase::Complete);
    assert!(session.get_occupancy().is_cached(monday(1)));

    let outcome = session.submit().await.unwrap();
    let SubmissionOutcome::Course(submitted) = outcome else { panic!("expected a course submission") };
    assert_eq!(submitted.class_hours, 6);
    assert_eq!(submitted.booked_dates, vec![monday(1), monday(2)]);

    // Selection cleared, pending list reloaded without T-100.
    assert!(session.get_active().is_none());
    assert!(session.get_pending().iter().all(|transaction| transaction.id() != "T-100"));
    assert_eq!(store.pending_transaction_count(), 4);

    // The booked dates are fetched again and show the new bookings.
    assert!(!session.get_occupancy().is_cached(monday(1)));
    let lesson_two = TimeInterval::on_date(monday(2), lesson_time(2).0, lesson_time(2).1);
    let occupied = session.get_occupancy().occupied_rooms(monday(2), &[lesson_two]).await.unwrap();
    assert!(occupied.contains(&RoomName::new("N101")));
    assert_eq!(store.occupancy_on(monday(2)).unwrap().len(), 3);
}

#[tokio::test]
async fn test_incomplete_plan_is_not_sent() {
    let store = store();
    let mut session = planned_course(&store).await;
    assign(&mut session, 1, "N102").await;

    let result = session.submit().await;

    assert!(matches!(result, Err(Error::Validation(ValidationError::RoomMissing(2)))));
    assert_eq!(store.pending_transaction_count(), 5);
}

#[tokio::test]
async fn test_conflicting_booking_requires_refresh() {
    let store = store();
    let mut session = planned_course(&store).await;
    assign(&mut session, 1, "N102").await;
    assign(&mut session, 2, "N101").await;

    // Another arranger books N101 during lesson 2 of week 2.
    store.add_occupancy(booking("N101", monday(2), 9, 10)).unwrap();

    let Err(Error::Conflict(message)) = session.submit().await else { panic!("expected a conflict") };
    assert_eq!(message, "Classroom N101 is already occupied on 2025-03-10 from 09:00:00 to 10:00:00");

    // Plan kept, resubmission blocked.
    assert!(session.needs_occupancy_refresh());
    assert!(session.is_complete());
    assert_eq!(session.blocking_reason(), Some(ValidationError::OccupancyRefreshRequired.to_string()));
    assert!(matches!(session.submit().await, Err(Error::Validation(ValidationError::OccupancyRefreshRequired))));

    let released = session.refresh_occupancy().await.unwrap();
    assert_eq!(released, vec![RoomName::new("N101")]);
    assert!(!session.needs_occupancy_refresh());

    let state = session.course_state().unwrap();
    assert_eq!(state.get_week(1).unwrap().room, Some(RoomName::new("N102")));
    assert_eq!(state.get_week(2).unwrap().room, None);
    assert_eq!(state.get_week(2).unwrap().lessons.len(), 3);

    let candidates = session.course_room_candidates(2).await.unwrap();
    assert_eq!(names(&candidates.value.rooms), vec!["N102", "N201"]);
    session.assign_room(&candidates, &RoomName::new("N102")).unwrap();

    assert!(matches!(session.submit().await, Ok(SubmissionOutcome::Course(_))));
}

#[tokio::test]
async fn test_candidates_from_before_refresh_are_stale() {
    let store = store();
    let mut session = planned_course(&store).await;
    assign(&mut session, 1, "N102").await;
    let old_candidates = session.course_room_candidates(2).await.unwrap();
    session.assign_room(&old_candidates, &RoomName::new("N101")).unwrap();

    store.add_occupancy(booking("N101", monday(2), 9, 10)).unwrap();
    assert!(matches!(session.submit().await, Err(Error::Conflict(_))));

    // Candidates predating the rejection are refused right away.
    assert!(matches!(session.assign_room(&old_candidates, &RoomName::new("N101")), Err(Error::StaleSelection)));

    assert_eq!(session.refresh_occupancy().await.unwrap(), vec![RoomName::new("N101")]);
    assert!(matches!(session.assign_room(&old_candidates, &RoomName::new("N101")), Err(Error::StaleSelection)));
    assert_eq!(session.course_state().unwrap().get_week(2).unwrap().room, None);
    assert!(!session.is_complete());
}

#[tokio::test]
async fn test_prefetch_loads_every_selected_date_once() {
    let store = store();
    let session = planned_course(&store).await;

    session.prefetch_course_occupancy().await.unwrap();
    assert_eq!(store.fetch_count(tables::OCCUPANCY), 2);

    session.course_room_candidates(1).await.unwrap();
    session.course_room_candidates(2).await.unwrap();
    assert_eq!(store.fetch_count(tables::OCCUPANCY), 2);
}

#[tokio::test]
async fn test_offline_portal_reports_transient_failure() {
    let store = store();
    let mut session = session(&store);
    store.set_offline(true);

    let error = session.load_pending(1).await.unwrap_err();
    assert!(matches!(error, Error::Transient(_)));
    assert!(error.is_transient());
    assert!(session.get_pending().is_empty());

    store.set_offline(false);
    assert_eq!(session.load_pending(1).await.unwrap().len(), 5);
}
