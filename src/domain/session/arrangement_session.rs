use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::OnceCell;

use crate::api::arrange_dto::{TransactionDto, TransactionListRequestDto};
use crate::domain::arrangement::course_arrangement::{CourseArrangementState, CoursePhase};
use crate::domain::arrangement::exam_arrangement::{ExamArrangementState, ExamCapacityPolicy};
use crate::domain::arrangement::transaction::{Transaction, TransactionKind};
use crate::domain::arrangement::validation::ValidationError;
use crate::domain::catalog::calendar_index::{CalendarEntry, CalendarIndex};
use crate::domain::catalog::lesson_timetable::LessonTimetable;
use crate::domain::catalog::occupancy_resolver::{OccupancyResolver, RoomOrder};
use crate::domain::catalog::room_catalog::{RoomAsset, RoomCatalog};
use crate::domain::remote::http_portal_store::HttpPortalStore;
use crate::domain::remote::portal_store_trait::PortalStore;
use crate::domain::session::selection_tag::{SelectionTag, Tagged};
use crate::domain::submission_gateway::{CourseSubmitted, ExamSubmitted, SubmissionGateway};
use crate::domain::utils::id::{RoomName, TransactionId};
use crate::error::{Error, Result};
use crate::loader::config::ArrangementConfig;

/// Arrangement state of the selected transaction.
#[derive(Debug, Clone)]
pub enum ActiveArrangement {
    Course(CourseArrangementState),
    Exam(ExamArrangementState),
}

impl ActiveArrangement {
    pub fn kind(&self) -> TransactionKind {
        match self {
            ActiveArrangement::Course(_) => TransactionKind::Course,
            ActiveArrangement::Exam(_) => TransactionKind::Exam,
        }
    }

    pub fn transaction_id(&self) -> &TransactionId {
        match self {
            ActiveArrangement::Course(state) => &state.get_transaction().id,
            ActiveArrangement::Exam(state) => &state.get_transaction().id,
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        match self {
            ActiveArrangement::Course(state) => state.validate(),
            ActiveArrangement::Exam(state) => state.validate(),
        }
    }

    fn planned_dates(&self) -> Vec<NaiveDate> {
        match self {
            ActiveArrangement::Course(state) => state.selected_dates(),
            ActiveArrangement::Exam(state) => state.get_transaction().window.map(|window| window.occupancy_dates()).unwrap_or_default(),
        }
    }
}

/// Free rooms for one week, computed for the lessons it held at the time.
#[derive(Debug, Clone)]
pub struct RoomCandidates {
    pub week: u32,
    pub date: NaiveDate,
    pub lessons: BTreeSet<u8>,
    pub rooms: Vec<RoomAsset>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Course(CourseSubmitted),
    Exam(ExamSubmitted),
}

/// One arrangement session: a user working through pending transactions.
///
/// Caches live exactly as long as the session. Mutations take `&mut self`
/// and apply immediately; queries take `&self`, may run concurrently and
/// return `Tagged` results that are refused once the selection has moved on.
#[derive(Debug)]
pub struct ArrangementSession {
    config: ArrangementConfig,
    store: Arc<dyn PortalStore>,
    timetable: OnceCell<LessonTimetable>,
    calendar: CalendarIndex,
    occupancy: OccupancyResolver,
    rooms: RoomCatalog,
    gateway: SubmissionGateway,
    pending: Vec<TransactionDto>,
    pending_total: u64,
    pending_page: u32,
    active: Option<ActiveArrangement>,
    generation: u64,
    /// Dates whose occupancy the server contradicted; submission waits for a refresh.
    refresh_required: BTreeSet<NaiveDate>,
}

impl ArrangementSession {
    pub fn new(store: Arc<dyn PortalStore>, config: ArrangementConfig) -> Self {
        let limit = config.page_limit;

        ArrangementSession {
            calendar: CalendarIndex::new(store.clone(), limit),
            occupancy: OccupancyResolver::new(store.clone(), limit),
            rooms: RoomCatalog::new(store.clone(), limit),
            gateway: SubmissionGateway::new(store.clone()),
            timetable: OnceCell::new(),
            store,
            config,
            pending: Vec::new(),
            pending_total: 0,
            pending_page: 1,
            active: None,
            generation: 0,
            refresh_required: BTreeSet::new(),
        }
    }

    /// Session backed by the portal's HTTP API.
    pub fn connect(config: ArrangementConfig) -> Result<Self> {
        config.validate()?;
        let store = HttpPortalStore::new(&config)?;
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn get_config(&self) -> &ArrangementConfig {
        &self.config
    }

    pub fn get_occupancy(&self) -> &OccupancyResolver {
        &self.occupancy
    }

    pub fn get_calendar(&self) -> &CalendarIndex {
        &self.calendar
    }

    pub fn get_room_catalog(&self) -> &RoomCatalog {
        &self.rooms
    }

    pub fn get_active(&self) -> Option<&ActiveArrangement> {
        self.active.as_ref()
    }

    pub fn get_pending(&self) -> &[TransactionDto] {
        &self.pending
    }

    pub fn get_pending_total(&self) -> u64 {
        self.pending_total
    }

    pub fn needs_occupancy_refresh(&self) -> bool {
        !self.refresh_required.is_empty()
    }

    /// The lesson timetable, loaded on first use.
    pub async fn timetable(&self) -> Result<&LessonTimetable> {
        self.timetable.get_or_try_init(|| LessonTimetable::load(self.store.as_ref(), self.config.page_limit)).await
    }

    pub fn selection_tag(&self) -> SelectionTag {
        SelectionTag { transaction: self.active.as_ref().map(|active| active.transaction_id().clone()), generation: self.generation }
    }

    fn advance_generation(&mut self) {
        self.generation += 1;
    }

    fn ensure_current<T>(&self, result: &Tagged<T>) -> Result<()> {
        if result.is_current(&self.selection_tag()) {
            return Ok(());
        }
        log::warn!("Discarding result computed for {:?}; current selection is {:?}.", result.tag, self.selection_tag());
        Err(Error::StaleSelection)
    }

    fn course(&self) -> std::result::Result<&CourseArrangementState, ValidationError> {
        match &self.active {
            Some(ActiveArrangement::Course(state)) => Ok(state),
            Some(ActiveArrangement::Exam(_)) => Err(ValidationError::WrongTransactionKind { expected: "course" }),
            None => Err(ValidationError::NoTransaction),
        }
    }

    fn course_mut(&mut self) -> std::result::Result<&mut CourseArrangementState, ValidationError> {
        match &mut self.active {
            Some(ActiveArrangement::Course(state)) => Ok(state),
            Some(ActiveArrangement::Exam(_)) => Err(ValidationError::WrongTransactionKind { expected: "course" }),
            None => Err(ValidationError::NoTransaction),
        }
    }

    fn exam(&self) -> std::result::Result<&ExamArrangementState, ValidationError> {
        match &self.active {
            Some(ActiveArrangement::Exam(state)) => Ok(state),
            Some(ActiveArrangement::Course(_)) => Err(ValidationError::WrongTransactionKind { expected: "exam" }),
            None => Err(ValidationError::NoTransaction),
        }
    }

    fn exam_mut(&mut self) -> std::result::Result<&mut ExamArrangementState, ValidationError> {
        match &mut self.active {
            Some(ActiveArrangement::Exam(state)) => Ok(state),
            Some(ActiveArrangement::Course(_)) => Err(ValidationError::WrongTransactionKind { expected: "exam" }),
            None => Err(ValidationError::NoTransaction),
        }
    }

    pub fn course_state(&self) -> Result<&CourseArrangementState> {
        Ok(self.course()?)
    }

    pub fn exam_state(&self) -> Result<&ExamArrangementState> {
        Ok(self.exam()?)
    }

    //---------------------------
    // --- Pending transactions ---
    //---------------------------

    pub async fn load_pending(&mut self, page: u32) -> Result<&[TransactionDto]> {
        let request = TransactionListRequestDto { page: page.max(1), limit: self.config.page_limit, search: None };
        let result = self.store.list_transactions(&request).await?;

        log::debug!("Loaded page {} of pending transactions ({} of {}).", request.page, result.transactions.len(), result.total);
        self.pending = result.transactions;
        self.pending_total = result.total;
        self.pending_page = request.page;
        Ok(&self.pending)
    }

    /// Pending transactions matching `term`. Terms shorter than the configured
    /// minimum return nothing without a request.
    pub async fn search_pending(&self, term: &str) -> Result<Vec<TransactionDto>> {
        let term = term.trim();
        if term.chars().count() < self.config.min_search_length {
            return Ok(Vec::new());
        }

        let request = TransactionListRequestDto { page: 1, limit: self.config.page_limit, search: Some(term.to_string()) };
        Ok(self.store.list_transactions(&request).await?.transactions)
    }

    pub async fn search_rooms(&self, term: &str) -> Result<Vec<RoomAsset>> {
        self.rooms.search_rooms(term, self.config.min_search_length).await
    }

    /// Makes `id` (from the pending list) the active transaction. Any plan of
    /// the previous transaction is discarded.
    pub async fn select_transaction(&mut self, id: &str) -> Result<()> {
        let dto = self
            .pending
            .iter()
            .find(|transaction| transaction.id() == id)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownTransaction(id.to_string()))?;

        self.clear_selection();
        let transaction = Transaction::load(self.store.as_ref(), self.config.page_limit, dto).await?;

        let policy = ExamCapacityPolicy { multiplier: self.config.exam_capacity_multiplier };
        self.active = Some(match transaction {
            Transaction::Course(course) => {
                log::info!("Arranging course {} ({} class hours, up to {} students).", course.course_code, course.total_class_hours, course.max_headcount);
                ActiveArrangement::Course(CourseArrangementState::new(course))
            }
            Transaction::Exam(exam) => {
                log::info!("Arranging exam {} of course {} for {} students.", exam.id, exam.course_code, exam.expected_headcount);
                ActiveArrangement::Exam(ExamArrangementState::new(exam, policy))
            }
        });
        self.advance_generation();
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.active = None;
        self.refresh_required.clear();
        self.advance_generation();
    }

    pub fn is_complete(&self) -> bool {
        self.active.as_ref().map(|active| active.validate().is_ok()).unwrap_or(false)
    }

    /// Inline reason for a disabled submit action.
    pub fn blocking_reason(&self) -> Option<String> {
        if self.needs_occupancy_refresh() {
            return Some(ValidationError::OccupancyRefreshRequired.to_string());
        }
        match &self.active {
            None => Some(ValidationError::NoTransaction.to_string()),
            Some(active) => active.validate().err().map(|e| e.to_string()),
        }
    }

    //-------------------
    // --- Course flow ---
    //-------------------

    pub fn course_phase(&self) -> Result<CoursePhase> {
        Ok(self.course()?.phase())
    }

    pub fn select_weekday(&mut self, weekday: u8) -> Result<()> {
        if self.course_mut()?.select_weekday(weekday)? {
            self.advance_generation();
        }
        Ok(())
    }

    pub fn set_per_session(&mut self, per_session: u32) -> Result<()> {
        if self.course_mut()?.set_per_session(per_session)? {
            self.advance_generation();
        }
        Ok(())
    }

    /// Weeks of the semester falling on the chosen weekday.
    pub async fn available_weeks(&self) -> Result<Tagged<Vec<u32>>> {
        let tag = self.selection_tag();
        let state = self.course()?;
        let weekday = state.get_weekday().ok_or(ValidationError::WeekdayNotChosen)?;

        let weeks = self.calendar.available_weeks(&state.get_transaction().semester, weekday).await?;
        Ok(Tagged::new(tag, weeks))
    }

    pub async fn resolve_week(&self, week: u32) -> Result<Tagged<CalendarEntry>> {
        let tag = self.selection_tag();
        let state = self.course()?;
        let weekday = state.get_weekday().ok_or(ValidationError::WeekdayNotChosen)?;

        let entry = self.calendar.resolve(&state.get_transaction().semester, weekday, week).await?.ok_or(ValidationError::WeekUnavailable { week, weekday })?;
        Ok(Tagged::new(tag, entry))
    }

    pub fn add_week(&mut self, resolved: Tagged<CalendarEntry>) -> Result<()> {
        self.ensure_current(&resolved)?;
        self.course_mut()?.add_week(&resolved.into_inner())?;
        Ok(())
    }

    /// Resolves and adds `week` in one step.
    pub async fn select_week(&mut self, week: u32) -> Result<()> {
        let resolved = self.resolve_week(week).await?;
        self.add_week(resolved)
    }

    pub fn remove_week(&mut self, week: u32) -> Result<()> {
        self.course_mut()?.remove_week(week)?;
        Ok(())
    }

    pub async fn toggle_lesson(&mut self, week: u32, lesson: u8) -> Result<bool> {
        if !self.timetable().await?.contains(lesson) {
            return Err(ValidationError::UnknownLesson(lesson).into());
        }
        Ok(self.course_mut()?.toggle_lesson(week, lesson)?)
    }

    /// Fetches occupancy for every selected week's date concurrently.
    pub async fn prefetch_course_occupancy(&self) -> Result<()> {
        let dates = self.course()?.selected_dates();
        self.occupancy.prefetch(&dates).await
    }

    /// Rooms on the course's campus that seat the course and are free for
    /// the week's current lessons, tightest fit first.
    pub async fn course_room_candidates(&self, week: u32) -> Result<Tagged<RoomCandidates>> {
        let tag = self.selection_tag();
        let state = self.course()?;
        let week_plan = state.get_week(week).ok_or(ValidationError::WeekNotSelected(week))?;
        if let Some(holiday) = &week_plan.holiday_name {
            return Err(ValidationError::HolidayWeek { week, holiday: holiday.clone() }.into());
        }

        let intervals = self.timetable().await?.intervals_on(week_plan.date, &week_plan.lessons)?;
        let transaction = state.get_transaction();
        let eligible = self.rooms.rooms_for_campus(&transaction.campus).await?;
        let occupied = self.occupancy.occupied_rooms(week_plan.date, &intervals).await?;

        let rooms = OccupancyResolver::free_rooms(&eligible, &occupied, transaction.max_headcount, RoomOrder::TightestFirst);
        log::debug!("Week {} ({}): {} of {} rooms free for lessons {:?}.", week, week_plan.date, rooms.len(), eligible.len(), week_plan.lessons);

        Ok(Tagged::new(tag, RoomCandidates { week, date: week_plan.date, lessons: week_plan.lessons.clone(), rooms }))
    }

    pub fn assign_room(&mut self, candidates: &Tagged<RoomCandidates>, room: &RoomName) -> Result<()> {
        self.ensure_current(candidates)?;
        let week = candidates.value.week;

        let state = self.course_mut()?;
        let current_lessons = &state.get_week(week).ok_or(ValidationError::WeekNotSelected(week))?.lessons;
        if current_lessons != &candidates.value.lessons {
            log::warn!("Room candidates of week {} were computed for lessons {:?}, now {:?}.", week, candidates.value.lessons, current_lessons);
            return Err(Error::StaleSelection);
        }
        if !candidates.value.rooms.iter().any(|asset| &asset.name == room) {
            return Err(ValidationError::RoomNotAvailable { room: room.to_string() }.into());
        }

        state.assign_room(week, room.clone())?;
        Ok(())
    }

    //-----------------
    // --- Exam flow ---
    //-----------------

    /// Active rooms of every campus free during the exam window, largest first.
    pub async fn exam_room_candidates(&self) -> Result<Tagged<Vec<RoomAsset>>> {
        let tag = self.selection_tag();
        let window = self.exam()?.get_transaction().window.ok_or(ValidationError::ExamWindowMissing)?;

        let eligible = self.rooms.all_rooms().await?;
        let occupied = self.occupancy.occupied_rooms_during(&window).await?;

        let rooms = OccupancyResolver::free_rooms(&eligible, &occupied, 0, RoomOrder::LargestFirst);
        Ok(Tagged::new(tag, rooms))
    }

    /// Deselecting always works; selecting requires the room among `candidates`.
    pub fn toggle_exam_room(&mut self, candidates: &Tagged<Vec<RoomAsset>>, room: &RoomName) -> Result<bool> {
        let state = self.exam_mut()?;
        if state.remove_room(room) {
            return Ok(false);
        }

        self.ensure_current(candidates)?;
        let asset = candidates.value.iter().find(|asset| &asset.name == room).ok_or_else(|| ValidationError::RoomNotAvailable { room: room.to_string() })?;
        Ok(self.exam_mut()?.toggle_room(asset)?)
    }

    //------------------
    // --- Submission ---
    //------------------

    /// Submits the active plan. On success the booked dates are re-fetched on
    /// next use, the plan is cleared and the pending list reloaded. On a
    /// server rejection the plan is kept and resubmission waits for
    /// `refresh_occupancy`.
    pub async fn submit(&mut self) -> Result<SubmissionOutcome> {
        if self.needs_occupancy_refresh() {
            return Err(ValidationError::OccupancyRefreshRequired.into());
        }
        let active = self.active.as_ref().ok_or(ValidationError::NoTransaction)?;
        let planned_dates = active.planned_dates();

        let result = match active {
            ActiveArrangement::Course(state) => self.gateway.submit_course(state).await.map(SubmissionOutcome::Course),
            ActiveArrangement::Exam(state) => self.gateway.submit_exam(state).await.map(SubmissionOutcome::Exam),
        };

        match result {
            Ok(outcome) => {
                let booked = match &outcome {
                    SubmissionOutcome::Course(course) => &course.booked_dates,
                    SubmissionOutcome::Exam(exam) => &exam.booked_dates,
                };
                self.occupancy.invalidate(booked);
                self.clear_selection();

                if let Err(e) = self.load_pending(self.pending_page).await {
                    log::warn!("Arrangement submitted, but reloading pending transactions failed: {}", e);
                }
                Ok(outcome)
            }
            Err(e) if e.is_conflict() => {
                self.occupancy.invalidate(&planned_dates);
                self.refresh_required.extend(planned_dates);
                self.advance_generation();
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Re-fetches occupancy for every date of the active plan and releases
    /// rooms that are no longer free. Returns the released rooms. Candidates
    /// computed before the refresh are stale afterwards.
    pub async fn refresh_occupancy(&mut self) -> Result<Vec<RoomName>> {
        let mut dates: BTreeSet<NaiveDate> = self.refresh_required.clone();
        if let Some(active) = &self.active {
            dates.extend(active.planned_dates());
        }
        let dates: Vec<NaiveDate> = dates.into_iter().collect();

        self.occupancy.invalidate(&dates);
        self.occupancy.prefetch(&dates).await?;

        let mut taken_weeks: Vec<(u32, RoomName)> = Vec::new();
        let mut taken_exam_rooms: Vec<RoomName> = Vec::new();
        match &self.active {
            Some(ActiveArrangement::Course(state)) => {
                let timetable = self.timetable().await?;
                for (week, plan) in state.get_weeks() {
                    let Some(room) = &plan.room else { continue };
                    let intervals = timetable.intervals_on(plan.date, &plan.lessons)?;
                    if self.occupancy.occupied_rooms(plan.date, &intervals).await?.contains(room) {
                        taken_weeks.push((*week, room.clone()));
                    }
                }
            }
            Some(ActiveArrangement::Exam(state)) => {
                if let Some(window) = state.get_transaction().window {
                    let occupied = self.occupancy.occupied_rooms_during(&window).await?;
                    taken_exam_rooms = state.get_rooms().keys().filter(|room| occupied.contains(*room)).cloned().collect();
                }
            }
            None => {}
        }

        let mut released_rooms = Vec::new();
        match &mut self.active {
            Some(ActiveArrangement::Course(state)) => {
                for (week, room) in taken_weeks {
                    state.clear_room(week)?;
                    released_rooms.push(room);
                }
            }
            Some(ActiveArrangement::Exam(state)) => {
                for room in taken_exam_rooms {
                    state.remove_room(&room);
                    released_rooms.push(room);
                }
            }
            None => {}
        }

        for room in &released_rooms {
            log::info!("Room {} is no longer free and was released from the plan.", room);
        }
        self.refresh_required.clear();
        self.advance_generation();
        Ok(released_rooms)
    }
}
