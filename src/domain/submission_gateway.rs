use std::sync::Arc;

use chrono::NaiveDate;

use crate::api::arrange_dto::{CourseSubmitDto, ExamSubmitDto, SubmitResponseDto, WeekAssignmentDto};
use crate::domain::arrangement::course_arrangement::CourseArrangementState;
use crate::domain::arrangement::exam_arrangement::ExamArrangementState;
use crate::domain::arrangement::validation::ValidationError;
use crate::domain::remote::portal_endpoint::PortalEndpoint;
use crate::domain::remote::portal_store_trait::PortalStore;
use crate::domain::utils::id::ExamArrangementId;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseSubmitted {
    /// Class hours the server scheduled, for the confirmation message.
    pub class_hours: u32,
    pub booked_dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamSubmitted {
    pub arrangement_id: ExamArrangementId,
    pub capacity: u32,
    pub people: u32,
    pub booked_dates: Vec<NaiveDate>,
}

/// Sends complete plans to the submission endpoints.
///
/// The server re-checks occupancy atomically with the booking; a rejection
/// comes back as `Error::Conflict` carrying the server's reason verbatim.
#[derive(Debug, Clone)]
pub struct SubmissionGateway {
    store: Arc<dyn PortalStore>,
}

impl SubmissionGateway {
    pub fn new(store: Arc<dyn PortalStore>) -> Self {
        SubmissionGateway { store }
    }

    pub fn course_payload(state: &CourseArrangementState) -> Result<CourseSubmitDto> {
        state.validate()?;
        let weekday = state.get_weekday().ok_or(ValidationError::WeekdayNotChosen)?;

        let mut weeks = Vec::with_capacity(state.get_weeks().len());
        for (week, plan) in state.get_weeks() {
            let room = plan.room.as_ref().ok_or(ValidationError::RoomMissing(*week))?;
            weeks.push(WeekAssignmentDto { week: *week, lessons: plan.lessons.iter().map(|lesson| lesson.to_string()).collect(), classroom: room.to_string() });
        }

        Ok(CourseSubmitDto { courno: state.get_transaction().course_code.to_string(), selected_day: weekday, per_session_lessons: state.get_per_session(), weeks })
    }

    pub fn exam_payload(state: &ExamArrangementState) -> Result<ExamSubmitDto> {
        state.validate()?;
        Ok(ExamSubmitDto { setup_e_id: state.get_transaction().id.to_string(), classrooms: state.get_rooms().keys().map(|room| room.to_string()).collect() })
    }

    fn interpret(endpoint: PortalEndpoint, response: SubmitResponseDto) -> Result<SubmitResponseDto> {
        if response.success {
            return Ok(response);
        }

        let reason = response.message.unwrap_or_else(|| format!("{} rejected the arrangement without a reason", endpoint));
        log::warn!("Submission to {} rejected: {}", endpoint, reason);
        Err(Error::Conflict(reason))
    }

    pub async fn submit_course(&self, state: &CourseArrangementState) -> Result<CourseSubmitted> {
        let payload = Self::course_payload(state)?;
        log::info!("Submitting course {} on weekday {} over {} weeks.", payload.courno, payload.selected_day, payload.weeks.len());

        let response = Self::interpret(PortalEndpoint::CourseSubmit, self.store.submit_course(&payload).await?)?;
        let class_hours = response.classhour.unwrap_or_else(|| state.class_hours());

        log::info!("Course {} arranged: {} class hours scheduled.", payload.courno, class_hours);
        Ok(CourseSubmitted { class_hours, booked_dates: state.selected_dates() })
    }

    pub async fn submit_exam(&self, state: &ExamArrangementState) -> Result<ExamSubmitted> {
        let payload = Self::exam_payload(state)?;
        log::info!("Submitting exam {} with {} rooms.", payload.setup_e_id, payload.classrooms.len());

        let endpoint = PortalEndpoint::ExamSubmit;
        let response = Self::interpret(endpoint, self.store.submit_exam(&payload).await?)?;
        let Some(eno) = response.eno else {
            return Err(Error::Remote { endpoint: endpoint.to_string(), message: "accepted the exam but returned no arrangement id".to_string() });
        };

        let submitted = ExamSubmitted {
            arrangement_id: ExamArrangementId::new(eno),
            capacity: response.capacity.unwrap_or_else(|| state.capacity_sum()),
            people: response.people.unwrap_or(state.get_transaction().expected_headcount),
            booked_dates: state.get_transaction().window.map(|window| window.dates()).unwrap_or_default(),
        };
        log::info!("Exam {} arranged as {} ({} seats for {} people).", payload.setup_e_id, submitted.arrangement_id, submitted.capacity, submitted.people);
        Ok(submitted)
    }
}
