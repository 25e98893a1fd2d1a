use thiserror::Error;

/// Locally detected reasons why an arrangement step is refused or a plan
/// cannot be submitted. The `Display` text doubles as the inline reason
/// shown next to a disabled submit action.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No transaction is selected")]
    NoTransaction,

    #[error("Transaction {0} is not in the pending list")]
    UnknownTransaction(String),

    #[error("The selected transaction is not a {expected} transaction")]
    WrongTransactionKind { expected: &'static str },

    #[error("Weekday {0} is not eligible for this course")]
    WeekdayNotEligible(u8),

    #[error("Choose a weekday first")]
    WeekdayNotChosen,

    #[error("Choose the number of lessons per session first")]
    SessionLengthNotChosen,

    #[error("Cannot plan {total} class hours at {per_session} lessons per session")]
    InvalidClassHours { total: u32, per_session: u32 },

    #[error("All {required} required weeks are already selected")]
    WeekLimitReached { required: u32 },

    #[error("Week {0} is already selected")]
    WeekAlreadySelected(u32),

    #[error("Week {0} is not selected")]
    WeekNotSelected(u32),

    #[error("Week {week} has no calendar day on weekday {weekday}")]
    WeekUnavailable { week: u32, weekday: u8 },

    #[error("Week {week} falls on a holiday ({holiday}); choose a different week")]
    HolidayWeek { week: u32, holiday: String },

    #[error("Week {week} already holds its {target} lessons")]
    LessonTargetReached { week: u32, target: u32 },

    #[error("Lesson {0} does not exist in the timetable")]
    UnknownLesson(u8),

    #[error("Week {week} has {selected} of {target} lessons selected")]
    LessonsIncomplete { week: u32, selected: u32, target: u32 },

    #[error("Week {0} has no classroom assigned")]
    RoomMissing(u32),

    #[error("Classroom {room} is not free for this selection")]
    RoomNotAvailable { room: String },

    #[error("{selected} weeks selected but {required} are required")]
    WeekCountMismatch { selected: u32, required: u32 },

    #[error("The exam has no time window")]
    ExamWindowMissing,

    #[error("Selected rooms seat {selected}, at least {required} seats are required")]
    InsufficientCapacity { selected: u32, required: u32 },

    #[error("Occupancy changed on the server; refresh before submitting again")]
    OccupancyRefreshRequired,
}
