use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalEndpoint {
    TableList,
    CourseSubmit,
    ExamSubmit,
    TransactionList,
}

impl PortalEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Self::TableList => "/table/list",
            Self::CourseSubmit => "/arrange/course/submit",
            Self::ExamSubmit => "/arrange/exam/submit",
            Self::TransactionList => "/arrange/transactions/list",
        }
    }

    pub fn method(&self) -> reqwest::Method {
        match self {
            Self::TableList => reqwest::Method::GET,
            _ => reqwest::Method::POST,
        }
    }
}

impl fmt::Display for PortalEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}
