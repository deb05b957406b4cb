use serde::Serialize;

/// One weekly meeting pattern of one course section, as it appears in the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseMeetingRecord {
    pub course_code: String,
    pub section: String,
    pub location: String,
    pub days: String,
    pub start_time: String,
    pub end_time: String,
    pub start_date: String,
    pub end_date: String,
    pub status: String,
    pub instructor: String,
    pub delivery_mode: String,
}

impl CourseMeetingRecord {
    /// Term letter plus 2-digit year, e.g. `F24`.
    pub fn semester_tag(&self) -> &str {
        self.section.get(..3).unwrap_or(&self.section)
    }

    /// Section number without the semester tag, e.g. `N02`.
    pub fn section_number(&self) -> &str {
        self.section.get(3..).unwrap_or("")
    }

    pub fn day_tokens(&self) -> impl Iterator<Item = &str> {
        self.days.split_whitespace()
    }
}
