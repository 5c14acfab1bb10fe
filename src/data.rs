use serde::{Deserialize, Serialize};
use std::fmt;

// Type aliases for clarity
pub type TeacherId = u32;
pub type SubjectId = u32;
pub type ClassId = u32;
pub type TimeSlotId = u32;
pub type Period = u32;

/// Hard cap on periods a teacher may be scheduled for in one week.
pub const MAX_WEEKLY_LOAD: u32 = 30;

/// Grade band a class belongs to. Each band has its own weekly slot grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Level {
    #[serde(rename = "grade10-12")]
    Grade10To12,
    #[serde(rename = "form3-4")]
    Form3To4,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Grade10To12 => write!(f, "grade10-12"),
            Level::Form3To4 => write!(f, "form3-4"),
        }
    }
}

/// Which grade bands a subject is offered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum OfferedFor {
    #[serde(rename = "grade10-12")]
    Grade10To12,
    #[serde(rename = "form3-4")]
    Form3To4,
    #[serde(rename = "both")]
    Both,
}

impl OfferedFor {
    pub fn matches(&self, level: Level) -> bool {
        match self {
            OfferedFor::Both => true,
            OfferedFor::Grade10To12 => level == Level::Grade10To12,
            OfferedFor::Form3To4 => level == Level::Form3To4,
        }
    }
}

/// Classification of a grid period as teachable or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotType {
    Lesson,
    Break,
    TeaBreak,
    LunchBreak,
}

/// Weekday of the teaching week, derived from a slot's period number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl Day {
    /// Maps a period number onto the teaching week. Periods run 1..N across
    /// the whole week; anything past the Friday block stays on Friday.
    pub fn for_period(period: Period, periods_per_day: u32) -> Day {
        match period.saturating_sub(1) / periods_per_day.max(1) {
            0 => Day::Monday,
            1 => Day::Tuesday,
            2 => Day::Wednesday,
            3 => Day::Thursday,
            _ => Day::Friday,
        }
    }
}

/// A teacher employed by the school.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Teacher {
    pub id: TeacherId,
    pub name: String,
}

/// A taught subject with its weekly lesson requirements.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub max_lessons_per_week: u32,
    pub double_lessons_per_week: u32,
    pub offered_for: OfferedFor,
}

impl Subject {
    /// Science subjects get spread across the week by the scorer.
    pub fn is_science(&self) -> bool {
        matches!(self.name.as_str(), "Physics" | "Chemistry" | "Biology")
    }

    pub fn is_math_heavy(&self) -> bool {
        matches!(self.name.as_str(), "Mathematics" | "Physics" | "Chemistry")
    }

    /// Practical subjects need a lab, and a lab holds one class at a time.
    pub fn is_practical(&self) -> bool {
        matches!(
            self.name.as_str(),
            "Chemistry" | "Physics" | "Biology" | "Computer Science"
        )
    }

    pub fn lab(&self) -> Lab {
        match self.name.as_str() {
            "Chemistry" => Lab::Chemistry,
            "Physics" => Lab::Physics,
            "Biology" => Lab::Biology,
            "Computer Science" => Lab::Computer,
            _ => Lab::General,
        }
    }
}

/// Lab room shared across all classes of the school.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lab {
    Chemistry,
    Physics,
    Biology,
    Computer,
    General,
}

/// A class (stream) of students at one level.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Class {
    pub id: ClassId,
    pub name: String,
    pub level: Level,
}

/// Who may teach which subject to which class. At most one row per triple;
/// several teachers may be eligible for the same (subject, class).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAssignment {
    pub teacher_id: TeacherId,
    pub subject_id: SubjectId,
    pub class_id: ClassId,
}

/// One period of the weekly grid for a level. The same grid repeats
/// Monday to Friday; periods are numbered 1..N across the week.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub id: TimeSlotId,
    pub period: Period,
    pub level: Level,
    pub slot_type: SlotType,
    pub start_time: String,
    pub end_time: String,
}

/// Two subjects allowed to run in the same period across classes.
/// Loaded for compatibility; the allocator does not consult it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcurrentSubjectPair {
    pub subject_id: SubjectId,
    pub concurrent_subject_id: SubjectId,
}

/// Alternative-choice subjects; students take exactly one from a group.
/// Loaded for compatibility; the allocator does not consult it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokedGroup {
    pub name: String,
    pub level: Level,
    pub subject_ids: Vec<SubjectId>,
}

/// The complete reference snapshot for one school.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableSnapshot {
    pub teachers: Vec<Teacher>,
    pub subjects: Vec<Subject>,
    pub classes: Vec<Class>,
    pub assignments: Vec<SubjectAssignment>,
    pub time_slots: Vec<TimeSlot>,
    #[serde(default)]
    pub concurrent_subjects: Vec<ConcurrentSubjectPair>,
    #[serde(default)]
    pub stroked_groups: Vec<StrokedGroup>,
    /// How many periods of the grid fall on each weekday.
    #[serde(default = "default_periods_per_day")]
    pub periods_per_day: u32,
}

fn default_periods_per_day() -> u32 {
    2
}

/// A single placed lesson; one row per occupied (class, day, period) cell,
/// so a double lesson produces two adjacent rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledLesson {
    pub class_id: ClassId,
    pub day: Day,
    pub period: Period,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
    pub time_slot_id: TimeSlotId,
    pub is_double: bool,
}

/// A lesson requirement the allocator could not place anywhere legal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnallocatedLesson {
    pub class_id: ClassId,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
    pub is_double: bool,
}

impl fmt::Display for UnallocatedLesson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "subject {} for class {} (teacher {}){}",
            self.subject_id,
            self.class_id,
            self.teacher_id,
            if self.is_double { ", double" } else { "" }
        )
    }
}

/// The final output of one generation run. The caller commits it whole
/// or discards it whole; the engine itself persists nothing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimetableRun {
    pub lessons: Vec<ScheduledLesson>,
    pub unallocated: Vec<UnallocatedLesson>,
}

/// Fatal pre-allocation failure. Generation does not start at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    NoTeachers,
    NoClasses,
    NoSubjects,
    NoTimeSlots,
    TeacherOverloaded { name: String, load: u32 },
    NoSlotsForLevel { level: Level },
    BadLessonCounts { subject: String },
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetupError::NoTeachers => write!(f, "No teachers defined"),
            SetupError::NoClasses => write!(f, "No classes defined"),
            SetupError::NoSubjects => write!(f, "No subjects defined"),
            SetupError::NoTimeSlots => write!(f, "No time slots defined"),
            SetupError::TeacherOverloaded { name, load } => {
                write!(f, "Teacher {} exceeds max load ({}): {}", name, MAX_WEEKLY_LOAD, load)
            }
            SetupError::NoSlotsForLevel { level } => {
                write!(f, "No time slots for {}", level)
            }
            SetupError::BadLessonCounts { subject } => {
                write!(
                    f,
                    "Subject {} requires more double periods than its weekly total",
                    subject
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_mapping_covers_the_week() {
        assert_eq!(Day::for_period(1, 2), Day::Monday);
        assert_eq!(Day::for_period(2, 2), Day::Monday);
        assert_eq!(Day::for_period(3, 2), Day::Tuesday);
        assert_eq!(Day::for_period(6, 2), Day::Wednesday);
        assert_eq!(Day::for_period(8, 2), Day::Thursday);
        assert_eq!(Day::for_period(9, 2), Day::Friday);
        assert_eq!(Day::for_period(10, 2), Day::Friday);
        // past the Friday block stays on Friday
        assert_eq!(Day::for_period(12, 2), Day::Friday);
    }

    #[test]
    fn day_mapping_respects_periods_per_day() {
        assert_eq!(Day::for_period(3, 3), Day::Monday);
        assert_eq!(Day::for_period(4, 3), Day::Tuesday);
        assert_eq!(Day::for_period(7, 3), Day::Wednesday);
        assert_eq!(Day::for_period(5, 10), Day::Monday);
    }

    #[test]
    fn category_flags_derive_from_subject_name() {
        let chemistry = Subject {
            id: 1,
            name: "Chemistry".to_string(),
            max_lessons_per_week: 4,
            double_lessons_per_week: 1,
            offered_for: OfferedFor::Both,
        };
        assert!(chemistry.is_science());
        assert!(chemistry.is_math_heavy());
        assert!(chemistry.is_practical());
        assert_eq!(chemistry.lab(), Lab::Chemistry);

        let english = Subject {
            name: "English".to_string(),
            ..chemistry.clone()
        };
        assert!(!english.is_science());
        assert!(!english.is_math_heavy());
        assert!(!english.is_practical());
        assert_eq!(english.lab(), Lab::General);

        let mathematics = Subject {
            name: "Mathematics".to_string(),
            ..chemistry.clone()
        };
        assert!(!mathematics.is_science());
        assert!(mathematics.is_math_heavy());
        assert!(!mathematics.is_practical());

        let computing = Subject {
            name: "Computer Science".to_string(),
            ..chemistry
        };
        assert!(computing.is_practical());
        assert_eq!(computing.lab(), Lab::Computer);
    }

    #[test]
    fn offered_for_matches_levels() {
        assert!(OfferedFor::Both.matches(Level::Grade10To12));
        assert!(OfferedFor::Both.matches(Level::Form3To4));
        assert!(OfferedFor::Grade10To12.matches(Level::Grade10To12));
        assert!(!OfferedFor::Grade10To12.matches(Level::Form3To4));
        assert!(!OfferedFor::Form3To4.matches(Level::Grade10To12));
    }

    #[test]
    fn snapshot_deserializes_with_defaults() {
        let json = r#"{
            "teachers": [{"id": 1, "name": "A. Mwangi"}],
            "subjects": [{
                "id": 1,
                "name": "Mathematics",
                "maxLessonsPerWeek": 5,
                "doubleLessonsPerWeek": 0,
                "offeredFor": "both"
            }],
            "classes": [{"id": 1, "name": "Form 3 East", "level": "form3-4"}],
            "assignments": [{"teacherId": 1, "subjectId": 1, "classId": 1}],
            "timeSlots": [{
                "id": 1,
                "period": 1,
                "level": "form3-4",
                "slotType": "tea_break",
                "startTime": "10:00",
                "endTime": "10:30"
            }]
        }"#;
        let snapshot: TimetableSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.periods_per_day, 2);
        assert!(snapshot.concurrent_subjects.is_empty());
        assert!(snapshot.stroked_groups.is_empty());
        assert_eq!(snapshot.classes[0].level, Level::Form3To4);
        assert_eq!(snapshot.time_slots[0].slot_type, SlotType::TeaBreak);
    }

    #[test]
    fn setup_errors_carry_readable_reasons() {
        let err = SetupError::TeacherOverloaded {
            name: "B. Otieno".to_string(),
            load: 32,
        };
        assert_eq!(err.to_string(), "Teacher B. Otieno exceeds max load (30): 32");

        let err = SetupError::NoSlotsForLevel {
            level: Level::Form3To4,
        };
        assert_eq!(err.to_string(), "No time slots for form3-4");
        assert_eq!(SetupError::NoTeachers.to_string(), "No teachers defined");
    }

    #[test]
    fn scheduled_lessons_sort_by_class_then_day_then_period() {
        let row = |class_id, day, period| ScheduledLesson {
            class_id,
            day,
            period,
            subject_id: 1,
            teacher_id: 1,
            time_slot_id: period,
            is_double: false,
        };
        let mut rows = vec![
            row(2, Day::Monday, 1),
            row(1, Day::Friday, 9),
            row(1, Day::Monday, 2),
        ];
        rows.sort();
        assert_eq!(rows[0].class_id, 1);
        assert_eq!(rows[0].day, Day::Monday);
        assert_eq!(rows[1].day, Day::Friday);
        assert_eq!(rows[2].class_id, 2);
    }
}
