use crate::data::{
    Class, ClassId, Day, Lab, Level, MAX_WEEKLY_LOAD, Period, ScheduledLesson, SetupError,
    SlotType, Subject, SubjectId, TeacherId, TimeSlot, TimeSlotId, TimetableRun,
    TimetableSnapshot, UnallocatedLesson,
};
use itertools::Itertools;
use log::{info, trace, warn};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::time::Instant;

/// Monday's first period is the whole-school assembly.
const ASSEMBLY_DAY: Day = Day::Monday;
const ASSEMBLY_PERIOD: Period = 1;
/// Wednesday afternoons are reserved for clubs.
const CLUB_DAY: Day = Day::Wednesday;
const CLUB_FROM_PERIOD: Period = 7;
/// Ranked candidates tried before falling back to a plain grid scan.
const RANKED_ATTEMPTS: usize = 5;

/// One required teaching occurrence, bound to its teacher up front.
#[derive(Debug, Clone)]
struct LessonUnit {
    class_id: ClassId,
    subject_id: SubjectId,
    teacher_id: TeacherId,
    is_double: bool,
    is_practical: bool,
}

/// What occupies one (class, day, period) cell.
#[derive(Debug, Clone)]
struct PlacedLesson {
    subject_id: SubjectId,
    teacher_id: TeacherId,
    time_slot_id: TimeSlotId,
    is_double: bool,
}

/// The weekly slot grid for one level, in period order.
struct Grid<'a> {
    slots: Vec<&'a TimeSlot>,
    by_period: HashMap<Period, &'a TimeSlot>,
    last_period: Period,
    periods_per_day: u32,
}

impl<'a> Grid<'a> {
    fn new(mut slots: Vec<&'a TimeSlot>, periods_per_day: u32) -> Self {
        slots.sort_by_key(|s| s.period);
        let by_period: HashMap<Period, &TimeSlot> =
            slots.iter().map(|s| (s.period, *s)).collect();
        let last_period = slots.last().map(|s| s.period).unwrap_or(0);
        Grid {
            slots,
            by_period,
            last_period,
            periods_per_day,
        }
    }

    fn day_of(&self, period: Period) -> Day {
        Day::for_period(period, self.periods_per_day)
    }

    fn slot_at(&self, period: Period) -> Option<&'a TimeSlot> {
        self.by_period.get(&period).copied()
    }
}

/// Mutable occupancy bookkeeping for one generation run.
///
/// One state per run, owned by [`generate`] for the duration of the call.
/// Every successful placement goes through [`AllocatorState::occupy`].
#[derive(Debug, Default)]
struct AllocatorState {
    class_occupancy: HashMap<(ClassId, Day, Period), PlacedLesson>,
    teacher_periods: HashMap<(TeacherId, Day), HashSet<Period>>,
    teacher_weekly_load: HashMap<TeacherId, u32>,
    class_daily_subjects: HashMap<(ClassId, Day), HashSet<SubjectId>>,
    lab_periods: HashMap<(Lab, Day), HashSet<Period>>,
}

impl AllocatorState {
    fn teacher_busy(&self, teacher_id: TeacherId, day: Day, period: Period) -> bool {
        self.teacher_periods
            .get(&(teacher_id, day))
            .is_some_and(|periods| periods.contains(&period))
    }

    fn class_busy(&self, class_id: ClassId, day: Day, period: Period) -> bool {
        self.class_occupancy.contains_key(&(class_id, day, period))
    }

    fn lab_busy(&self, lab: Lab, day: Day, period: Period) -> bool {
        self.lab_periods
            .get(&(lab, day))
            .is_some_and(|periods| periods.contains(&period))
    }

    fn weekly_load(&self, teacher_id: TeacherId) -> u32 {
        self.teacher_weekly_load
            .get(&teacher_id)
            .copied()
            .unwrap_or(0)
    }

    fn subject_taught(&self, class_id: ClassId, day: Day, subject_id: SubjectId) -> bool {
        self.class_daily_subjects
            .get(&(class_id, day))
            .is_some_and(|subjects| subjects.contains(&subject_id))
    }

    fn occupy(
        &mut self,
        unit: &LessonUnit,
        lab: Option<Lab>,
        day: Day,
        period: Period,
        slot_id: TimeSlotId,
    ) {
        self.class_occupancy.insert(
            (unit.class_id, day, period),
            PlacedLesson {
                subject_id: unit.subject_id,
                teacher_id: unit.teacher_id,
                time_slot_id: slot_id,
                is_double: unit.is_double,
            },
        );
        self.teacher_periods
            .entry((unit.teacher_id, day))
            .or_default()
            .insert(period);
        *self.teacher_weekly_load.entry(unit.teacher_id).or_default() += 1;
        self.class_daily_subjects
            .entry((unit.class_id, day))
            .or_default()
            .insert(unit.subject_id);
        if let Some(lab) = lab {
            self.lab_periods.entry((lab, day)).or_default().insert(period);
        }
    }
}

/// Generates one timetable run from a reference snapshot.
pub fn generate(snapshot: &TimetableSnapshot) -> Result<TimetableRun, SetupError> {
    let start_time = Instant::now();

    // lookups
    let subject_map: HashMap<SubjectId, &Subject> =
        snapshot.subjects.iter().map(|s| (s.id, s)).collect();
    let class_map: HashMap<ClassId, &Class> =
        snapshot.classes.iter().map(|c| (c.id, c)).collect();
    let eligible: HashMap<(ClassId, SubjectId), Vec<TeacherId>> = snapshot
        .assignments
        .iter()
        .map(|a| ((a.class_id, a.subject_id), a.teacher_id))
        .into_group_map();

    validate_setup(snapshot, &subject_map)?;

    info!(
        "Building lesson requirements for {} classes, {} subjects, and {} teachers...",
        snapshot.classes.len(),
        snapshot.subjects.len(),
        snapshot.teachers.len()
    );
    let mut groups = build_lesson_units(snapshot, &eligible);
    trace!(
        "{} lesson units required across {} class-subject groups.",
        groups.iter().map(|(_, units)| units.len()).sum::<usize>(),
        groups.len()
    );

    // largest requirements first; placing them late tends to be infeasible
    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(&b.0)));

    // per-level grids, in period order
    let mut grids: HashMap<Level, Grid> = HashMap::new();
    for level in [Level::Grade10To12, Level::Form3To4] {
        let level_slots: Vec<&TimeSlot> = snapshot
            .time_slots
            .iter()
            .filter(|s| s.level == level)
            .collect();
        if !level_slots.is_empty() {
            grids.insert(level, Grid::new(level_slots, snapshot.periods_per_day));
        }
    }

    let mut state = AllocatorState::default();
    let mut unallocated = Vec::new();

    for ((class_id, subject_id), units) in &groups {
        let class = *class_map.get(class_id).unwrap();
        let subject = *subject_map.get(subject_id).unwrap();
        // validated at setup: every class level has a teachable grid
        let grid = grids.get(&class.level).unwrap();

        for unit in units {
            // rank the legal slots by soft score, best first
            let mut candidates: Vec<(&TimeSlot, i32)> = grid
                .slots
                .iter()
                .copied()
                .filter(|slot| placement_allowed(unit, subject, slot, grid, &state))
                .map(|slot| {
                    let score = placement_score(unit, subject, slot, grid, &state, &subject_map);
                    (slot, score)
                })
                .collect();
            candidates.sort_by_key(|(_, score)| Reverse(*score));

            let mut placed = false;
            for &(slot, score) in candidates.iter().take(RANKED_ATTEMPTS) {
                if try_place(&mut state, unit, subject, slot, grid) {
                    trace!(
                        "Placed subject {} for class {} at period {} (score {}).",
                        subject_id, class_id, slot.period, score
                    );
                    placed = true;
                    break;
                }
            }

            // fallback: first legal slot in grid order
            if !placed {
                for &slot in &grid.slots {
                    if slot.slot_type == SlotType::Lesson
                        && placement_allowed(unit, subject, slot, grid, &state)
                        && try_place(&mut state, unit, subject, slot, grid)
                    {
                        placed = true;
                        break;
                    }
                }
            }

            if !placed {
                let miss = UnallocatedLesson {
                    class_id: unit.class_id,
                    subject_id: unit.subject_id,
                    teacher_id: unit.teacher_id,
                    is_double: unit.is_double,
                };
                warn!("Could not place {}", miss);
                unallocated.push(miss);
            }
        }
    }

    let run = materialize(&state, unallocated);
    info!(
        "Generated {} lessons in {:.2?} ({} units unallocated).",
        run.lessons.len(),
        start_time.elapsed(),
        run.unallocated.len()
    );
    Ok(run)
}

/// Pre-allocation validation. Nothing is allocated unless all of this holds.
fn validate_setup(
    snapshot: &TimetableSnapshot,
    subject_map: &HashMap<SubjectId, &Subject>,
) -> Result<(), SetupError> {
    if snapshot.teachers.is_empty() {
        return Err(SetupError::NoTeachers);
    }
    if snapshot.classes.is_empty() {
        return Err(SetupError::NoClasses);
    }
    if snapshot.subjects.is_empty() {
        return Err(SetupError::NoSubjects);
    }
    if snapshot.time_slots.is_empty() {
        return Err(SetupError::NoTimeSlots);
    }

    // a subject cannot demand more double periods than its weekly total
    for subject in &snapshot.subjects {
        if subject.double_lessons_per_week * 2 > subject.max_lessons_per_week {
            return Err(SetupError::BadLessonCounts {
                subject: subject.name.clone(),
            });
        }
    }

    // assigned weekly load must fit under the cap before allocation starts
    for teacher in &snapshot.teachers {
        let load: u32 = snapshot
            .assignments
            .iter()
            .filter(|a| a.teacher_id == teacher.id)
            .filter_map(|a| subject_map.get(&a.subject_id))
            .map(|s| s.max_lessons_per_week)
            .sum();
        if load > MAX_WEEKLY_LOAD {
            return Err(SetupError::TeacherOverloaded {
                name: teacher.name.clone(),
                load,
            });
        }
    }

    // every class level needs teachable periods in its grid
    for class in &snapshot.classes {
        let teachable = snapshot
            .time_slots
            .iter()
            .any(|s| s.level == class.level && s.slot_type == SlotType::Lesson);
        if !teachable {
            return Err(SetupError::NoSlotsForLevel { level: class.level });
        }
    }

    Ok(())
}

/// Expands each eligible (class, subject) pair into its weekly lesson units.
///
/// Doubles are emitted before singles so the hardest units of a group are
/// placed while the grid is still open. When several teachers are assigned
/// to the pair, the lowest id owns every occurrence.
fn build_lesson_units(
    snapshot: &TimetableSnapshot,
    eligible: &HashMap<(ClassId, SubjectId), Vec<TeacherId>>,
) -> Vec<((ClassId, SubjectId), Vec<LessonUnit>)> {
    let mut groups = Vec::new();
    for class in &snapshot.classes {
        for subject in &snapshot.subjects {
            if !subject.offered_for.matches(class.level) {
                continue;
            }
            let Some(teacher_ids) = eligible.get(&(class.id, subject.id)) else {
                continue;
            };
            let Some(&teacher_id) = teacher_ids.iter().min() else {
                continue;
            };

            let doubles = subject.double_lessons_per_week;
            // non-negative per setup validation
            let singles = subject.max_lessons_per_week - doubles * 2;
            let unit = |is_double| LessonUnit {
                class_id: class.id,
                subject_id: subject.id,
                teacher_id,
                is_double,
                is_practical: subject.is_practical(),
            };
            let mut units = Vec::with_capacity((doubles + singles) as usize);
            units.extend((0..doubles).map(|_| unit(true)));
            units.extend((0..singles).map(|_| unit(false)));
            groups.push(((class.id, subject.id), units));
        }
    }
    groups
}

/// Hard constraint check. A placement in an accepted schedule must pass
/// every rule here; the scorer only ever ranks slots that do.
fn placement_allowed(
    unit: &LessonUnit,
    subject: &Subject,
    slot: &TimeSlot,
    grid: &Grid,
    state: &AllocatorState,
) -> bool {
    let day = grid.day_of(slot.period);
    let period = slot.period;

    // breaks and lunch are never assignable
    if slot.slot_type != SlotType::Lesson {
        return false;
    }
    if day == ASSEMBLY_DAY && period == ASSEMBLY_PERIOD {
        return false;
    }
    if day == CLUB_DAY && period >= CLUB_FROM_PERIOD {
        return false;
    }
    if state.teacher_busy(unit.teacher_id, day, period) {
        return false;
    }
    if state.class_busy(unit.class_id, day, period) {
        return false;
    }
    if state.weekly_load(unit.teacher_id) >= MAX_WEEKLY_LOAD {
        return false;
    }
    // a double must have a follow-on period on the same day
    if unit.is_double {
        match grid.slot_at(period + 1) {
            Some(_) if grid.day_of(period + 1) == day => {}
            _ => return false,
        }
    }
    if unit.is_practical && state.lab_busy(subject.lab(), day, period) {
        return false;
    }

    true
}

/// Soft constraint score for a legal candidate. Higher is preferred; the
/// values are comparative only, never normalized.
fn placement_score(
    unit: &LessonUnit,
    subject: &Subject,
    slot: &TimeSlot,
    grid: &Grid,
    state: &AllocatorState,
    subject_map: &HashMap<SubjectId, &Subject>,
) -> i32 {
    let day = grid.day_of(slot.period);
    let period = slot.period;
    let mut score = 0;

    // mathematics goes in the morning block
    if subject.name == "Mathematics" && period <= 4 {
        score += 10;
    }

    // spread the sciences across the week
    if subject.is_science() {
        let sciences_today = state
            .class_daily_subjects
            .get(&(unit.class_id, day))
            .map_or(0, |ids| {
                ids.iter()
                    .filter(|id| subject_map.get(id).is_some_and(|s| s.is_science()))
                    .count()
            });
        if sciences_today < 2 {
            score += 5;
        }
    }

    // discourage repeating a subject on the same day
    if !state.subject_taught(unit.class_id, day, unit.subject_id) {
        score += 5;
    }

    // keep a teacher's day contiguous
    if let Some(periods) = state.teacher_periods.get(&(unit.teacher_id, day)) {
        if periods.contains(&(period + 1)) || (period > 1 && periods.contains(&(period - 1))) {
            score += 8;
        }
    }

    // heavy subjects away from the last period
    if period != grid.last_period && subject.is_math_heavy() {
        score += 3;
    }

    score
}

/// Attempts to occupy the slot, plus the follow-on period for a double.
/// Either every affected cell is claimed or no state changes at all.
fn try_place(
    state: &mut AllocatorState,
    unit: &LessonUnit,
    subject: &Subject,
    slot: &TimeSlot,
    grid: &Grid,
) -> bool {
    let day = grid.day_of(slot.period);
    let lab = if unit.is_practical {
        Some(subject.lab())
    } else {
        None
    };

    let mut cells = vec![(slot.period, slot.id)];
    if unit.is_double {
        let next = slot.period + 1;
        let Some(next_slot) = grid.slot_at(next) else {
            return false;
        };
        // the follow-on period must itself be a teachable, free cell
        if next_slot.slot_type != SlotType::Lesson {
            return false;
        }
        if day == CLUB_DAY && next >= CLUB_FROM_PERIOD {
            return false;
        }
        if state.class_busy(unit.class_id, day, next)
            || state.teacher_busy(unit.teacher_id, day, next)
            || lab.is_some_and(|lab| state.lab_busy(lab, day, next))
        {
            return false;
        }
        cells.push((next, next_slot.id));
    }

    for (period, slot_id) in cells {
        state.occupy(unit, lab, day, period, slot_id);
    }
    true
}

/// Turns the accumulated occupancy map into the run's lesson rows, one per
/// occupied (class, day, period) cell, in canonical order.
fn materialize(state: &AllocatorState, unallocated: Vec<UnallocatedLesson>) -> TimetableRun {
    let mut lessons: Vec<ScheduledLesson> = state
        .class_occupancy
        .iter()
        .map(|(&(class_id, day, period), placed)| ScheduledLesson {
            class_id,
            day,
            period,
            subject_id: placed.subject_id,
            teacher_id: placed.teacher_id,
            time_slot_id: placed.time_slot_id,
            is_double: placed.is_double,
        })
        .collect();
    lessons.sort();
    TimetableRun {
        lessons,
        unallocated,
    }
}
