//! Month calendar projection.
//!
//! A task lands on its `dueDate`, or failing that on the UTC day of its
//! `createdAt`. Tasks with neither are listed as unscheduled.

use chrono::{DateTime, Datelike, NaiveDate, Weekday};

use crate::errors::TaskError;
use crate::sort::sort_tasks_unified;
use crate::types::{Task, TimeValue};

/// One day cell.
#[derive(Clone, Debug, PartialEq)]
pub struct CalendarDay {
    /// The date.
    pub date: NaiveDate,
    /// Tasks on that date, unified-sorted.
    pub tasks: Vec<Task>,
}

/// A month grid.
#[derive(Clone, Debug, PartialEq)]
pub struct CalendarMonth {
    /// Year.
    pub year: i32,
    /// Month, 1-12.
    pub month: u32,
    /// One entry per day of the month, in order.
    pub days: Vec<CalendarDay>,
    /// Tasks with no date at all.
    pub unscheduled: Vec<Task>,
}

impl CalendarMonth {
    /// Bucket `tasks` into the given month. Tasks dated in other months are
    /// left out.
    pub fn build(year: i32, month: u32, tasks: &[Task]) -> Result<Self, TaskError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| TaskError::Validation(format!("invalid month {year}-{month}")))?;

        let mut days: Vec<CalendarDay> = first
            .iter_days()
            .take_while(|d| d.month() == month)
            .map(|date| CalendarDay {
                date,
                tasks: Vec::new(),
            })
            .collect();
        let mut unscheduled = Vec::new();

        for task in tasks {
            match task_day(task) {
                Some(date) if date.year() == year && date.month() == month => {
                    if let Some(day) = days.get_mut(date.day0() as usize) {
                        day.tasks.push(task.clone());
                    }
                }
                Some(_) => {}
                None => unscheduled.push(task.clone()),
            }
        }

        for day in &mut days {
            sort_tasks_unified(&mut day.tasks);
        }
        sort_tasks_unified(&mut unscheduled);

        Ok(Self {
            year,
            month,
            days,
            unscheduled,
        })
    }

    /// The cell for a 1-based day of the month.
    pub fn day(&self, day: u32) -> Option<&CalendarDay> {
        self.days.get(day.checked_sub(1)? as usize)
    }

    /// Weekday of the 1st, for laying out the grid.
    pub fn first_weekday(&self) -> Option<Weekday> {
        self.days.first().map(|d| d.date.weekday())
    }

    /// Number of dated tasks in the month.
    pub fn scheduled_count(&self) -> usize {
        self.days.iter().map(|d| d.tasks.len()).sum()
    }
}

/// The calendar day a task belongs to.
pub fn task_day(task: &Task) -> Option<NaiveDate> {
    if let Some(due) = task.due_date {
        return Some(due);
    }
    match task.created_at? {
        TimeValue::Timestamp(ts) => ts.to_datetime().map(|dt| dt.date_naive()),
        #[allow(clippy::cast_possible_truncation)]
        TimeValue::Number(millis) => {
            DateTime::from_timestamp_millis(millis as i64).map(|dt| dt.date_naive())
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn task(value: serde_json::Value) -> Task {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn builds_every_day_of_the_month() {
        let feb = CalendarMonth::build(2024, 2, &[]).unwrap();
        assert_eq!(feb.days.len(), 29);
        assert_eq!(feb.first_weekday(), Some(Weekday::Thu));
        assert_eq!(CalendarMonth::build(2023, 12, &[]).unwrap().days.len(), 31);
    }

    #[test]
    fn invalid_month_is_rejected() {
        assert_matches!(
            CalendarMonth::build(2024, 13, &[]),
            Err(TaskError::Validation(_))
        );
    }

    #[test]
    fn due_date_wins_over_created_at() {
        // 2024-03-10T00:00:00Z
        let t = task(json!({
            "id": "a", "dueDate": "2024-03-20", "createdAt": {"seconds": 1_710_028_800}
        }));
        assert_eq!(task_day(&t), NaiveDate::from_ymd_opt(2024, 3, 20));

        let month = CalendarMonth::build(2024, 3, &[t]).unwrap();
        assert_eq!(month.day(20).unwrap().tasks.len(), 1);
        assert!(month.day(10).unwrap().tasks.is_empty());
    }

    #[test]
    fn buckets_by_created_day_and_sorts_within_day() {
        let tasks = vec![
            task(json!({"id": "early", "createdAt": {"seconds": 1_710_028_800}})),
            task(json!({"id": "late", "createdAt": {"seconds": 1_710_050_000}})),
            task(json!({"id": "millis", "createdAt": 1_710_115_200_000_i64})),
            task(json!({"id": "april", "dueDate": "2024-04-01"})),
            task(json!({"id": "undated", "position": 1})),
        ];
        let month = CalendarMonth::build(2024, 3, &tasks).unwrap();

        let tenth: Vec<_> = month.day(10).unwrap().tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(tenth, ["late", "early"]);
        assert_eq!(month.day(11).unwrap().tasks[0].id.as_str(), "millis");
        assert_eq!(month.scheduled_count(), 3);
        assert_eq!(month.unscheduled.len(), 1);
        assert!(month.day(0).is_none());
        assert!(month.day(32).is_none());
    }
}
