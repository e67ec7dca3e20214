use crate::models::{
    CalendarDay, CalendarResponse, DayRecord, HabitTotal, ReportResponse, Settings,
};
use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

const FOCUS_GOAL_SECS: u64 = 60 * 60;
const MAX_HEAT: u8 = 4;

/// Totals over the `range` days ending at `today`, inclusive.
pub fn build_report_at(
    today: NaiveDate,
    range: u32,
    days: &BTreeMap<String, DayRecord>,
    settings: &Settings,
) -> ReportResponse {
    let range = range.max(1);
    let logged: Vec<&DayRecord> = (0..range)
        .filter_map(|offset| days.get(&date_key(today - Duration::days(i64::from(offset)))))
        .collect();
    let days_logged = logged.len() as u32;

    let habits = settings
        .habits
        .iter()
        .map(|habit| {
            let total: u64 = logged.iter().map(|day| u64::from(day.count(&habit.id))).sum();
            let target = u64::from(habit.max) * u64::from(range);
            let rate = if target == 0 {
                0
            } else {
                ((total as f64 / target as f64) * 100.0).round().min(100.0) as u8
            };
            let avg = if days_logged == 0 {
                0.0
            } else {
                (total as f64 / f64::from(days_logged) * 10.0).round() / 10.0
            };
            HabitTotal {
                id: habit.id.clone(),
                label: habit.label.clone(),
                total,
                target,
                rate,
                avg,
            }
        })
        .collect();

    ReportResponse {
        range,
        days_logged,
        habits,
        total_focus_secs: logged.iter().map(|day| day.focus_secs()).sum(),
    }
}

/// One point per habit at its target plus one for an hour of focus, capped.
pub fn heat_level(day: &DayRecord, settings: &Settings) -> u8 {
    let habit_points = settings
        .habits
        .iter()
        .filter(|habit| habit.max > 0 && day.count(&habit.id) >= habit.max)
        .count();
    let focus_point = usize::from(day.focus_secs() >= FOCUS_GOAL_SECS);
    (habit_points + focus_point).min(usize::from(MAX_HEAT)) as u8
}

pub fn build_calendar(
    first_of_month: NaiveDate,
    days: &BTreeMap<String, DayRecord>,
    settings: &Settings,
) -> CalendarResponse {
    let first = first_of_month.with_day(1).unwrap_or(first_of_month);
    let calendar_days = first
        .iter_days()
        .take_while(|date| date.month() == first.month())
        .map(|date| {
            let key = date_key(date);
            let (level, focus_secs) = days
                .get(&key)
                .map(|day| (heat_level(day, settings), day.focus_secs()))
                .unwrap_or((0, 0));
            CalendarDay {
                date: key,
                level,
                focus_secs,
            }
        })
        .collect();

    CalendarResponse {
        month: first.format("%Y-%m").to_string(),
        days: calendar_days,
    }
}

/// Parses `YYYY-MM` into the first day of that month.
pub fn parse_month(month: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d").ok()
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Session;

    fn day(counts: &[(&str, u32)], focus: u64) -> DayRecord {
        let mut record = DayRecord::default();
        for (id, count) in counts {
            record.habits.insert(id.to_string(), *count);
        }
        if focus > 0 {
            record.time_logs.push(Session {
                id: 1,
                name: "Work".into(),
                color: None,
                duration: focus,
                timestamp: 0,
            });
        }
        record
    }

    #[test]
    fn report_counts_only_days_in_range() {
        let settings = Settings::default();
        let today = NaiveDate::from_ymd_opt(2026, 1, 7).unwrap();
        let mut days = BTreeMap::new();
        days.insert("2026-01-07".to_string(), day(&[("water", 8), ("impulse", 3)], 600));
        days.insert("2026-01-05".to_string(), day(&[("water", 4), ("impulse", 2)], 0));
        days.insert("2025-12-01".to_string(), day(&[("water", 8)], 9_000));

        let report = build_report_at(today, 7, &days, &settings);
        assert_eq!(report.days_logged, 2);
        assert_eq!(report.total_focus_secs, 600);

        let water = report.habits.iter().find(|h| h.id == "water").unwrap();
        assert_eq!(water.total, 12);
        assert_eq!(water.target, 56);
        assert_eq!(water.rate, 21);
        let impulse = report.habits.iter().find(|h| h.id == "impulse").unwrap();
        assert_eq!(impulse.avg, 2.5);
    }

    #[test]
    fn heat_level_caps_at_four() {
        let settings = Settings::default();
        let full = day(
            &[("water", 9), ("poop", 1), ("spine", 2), ("sleep", 1)],
            FOCUS_GOAL_SECS,
        );
        assert_eq!(heat_level(&full, &settings), 4);
        assert_eq!(heat_level(&day(&[("water", 7)], 3_599), &settings), 0);
        assert_eq!(heat_level(&day(&[], 3_600), &settings), 1);
    }

    #[test]
    fn calendar_covers_whole_month() {
        let settings = Settings::default();
        let mut days = BTreeMap::new();
        days.insert("2024-02-10".to_string(), day(&[("poop", 1)], 0));
        let calendar = build_calendar(parse_month("2024-02").unwrap(), &days, &settings);
        assert_eq!(calendar.month, "2024-02");
        assert_eq!(calendar.days.len(), 29);
        assert_eq!(calendar.days[9].level, 1);
        assert!(parse_month("2024-13").is_none());
    }
}
