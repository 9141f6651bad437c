use std::collections::HashSet;

use chrono::{DateTime, Datelike, Days, Utc, Weekday};

// 固定的星期与时段顺序，交集结果按这个顺序输出
pub const DAY_ORDER: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];
pub const TIME_ORDER: [&str; 3] = ["Morning", "Afternoon", "Evening"];

const WEEKDAYS: [&str; 5] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"];
const WEEKENDS: [&str; 2] = ["Saturday", "Sunday"];

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSchedule {
    pub days: Vec<String>,
    pub times: Vec<String>,
    pub next_event_time: Option<DateTime<Utc>>,
}

/// 求所有成员可用时间的交集，并给出下一个具体活动时间。
/// 某一维交集为空时 `next_event_time` 为 None，分组保持待定。
pub fn resolve(
    day_sets: &[Vec<String>],
    time_sets: &[Vec<String>],
    now: DateTime<Utc>,
) -> ResolvedSchedule {
    let days = common_days(day_sets);
    let times = common_times(time_sets);

    let next_event_time = match (days.first(), times.first()) {
        (Some(day), Some(time)) => next_occurrence(day, time, now),
        _ => None,
    };

    ResolvedSchedule {
        days,
        times,
        next_event_time,
    }
}

pub fn common_days(sets: &[Vec<String>]) -> Vec<String> {
    let expanded: Vec<HashSet<String>> = sets.iter().map(|s| expand_days(s)).collect();
    DAY_ORDER
        .iter()
        .filter(|day| expanded.iter().all(|set| set.contains(**day)))
        .map(|day| day.to_string())
        .collect()
}

pub fn common_times(sets: &[Vec<String>]) -> Vec<String> {
    let expanded: Vec<HashSet<String>> = sets.iter().map(|s| expand_times(s)).collect();
    TIME_ORDER
        .iter()
        .filter(|time| expanded.iter().all(|set| set.contains(**time)))
        .map(|time| time.to_string())
        .collect()
}

// 空集合视为不限；Weekdays/Weekends 展开，其余按字面保留
fn expand_days(tokens: &[String]) -> HashSet<String> {
    if tokens.is_empty() {
        return DAY_ORDER.iter().map(|d| d.to_string()).collect();
    }

    let mut set = HashSet::new();
    for token in tokens {
        match token.as_str() {
            "Weekdays" => set.extend(WEEKDAYS.iter().map(|d| d.to_string())),
            "Weekends" => set.extend(WEEKENDS.iter().map(|d| d.to_string())),
            other => {
                set.insert(other.to_string());
            }
        }
    }
    set
}

fn expand_times(tokens: &[String]) -> HashSet<String> {
    if tokens.is_empty() {
        return TIME_ORDER.iter().map(|t| t.to_string()).collect();
    }
    tokens.iter().cloned().collect()
}

fn weekday_from_token(token: &str) -> Option<Weekday> {
    Some(match token {
        "Sunday" => Weekday::Sun,
        "Monday" => Weekday::Mon,
        "Tuesday" => Weekday::Tue,
        "Wednesday" => Weekday::Wed,
        "Thursday" => Weekday::Thu,
        "Friday" => Weekday::Fri,
        "Saturday" => Weekday::Sat,
        _ => return None,
    })
}

fn hour_for_token(token: &str) -> u32 {
    match token {
        "Morning" => 9,
        "Afternoon" => 13,
        "Evening" => 18,
        _ => 12,
    }
}

// 今天及之后第一个匹配的日期；当天星期匹配就用当天
fn next_occurrence(day: &str, time: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let wanted = weekday_from_token(day)?;
    let today = now.date_naive();
    let delta =
        (wanted.num_days_from_sunday() + 7 - today.weekday().num_days_from_sunday()) % 7;
    let date = today.checked_add_days(Days::new(u64::from(delta)))?;
    Some(date.and_hms_opt(hour_for_token(time), 0, 0)?.and_utc())
}
