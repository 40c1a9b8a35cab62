// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::{TimeZone, Timelike};
use proptest::prelude::*;
use yare::parameterized;

fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0).unwrap()
}

#[parameterized(
    before_first_slot = { 8, 0, 10, 9, 0 },
    between_slots = { 10, 0, 10, 13, 0 },
    exactly_on_slot_skips_it = { 13, 0, 10, 17, 0 },
    just_before_last = { 16, 59, 10, 17, 0 },
    after_last_slot_rolls_over = { 20, 0, 11, 9, 0 },
)]
fn daily_picks_next_slot(hour: u32, minute: u32, day: u32, exp_hour: u32, exp_minute: u32) {
    let config = RecurrenceConfig::daily(["09:00", "13:00", "17:00"]);
    let next = next_fire_time(&config, at(10, hour, minute));
    assert_eq!(next, at(day, exp_hour, exp_minute));
}

#[test]
fn daily_single_slot_after_it_fires_tomorrow() {
    let config = RecurrenceConfig::daily(["09:00"]);
    assert_eq!(next_fire_time(&config, at(10, 20, 0)), at(11, 9, 0));
}

#[test]
fn daily_slots_need_not_be_sorted() {
    let config = RecurrenceConfig::daily(["17:00", "9:00", "13:00"]);
    assert_eq!(next_fire_time(&config, at(10, 10, 0)), at(10, 13, 0));
    assert_eq!(next_fire_time(&config, at(10, 18, 0)), at(11, 9, 0));
}

#[test]
fn daily_rolls_over_month_end() {
    let config = RecurrenceConfig::daily(["06:30"]);
    let now = Utc.with_ymd_and_hms(2026, 3, 31, 23, 0, 0).unwrap();
    let next = next_fire_time(&config, now);
    assert_eq!(next, Utc.with_ymd_and_hms(2026, 4, 1, 6, 30, 0).unwrap());
}

#[test]
fn daily_without_slots_falls_back_one_hour() {
    let config = RecurrenceConfig::daily(Vec::<String>::new());
    let now = at(10, 10, 17);
    assert_eq!(
        try_next_fire_time(&config, now),
        Err(RecurrenceError::NoTimeSlots)
    );
    assert_eq!(next_fire_time(&config, now), now + TimeDelta::hours(1));
}

#[parameterized(
    missing_colon = { "0900" },
    hour_out_of_range = { "24:00" },
    minute_out_of_range = { "12:60" },
    single_digit_minute = { "12:5" },
    words = { "noon" },
    empty = { "" },
)]
fn invalid_slot_falls_back(slot: &str) {
    let config = RecurrenceConfig::daily(["09:00", slot]);
    let now = at(10, 10, 0);
    assert!(matches!(
        try_next_fire_time(&config, now),
        Err(RecurrenceError::InvalidTimeSlot(_))
    ));
    assert_eq!(next_fire_time(&config, now), now + TimeDelta::hours(1));
}

#[test]
fn hourly_goes_to_top_of_next_hour() {
    let now = Utc.with_ymd_and_hms(2026, 3, 10, 10, 42, 13).unwrap()
        + TimeDelta::milliseconds(512);
    assert_eq!(next_fire_time(&RecurrenceConfig::hourly(), now), at(10, 11, 0));
}

#[test]
fn hourly_on_the_hour_still_moves_forward() {
    let now = at(10, 23, 0);
    assert_eq!(next_fire_time(&RecurrenceConfig::hourly(), now), at(11, 0, 0));
}

#[test]
fn custom_adds_interval_exactly() {
    let now = Utc.with_ymd_and_hms(2026, 3, 10, 10, 7, 31).unwrap();
    let next = next_fire_time(&RecurrenceConfig::custom(45), now);
    assert_eq!(next, now + TimeDelta::minutes(45));
}

#[parameterized(
    missing = { None },
    zero = { Some(0) },
)]
fn custom_without_interval_falls_back(interval: Option<u32>) {
    let config = RecurrenceConfig {
        custom_interval: interval,
        ..RecurrenceConfig::custom(1)
    };
    let now = at(10, 10, 0);
    assert_eq!(next_fire_time(&config, now), now + TimeDelta::hours(1));
}

#[test]
fn config_parses_from_toml() {
    let config: RecurrenceConfig = toml::from_str(
        r#"
        mode = "daily"
        times = ["09:00", "17:30"]
        "#,
    )
    .unwrap();
    assert_eq!(config.mode, RecurrenceMode::Daily);
    assert_eq!(config.times, vec!["09:00", "17:30"]);
    assert_eq!(config.timezone, "UTC");
}

#[test]
fn time_slot_displays_zero_padded() {
    assert_eq!(TimeSlot::parse("9:05").unwrap().to_string(), "09:05");
}

proptest! {
    #[test]
    fn hourly_is_whole_hour_and_after_now(secs in 0i64..4_000_000_000, millis in 0i64..1000) {
        let now = DateTime::from_timestamp(secs, 0).unwrap() + TimeDelta::milliseconds(millis);
        let next = next_fire_time(&RecurrenceConfig::hourly(), now);
        prop_assert!(next > now);
        prop_assert_eq!(next.minute(), 0);
        prop_assert_eq!(next.second(), 0);
        prop_assert_eq!(next.nanosecond(), 0);
        prop_assert!(next - now <= TimeDelta::hours(1));
    }

    #[test]
    fn custom_is_exact_offset(secs in 0i64..4_000_000_000, minutes in 1u32..10_000) {
        let now = DateTime::from_timestamp(secs, 0).unwrap();
        let next = next_fire_time(&RecurrenceConfig::custom(minutes), now);
        prop_assert_eq!(next - now, TimeDelta::minutes(i64::from(minutes)));
    }

    #[test]
    fn daily_is_within_a_day(secs in 0i64..4_000_000_000, hour in 0u32..24, minute in 0u32..60) {
        let now = DateTime::from_timestamp(secs, 0).unwrap();
        let slot = format!("{:02}:{:02}", hour, minute);
        let next = next_fire_time(&RecurrenceConfig::daily([slot]), now);
        prop_assert!(next > now);
        prop_assert!(next - now <= TimeDelta::days(1));
        prop_assert_eq!((next.hour(), next.minute()), (hour, minute));
    }
}
