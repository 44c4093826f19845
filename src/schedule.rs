//! Wall-clock update grid
//!
//! Updates happen on a grid of instants spaced `60 / updates_per_hour` minutes
//! apart and phase-shifted by `target_minute_of_hour`, e.g. 4 per hour at
//! minute 5 gives :05, :20, :35 and :50. All candidate instants are built with
//! calendar arithmetic from the start of the hour so day and month boundaries
//! need no special casing.

use chrono::{NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use embassy_time::Duration;

use crate::app_state::PowerMode;
use crate::config::ScheduleConfig;

/// How long after a grid instant an update still counts as due
pub const DUE_TOLERANCE_SECS: i64 = 60;

/// Hours of grid searched for the next instant
pub const LOOKAHEAD_HOURS: i64 = 2;

/// Upper bound on a single sleep
pub const MAX_SLEEP_SECS: i64 = 3 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleResult {
    pub next_update_instant: NaiveDateTime,
    /// Time until `next_update_instant`, clamped to `MAX_SLEEP_SECS`
    pub sleep_duration: Duration,
    /// Active mode only: a grid instant is waiting to be serviced
    pub is_due_now: bool,
    /// The grid instant that is due, to be handed back as `last_serviced`
    pub due_instant: Option<NaiveDateTime>,
}

/// Work out the next update for `mode` at local time `now`
///
/// `last_serviced` is the grid instant most recently acted on; it keeps an
/// instant from being reported due twice. It is ignored while sleeping.
pub fn compute_schedule(
    now: NaiveDateTime,
    config: ScheduleConfig,
    mode: PowerMode,
    last_serviced: Option<NaiveDateTime>,
) -> ScheduleResult {
    let config = config.for_mode(mode);

    let due_instant = match mode {
        PowerMode::Normal => latest_at_or_before(now, config).filter(|instant| {
            now.signed_duration_since(*instant) <= TimeDelta::seconds(DUE_TOLERANCE_SECS)
                && last_serviced.is_none_or(|serviced| serviced < *instant)
        }),
        PowerMode::LowPowerSleeping | PowerMode::LowPowerTemporaryWake => None,
    };

    let next_update_instant = next_after(now, config).unwrap_or_else(|| fallback_instant(now, config));

    ScheduleResult {
        next_update_instant,
        sleep_duration: sleep_between(now, next_update_instant),
        is_due_now: due_instant.is_some(),
        due_instant,
    }
}

/// Low-power schedule once every grid instant up to `serviced_through` has been fetched for
///
/// A fetch covers the instants up to `DUE_TOLERANCE_SECS` past it, so a timer
/// wake that fires a little early aims the next sleep at the instant after the
/// one it was meant for. `sleep_duration` is still measured from `now`.
pub fn compute_low_power_sleep(
    now: NaiveDateTime,
    config: ScheduleConfig,
    serviced_through: NaiveDateTime,
) -> ScheduleResult {
    let config = config.for_mode(PowerMode::LowPowerSleeping);
    let from = serviced_through.max(now);
    let next_update_instant = next_after(from, config).unwrap_or_else(|| fallback_instant(from, config));

    ScheduleResult {
        next_update_instant,
        sleep_duration: sleep_between(now, next_update_instant),
        is_due_now: false,
        due_instant: None,
    }
}

/// First low-power grid instant after `serviced_through` that is already due at `now`
pub fn missed_low_power_instant(
    now: NaiveDateTime,
    config: ScheduleConfig,
    serviced_through: NaiveDateTime,
) -> Option<NaiveDateTime> {
    let config = config.for_mode(PowerMode::LowPowerSleeping);
    let horizon = now + TimeDelta::seconds(DUE_TOLERANCE_SECS);
    next_after(serviced_through, config).filter(|instant| *instant <= horizon)
}

/// Start of the hour containing `now`
fn hour_floor(now: NaiveDateTime) -> NaiveDateTime {
    let time = NaiveTime::from_hms_opt(now.hour(), 0, 0).unwrap_or(NaiveTime::MIN);
    NaiveDateTime::new(now.date(), time)
}

/// Grid minutes inside one hour, ascending
fn grid_minutes(config: ScheduleConfig) -> impl Iterator<Item = i64> {
    let interval = config.interval_minutes() as i64;
    let phase = config.target_minute_of_hour as i64 % interval;
    (phase..60).step_by(interval as usize)
}

fn grid_in_hour(hour_start: NaiveDateTime, config: ScheduleConfig) -> impl Iterator<Item = NaiveDateTime> {
    grid_minutes(config).filter_map(move |minute| hour_start.checked_add_signed(TimeDelta::minutes(minute)))
}

/// Smallest grid instant strictly after `now`, within the look-ahead window
fn next_after(now: NaiveDateTime, config: ScheduleConfig) -> Option<NaiveDateTime> {
    let floor = hour_floor(now);
    (0..LOOKAHEAD_HOURS)
        .filter_map(|h| floor.checked_add_signed(TimeDelta::hours(h)))
        .flat_map(|hour_start| grid_in_hour(hour_start, config))
        .find(|instant| *instant > now)
}

/// Largest grid instant at or before `now`, looking back into the previous hour
fn latest_at_or_before(now: NaiveDateTime, config: ScheduleConfig) -> Option<NaiveDateTime> {
    let floor = hour_floor(now);
    [floor.checked_sub_signed(TimeDelta::hours(1)), Some(floor)]
        .into_iter()
        .flatten()
        .flat_map(|hour_start| grid_in_hour(hour_start, config))
        .filter(|instant| *instant <= now)
        .last()
}

/// "Next hour at the target minute", used if the grid search comes up empty
fn fallback_instant(now: NaiveDateTime, config: ScheduleConfig) -> NaiveDateTime {
    let offset = TimeDelta::hours(1) + TimeDelta::minutes(config.target_minute_of_hour as i64);
    hour_floor(now)
        .checked_add_signed(offset)
        .unwrap_or(now + TimeDelta::seconds(MAX_SLEEP_SECS))
}

fn sleep_between(now: NaiveDateTime, next: NaiveDateTime) -> Duration {
    let millis = next
        .signed_duration_since(now)
        .num_milliseconds()
        .clamp(0, MAX_SLEEP_SECS * 1000);
    Duration::from_millis(millis as u64)
}
