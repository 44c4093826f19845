//! End-to-end power-mode scenarios against mock collaborators

mod common;

use common::*;
use embassy_futures::block_on;
use embassy_time::Duration;

use uvwatch::Step;
use uvwatch::app_state::{FetchStatus, LocationSource, PowerMode};
use uvwatch::buttons::{ButtonEventKind, ButtonId};
use uvwatch::platform::WakeReason;
use uvwatch::power::{ControllerPhase, SuspendRequest};

/// Boot normally at `now`, switch to low power and let the confirmation run out
fn enter_low_power(now: chrono::NaiveDateTime) -> (TestController, SuspendRequest) {
    let mut controller = controller(MockNet::online(), MockClock::at(now), fresh_store());
    assert_eq!(block_on(controller.boot(WakeReason::ColdBoot, ms(0))), Step::Continue);

    let long = press(ButtonId::ModeToggle, ButtonEventKind::LongPressStart, ms(1_000));
    assert_eq!(block_on(controller.tick(ms(1_000), &[long])), Step::Continue);

    match block_on(controller.tick(ms(3_000), &[])) {
        Step::Suspend(request) => (controller, request),
        Step::Continue => panic!("Expected suspend once the confirmation elapsed"),
    }
}

#[test]
fn test_normal_boot_fetches_when_due() {
    let mut controller = controller(MockNet::online(), MockClock::at(local(14, 5, 10)), fresh_store());

    let step = block_on(controller.boot(WakeReason::ColdBoot, ms(0)));

    assert_eq!(step, Step::Continue);
    assert_eq!(controller.phase(), ControllerPhase::NormalActive);
    assert_eq!(controller.net_mut().forecast_requests(), 1);
    assert_eq!(controller.clock_mut().configured, [14400]);

    let state = controller.state();
    assert!(state.has_valid_forecast);
    assert_eq!(state.status, FetchStatus::Ok);
    assert_eq!(state.current_index, Some(7.5));
    assert_eq!(state.last_update_label.as_str(), "02:05 PM");
    assert_eq!(state.utc_offset_secs, Some(14400));
    for (i, slot) in state.forecast_slots.iter().enumerate() {
        let hour = 14 + i as u32;
        assert_eq!(slot.hour_of_day, Some(hour as u8));
        assert_eq!(slot.index, uv_at(hour).or(Some(0.0)));
    }

    assert!(controller.screen().is_on());
    assert_eq!(controller.screen().renders.len(), 1);
}

#[test]
fn test_normal_boot_without_forecast_fetches_even_when_not_due() {
    let mut controller = controller(MockNet::online(), MockClock::at(local(14, 7, 30)), fresh_store());

    block_on(controller.boot(WakeReason::ColdBoot, ms(0)));

    assert_eq!(controller.net_mut().forecast_requests(), 1);
    assert!(controller.state().has_valid_forecast);
}

#[test]
fn test_normal_boot_with_valid_forecast_skips_fetch_when_not_due() {
    let mut first = controller(MockNet::online(), MockClock::at(local(14, 5, 10)), fresh_store());
    block_on(first.boot(WakeReason::ColdBoot, ms(0)));

    let mut second = reset(first, MockNet::online(), MockClock::at(local(14, 7, 30)));
    block_on(second.boot(WakeReason::ColdBoot, ms(0)));

    assert_eq!(second.net_mut().requests.len(), 0);
    assert!(second.state().has_valid_forecast);
    assert_eq!(second.screen().renders.len(), 1, "Always renders in normal mode");
}

#[test]
fn test_scheduled_tick_refreshes_once_per_grid_instant() {
    let mut controller = controller(MockNet::online(), MockClock::at(local(14, 7, 30)), fresh_store());
    block_on(controller.boot(WakeReason::ColdBoot, ms(0)));
    assert_eq!(controller.net_mut().forecast_requests(), 1);

    controller.clock_mut().now = Some(local(14, 19, 59));
    block_on(controller.tick(ms(1_000), &[]));
    assert_eq!(controller.net_mut().forecast_requests(), 1, "Not due before the grid instant");

    controller.clock_mut().now = Some(local(14, 20, 5));
    block_on(controller.tick(ms(2_000), &[]));
    assert_eq!(controller.net_mut().forecast_requests(), 2);

    controller.clock_mut().now = Some(local(14, 20, 40));
    block_on(controller.tick(ms(3_000), &[]));
    assert_eq!(controller.net_mut().forecast_requests(), 2, "Grid instant already serviced");
}

#[test]
fn test_long_press_enters_low_power_and_suspends() {
    let (controller, request) = enter_low_power(local(14, 7, 30));

    // Low power runs one update per hour at minute 5
    assert_eq!(request.duration, Duration::from_secs(57 * 60 + 30));
    assert!(request.wake_on_button);
    assert_eq!(controller.state().power_mode, PowerMode::LowPowerSleeping);

    let messages = &controller.screen().messages;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, "Low power mode");
    assert_eq!(messages[0].1, "Next update 03:05 PM");

    let (_, _, _, mut store) = controller.into_parts();
    assert_eq!(store.read_power_mode_flag(), PowerMode::LowPowerSleeping);
}

#[test]
fn test_buttons_ignored_while_confirming() {
    let mut controller = controller(MockNet::online(), MockClock::at(local(14, 7, 30)), fresh_store());
    block_on(controller.boot(WakeReason::ColdBoot, ms(0)));

    let long = press(ButtonId::ModeToggle, ButtonEventKind::LongPressStart, ms(1_000));
    block_on(controller.tick(ms(1_000), &[long]));

    let short = press(ButtonId::ModeToggle, ButtonEventKind::ShortPress, ms(1_500));
    assert_eq!(block_on(controller.tick(ms(1_500), &[short])), Step::Continue);
    assert!(!controller.overlay_visible());
    assert!(matches!(controller.phase(), ControllerPhase::Confirming { .. }));
}

#[test]
fn test_timer_wake_refreshes_silently_and_sleeps_again() {
    let (controller, _) = enter_low_power(local(14, 7, 30));

    let mut controller = reset(controller, MockNet::online(), MockClock::at(local(15, 5, 0)));
    let step = block_on(controller.boot(WakeReason::Timer, ms(0)));

    assert_eq!(
        step,
        Step::Suspend(SuspendRequest {
            duration: Duration::from_secs(3600),
            wake_on_button: true,
        })
    );
    assert_eq!(controller.net_mut().forecast_requests(), 1);
    assert_eq!(controller.net_mut().geolocation_requests(), 0, "Silent refresh keeps coordinates");
    assert!(controller.screen().renders.is_empty(), "Silent refresh must not render");
    assert!(!controller.screen().power.contains(&true), "Screen stays off");

    assert_eq!(controller.state().forecast_slots[0].hour_of_day, Some(15));
    assert_eq!(controller.state().last_update_label.as_str(), "03:05 PM");

    let (_, _, _, mut store) = controller.into_parts();
    assert_eq!(store.read_power_mode_flag(), PowerMode::LowPowerSleeping);
    assert!(store.load().has_valid_forecast);
}

#[test]
fn test_button_wake_renders_persisted_forecast_without_fetch() {
    let (controller, _) = enter_low_power(local(14, 7, 30));

    let mut controller = reset(controller, MockNet::online(), MockClock::at(local(14, 40, 0)));
    let step = block_on(controller.boot(WakeReason::ButtonInput, ms(0)));

    assert_eq!(step, Step::Continue);
    assert_eq!(controller.net_mut().requests.len(), 0);
    assert!(controller.screen().is_on());
    assert_eq!(controller.state().power_mode, PowerMode::LowPowerTemporaryWake);

    let (rendered, overlay) = controller.screen().last_render();
    assert!(!overlay);
    assert_eq!(rendered.forecast_slots[0].hour_of_day, Some(14));

    assert_eq!(block_on(controller.tick(ms(29_000), &[])), Step::Continue);
    match block_on(controller.tick(ms(30_000), &[])) {
        Step::Suspend(request) => assert_eq!(request.duration, Duration::from_secs(25 * 60)),
        Step::Continue => panic!("Wake window should have elapsed"),
    }
}

#[test]
fn test_short_press_restarts_wake_window() {
    let (controller, _) = enter_low_power(local(14, 7, 30));
    let mut controller = reset(controller, MockNet::online(), MockClock::at(local(14, 40, 0)));
    block_on(controller.boot(WakeReason::ButtonInput, ms(0)));

    let short = press(ButtonId::ModeToggle, ButtonEventKind::ShortPress, ms(20_000));
    block_on(controller.tick(ms(20_000), &[short]));
    assert!(controller.overlay_visible());

    assert_eq!(block_on(controller.tick(ms(40_000), &[])), Step::Continue);

    let location = press(ButtonId::Location, ButtonEventKind::ShortPress, ms(45_000));
    assert_eq!(block_on(controller.tick(ms(45_000), &[location])), Step::Continue);
    assert_eq!(block_on(controller.tick(ms(74_000), &[])), Step::Continue);
    assert!(matches!(block_on(controller.tick(ms(75_000), &[])), Step::Suspend(_)));
}

#[test]
fn test_long_press_during_temporary_wake_returns_to_normal() {
    let (controller, _) = enter_low_power(local(14, 7, 30));
    let mut controller = reset(controller, MockNet::online(), MockClock::at(local(14, 40, 0)));
    block_on(controller.boot(WakeReason::ButtonInput, ms(0)));

    let long = press(ButtonId::ModeToggle, ButtonEventKind::LongPressStart, ms(5_000));
    assert_eq!(block_on(controller.tick(ms(5_000), &[long])), Step::Continue);

    assert_eq!(controller.phase(), ControllerPhase::NormalActive);
    assert_eq!(controller.state().power_mode, PowerMode::Normal);
    assert_eq!(controller.net_mut().forecast_requests(), 1, "Leaving low power fetches immediately");

    // Way past the wake window, still awake
    assert_eq!(block_on(controller.tick(ms(600_000), &[])), Step::Continue);

    let (_, _, _, mut store) = controller.into_parts();
    assert_eq!(store.read_power_mode_flag(), PowerMode::Normal);
}

#[test]
fn test_location_toggle_needs_overlay() {
    let mut controller = controller(MockNet::online(), MockClock::at(local(14, 7, 30)), fresh_store());
    block_on(controller.boot(WakeReason::ColdBoot, ms(0)));
    controller.net_mut().requests.clear();

    let long = press(ButtonId::Location, ButtonEventKind::LongPressStart, ms(1_000));
    block_on(controller.tick(ms(1_000), &[long]));
    assert_eq!(controller.state().location_source, LocationSource::FixedCoordinates);
    assert!(controller.net_mut().requests.is_empty());

    let overlay = press(ButtonId::ModeToggle, ButtonEventKind::ShortPress, ms(2_000));
    block_on(controller.tick(ms(2_000), &[overlay]));
    let long = press(ButtonId::Location, ButtonEventKind::LongPressStart, ms(4_000));
    block_on(controller.tick(ms(4_000), &[long]));

    let state = controller.state();
    assert_eq!(state.location_source, LocationSource::NetworkGeolocated);
    assert_eq!(state.location_label.as_str(), "Paris");
    assert_eq!(state.latitude, 48.8566);
    assert_eq!(controller.net_mut().geolocation_requests(), 1);
    assert_eq!(controller.net_mut().forecast_requests(), 1);
    assert!(controller.net_mut().requests[1].contains("latitude=48.8566&longitude=2.3522"));

    // And back to the configured coordinates
    let long = press(ButtonId::Location, ButtonEventKind::LongPressStart, ms(6_000));
    block_on(controller.tick(ms(6_000), &[long]));
    let state = controller.state();
    assert_eq!(state.location_source, LocationSource::FixedCoordinates);
    assert_eq!(state.location_label.as_str(), "Dubai");
    assert_eq!(controller.net_mut().geolocation_requests(), 1);
}

#[test]
fn test_network_failure_projects_fallback() {
    let mut controller = controller(MockNet::offline(), MockClock::at(local(21, 30, 0)), fresh_store());
    assert_eq!(block_on(controller.boot(WakeReason::ColdBoot, ms(0))), Step::Continue);

    let state = controller.state();
    assert_eq!(state.status, FetchStatus::NoConnection);
    assert_eq!(state.current_index, None);
    assert!(state.has_valid_forecast);
    assert_eq!(state.last_update_label.as_str(), "Never");
    let hours: Vec<Option<u8>> = state.forecast_slots.iter().map(|s| s.hour_of_day).collect();
    assert_eq!(hours, [Some(21), Some(22), Some(23), Some(0), Some(1), Some(2)]);
    assert!(state.forecast_slots.iter().all(|s| s.index == Some(0.0)));
}

#[test]
fn test_http_error_status_is_reported() {
    let mut net = MockNet::online();
    net.forecast = Reply::Respond(503, "Service Unavailable".to_string());
    let mut controller = controller(net, MockClock::at(local(9, 5, 0)), fresh_store());

    block_on(controller.boot(WakeReason::ColdBoot, ms(0)));

    assert_eq!(controller.state().status, FetchStatus::HttpError);
    assert_eq!(controller.state().status.label(), "HTTP Err");
}

#[test]
fn test_stalled_request_times_out() {
    let mut net = MockNet::online();
    net.forecast = Reply::Hang;
    let mut controller = controller(net, MockClock::at(local(9, 5, 0)), fresh_store());

    assert_eq!(block_on(controller.boot(WakeReason::ColdBoot, ms(0))), Step::Continue);
    assert_eq!(controller.state().status, FetchStatus::NoConnection);
}

#[test]
fn test_unknown_wall_clock_uses_fallback_sleep() {
    let mut store = fresh_store();
    store.write_power_mode_flag(PowerMode::LowPowerSleeping).unwrap();

    let mut controller = controller(MockNet::online(), MockClock::unset(), store);
    let step = block_on(controller.boot(WakeReason::Timer, ms(0)));

    assert_eq!(
        step,
        Step::Suspend(SuspendRequest {
            duration: Duration::from_secs(30 * 60),
            wake_on_button: true,
        })
    );
    assert!(!controller.state().has_valid_forecast);
    assert_eq!(controller.state().status, FetchStatus::TimeUnavailable);
}

#[test]
fn test_cold_boot_in_low_power_refreshes_then_stays_awake() {
    // Battery pull: retained memory is gone, flash still says low power
    let mut store = fresh_store();
    store.write_power_mode_flag(PowerMode::LowPowerSleeping).unwrap();

    let mut controller = controller(MockNet::online(), MockClock::at(local(10, 0, 0)), store);
    let step = block_on(controller.boot(WakeReason::ColdBoot, ms(0)));

    assert_eq!(step, Step::Continue);
    assert!(matches!(controller.phase(), ControllerPhase::TemporaryWake { .. }));
    assert_eq!(controller.net_mut().forecast_requests(), 1);
    assert!(controller.state().has_valid_forecast);
    assert!(controller.screen().is_on());
}

#[test]
fn test_learned_offset_is_reapplied_after_reset() {
    let (controller, _) = enter_low_power(local(14, 7, 30));

    let mut controller = reset(controller, MockNet::offline(), MockClock::at(local(15, 5, 0)));
    block_on(controller.boot(WakeReason::Timer, ms(0)));

    assert_eq!(controller.clock_mut().configured, [14400]);
}

#[test]
fn test_early_timer_wake_does_not_fetch_twice() {
    let (controller, _) = enter_low_power(local(14, 7, 30));

    // RTC slow clock ran fast, the 15:05 wake fires two seconds early
    let mut controller = reset(controller, MockNet::online(), MockClock::at(local(15, 4, 58)));
    let step = block_on(controller.boot(WakeReason::Timer, ms(0)));

    assert_eq!(
        step,
        Step::Suspend(SuspendRequest {
            duration: Duration::from_secs(3602),
            wake_on_button: true,
        }),
        "Sleeps through to 16:05 instead of waking again at 15:05"
    );
    assert_eq!(controller.net_mut().forecast_requests(), 1);
    assert_eq!(controller.state().forecast_slots[0].hour_of_day, Some(15));
}

#[test]
fn test_grid_instant_inside_wake_window_is_fetched_before_sleep() {
    let (controller, _) = enter_low_power(local(14, 7, 30));

    let mut controller = reset(controller, MockNet::online(), MockClock::at(local(15, 4, 50)));
    block_on(controller.boot(WakeReason::ButtonInput, ms(0)));
    assert_eq!(controller.net_mut().requests.len(), 0);

    controller.clock_mut().now = Some(local(15, 5, 20));
    match block_on(controller.tick(ms(30_000), &[])) {
        Step::Suspend(request) => assert_eq!(request.duration, Duration::from_secs(59 * 60 + 40)),
        Step::Continue => panic!("Wake window should have elapsed"),
    }

    assert_eq!(controller.net_mut().forecast_requests(), 1, "15:05 fell inside the window");
    assert_eq!(controller.state().last_update_label.as_str(), "03:05 PM");
    assert_eq!(controller.screen().renders.len(), 1, "Only the wake render, the catch-up is silent");
}

#[test]
fn test_slow_link_bring_up_is_not_cut_by_request_timeout() {
    // Longer than the 50 ms request timeout, inside the 400 ms connect budget
    let mut net = MockNet::online();
    net.link = Link::Slow(Duration::from_millis(150));
    let mut controller = controller(net, MockClock::at(local(14, 5, 10)), fresh_store());

    block_on(controller.boot(WakeReason::ColdBoot, ms(0)));

    assert_eq!(controller.net_mut().connects, 1);
    assert_eq!(controller.net_mut().forecast_requests(), 1);
    assert_eq!(controller.state().status, FetchStatus::Ok);
}

#[test]
fn test_stalled_link_bring_up_times_out_without_requesting() {
    let mut net = MockNet::online();
    net.link = Link::Hang;
    let mut controller = controller(net, MockClock::at(local(14, 5, 10)), fresh_store());

    assert_eq!(block_on(controller.boot(WakeReason::ColdBoot, ms(0))), Step::Continue);

    assert!(controller.net_mut().requests.is_empty());
    assert_eq!(controller.state().status, FetchStatus::NoConnection);
}
