#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use core::cell::RefCell;

use embassy_executor::Spawner;
use embassy_net::{Runner, StackResources};
use embassy_sync::blocking_mutex::Mutex;
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::rng::Rng;
use esp_hal::rtc_cntl::{Rtc, wakeup_cause};
use esp_hal::timer::timg::TimerGroup;
use esp_radio::Controller;
use esp_radio::wifi::WifiDevice;
use log::info;

// Display-LCD panel specific imports
use embedded_hal_bus::spi::ExclusiveDevice;
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use mipidsi::interface::SpiInterface;
use mipidsi::{Builder as MipidsiBuilder, models::ILI9342CRgb565};

use uvwatch::PowerModeController;
use uvwatch::app_state::PersistentState;
use uvwatch::buttons::ButtonPad;
use uvwatch::render::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use uvwatch::storage::PersistentStateStore;
use uvwatch_firmware::clock::RtcClock;
use uvwatch_firmware::display::LcdScreen;
use uvwatch_firmware::net::{TcpState, WifiTransport};
use uvwatch_firmware::retained::RetainedRegion;
use uvwatch_firmware::secrets::device_config;
use uvwatch_firmware::wake::DeepSleep;
use uvwatch_firmware::{SharedRtc, flag, mk_static};

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // Read before anything else touches the RTC
    let cause = wakeup_cause();

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!(" Booting, wake cause {:?}", cause);

    let rtc: &'static SharedRtc = mk_static!(SharedRtc, Mutex::new(RefCell::new(Rtc::new(peripherals.LPWR))));

    // Buttons first so a held key is already visible to the classifier
    let mode_button = Input::new(peripherals.GPIO0, InputConfig::default().with_pull(Pull::Up));
    let location_button = Input::new(peripherals.GPIO14, InputConfig::default().with_pull(Pull::Up));

    // Persistence: retained RTC memory plus the flash flag
    let retained = RetainedRegion::take().expect("Retained region already taken");
    let flag_partition = flag::open(peripherals.FLASH).expect("Failed to open flag partition");
    let app_config = device_config();
    let store = PersistentStateStore::new(
        retained,
        flag_partition,
        PersistentState::with_defaults(&app_config),
    );

    // Configure and initialize the display

    // 1. Configure SPI bus
    let spi_bus = Spi::new(peripherals.SPI2, SpiConfig::default())
        .expect("Failed to configure SPI")
        .with_sck(peripherals.GPIO36)
        .with_mosi(peripherals.GPIO37);

    // 2. Create a dummy CS pin (we don't use hardware CS for this display)
    let cs = Output::new(peripherals.GPIO35, Level::High, OutputConfig::default());
    let spi_device = ExclusiveDevice::new_no_delay(spi_bus, cs).expect("Failed to create SPI device");

    // 3. Set up DC (Data/Command) pin
    let dc = Output::new(peripherals.GPIO34, Level::Low, OutputConfig::default());

    // 4. Create a buffer for SPI batching (larger = faster, uses more RAM)
    let mut spi_buffer = [0u8; 64];
    let di = SpiInterface::new(spi_device, dc, &mut spi_buffer);

    let display = MipidsiBuilder::new(ILI9342CRgb565, di)
        .display_size(DISPLAY_WIDTH as u16, DISPLAY_HEIGHT as u16)
        .init(&mut embassy_time::Delay)
        .expect("Failed to initialize display");

    // Backlight stays off until the controller decides the screen is needed
    let backlight = Output::new(peripherals.GPIO38, Level::Low, OutputConfig::default());
    let screen = LcdScreen::new(display, backlight);

    // Wi-Fi and network stack; association is deferred to the first request
    let radio = &*mk_static!(Controller<'static>, esp_radio::init().expect("Failed to initialize radio"));
    let (wifi_controller, interfaces) =
        esp_radio::wifi::new(radio, peripherals.WIFI, Default::default()).expect("Failed to initialize Wi-Fi");

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        mk_static!(StackResources<3>, StackResources::<3>::new()),
        seed,
    );
    spawner.spawn(net_task(runner)).ok();

    let tcp_state = mk_static!(TcpState, TcpState::new());
    let transport = WifiTransport::new(wifi_controller, stack, tcp_state, rtc);

    let buttons = ButtonPad::new(
        mode_button,
        location_button,
        app_config.timing.debounce(),
        app_config.timing.long_press(),
    );
    let controller = PowerModeController::new(app_config, transport, RtcClock::new(rtc), screen, store);

    controller.run(buttons, DeepSleep::new(rtc, cause)).await
}
