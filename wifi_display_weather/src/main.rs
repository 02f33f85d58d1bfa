// ===============================================================================
// ESP32 Weather Display
// ===============================================================================
// Polls the OpenWeatherMap current-weather endpoint over plain HTTP and shows
// temperature, humidity, pressure, wind speed and wind direction on an ST7789
// TFT. The same values go to the serial console after every successful poll.
// ===============================================================================

use core::ptr::addr_of_mut;
use embedded_graphics::{
    mono_font::{iso_8859_1::FONT_10X20, MonoTextStyle},
    pixelcolor::Rgb565,
    prelude::*,
    text::Text,
};
use embedded_hal::digital::OutputPin as OutputPinTrait;
use embedded_hal::spi::SpiDevice;

// === HAL Imports ===
use esp_idf_hal::{
    delay::FreeRtos,
    gpio::{AnyIOPin, OutputPin, PinDriver},
    peripherals::Peripherals,
    prelude::*,
    spi::{config::Config, SpiDeviceDriver, SpiDriver, SpiDriverConfig},
};
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs::EspDefaultNvsPartition};
use log::*;
use mipidsi::{
    models::ST7789,
    options::{ColorInversion, ColorOrder},
    Builder,
};
use weather_station::presenter::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use weather_station::{Settings, Station, TcpConnector};

mod secrets;

// ===============================================================================
// WIFI SETUP
// ===============================================================================

/// Initialize and connect to Wi-Fi
///
/// # Arguments
/// * `modem` - ESP32 radio peripheral
/// * `settings` - Configuration containing Wi-Fi credentials
///
/// # Returns
/// * `Ok(BlockingWifi)` - Connected Wi-Fi instance
fn setup_wifi(
    modem: impl esp_idf_hal::peripheral::Peripheral<P = esp_idf_hal::modem::Modem> + 'static,
    settings: &Settings,
) -> anyhow::Result<BlockingWifi<EspWifi<'static>>> {
    info!("Connecting to {}", settings.wifi.ssid);

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let mut wifi = BlockingWifi::wrap(EspWifi::new(modem, sys_loop.clone(), Some(nvs))?, sys_loop)?;

    // Configure WiFi credentials
    let wifi_config = Configuration::Client(ClientConfiguration {
        ssid: settings
            .wifi
            .ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow::anyhow!("wifi.ssid is too long"))?,
        password: settings
            .wifi
            .password
            .as_str()
            .try_into()
            .map_err(|_| anyhow::anyhow!("wifi.password is too long"))?,
        auth_method: if settings.wifi.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        },
        ..Default::default()
    });

    wifi.set_configuration(&wifi_config)?;
    wifi.start()?;
    wifi.connect()?;
    wifi.wait_netif_up()?;

    let ip_info = wifi.wifi().sta_netif().get_ip_info()?;
    info!("WiFi connected, IP address: {:?}", ip_info.ip);
    Ok(wifi)
}

/// Reconnect Wi-Fi if the link dropped since the last cycle
fn ensure_wifi(wifi: &mut BlockingWifi<EspWifi<'static>>) -> anyhow::Result<()> {
    if !wifi.is_connected()? {
        warn!("WiFi disconnected, reconnecting...");
        wifi.connect()?;
        wifi.wait_netif_up()?;
        info!("WiFi reconnected");
    }
    Ok(())
}

// ===============================================================================
// DISPLAY SETUP
// ===============================================================================

/// Custom error type for SPI and GPIO operations
#[derive(Debug)]
struct CustomError;

impl embedded_hal::spi::Error for CustomError {
    fn kind(&self) -> embedded_hal::spi::ErrorKind {
        embedded_hal::spi::ErrorKind::Other
    }
}

impl embedded_hal::digital::Error for CustomError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

/// Wrapper for ESP-IDF SPI driver to work with embedded-hal traits
struct SpiWrapper<'a> {
    spi: SpiDeviceDriver<'a, SpiDriver<'a>>,
}

impl embedded_hal::spi::ErrorType for SpiWrapper<'_> {
    type Error = CustomError;
}

impl SpiDevice for SpiWrapper<'_> {
    fn transaction(
        &mut self,
        operations: &mut [embedded_hal::spi::Operation<'_, u8>],
    ) -> Result<(), Self::Error> {
        for op in operations {
            match op {
                embedded_hal::spi::Operation::Write(data) => {
                    if !data.is_empty() {
                        self.spi.write(data).map_err(|_| CustomError)?;
                    }
                }
                embedded_hal::spi::Operation::Transfer(read, write) => {
                    if !write.is_empty() {
                        self.spi.transfer(read, write).map_err(|_| CustomError)?;
                    }
                }
                embedded_hal::spi::Operation::TransferInPlace(data) => {
                    if !data.is_empty() {
                        let temp = data.to_vec();
                        self.spi.transfer(data, &temp).map_err(|_| CustomError)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Wrapper for Data/Command pin
struct DcPinWrapper<'a> {
    pin: PinDriver<'a, esp_idf_hal::gpio::AnyOutputPin, esp_idf_hal::gpio::Output>,
}

impl embedded_hal::digital::ErrorType for DcPinWrapper<'_> {
    type Error = CustomError;
}

impl OutputPinTrait for DcPinWrapper<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.pin.set_low().map_err(|_| CustomError)
    }
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.pin.set_high().map_err(|_| CustomError)
    }
}

// ===============================================================================
// MAIN PROGRAM
// ===============================================================================

fn main() -> anyhow::Result<()> {
    // Initialize ESP-IDF services
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    info!("=== ESP32 Weather Display Starting ===");

    // Load configuration from secrets.toml
    let settings = secrets::load()?;
    info!(
        "Location: {},{} via {}:{}",
        settings.openweather.city,
        settings.openweather.country_code,
        settings.openweather.host,
        settings.openweather.port
    );

    let peripherals = Peripherals::take()?;

    // === Initialize WiFi ===
    let mut wifi = setup_wifi(peripherals.modem, &settings)?;

    // === Initialize Display ===
    info!("Initializing display...");

    // Pin assignments
    let sclk = peripherals.pins.gpio18;
    let mosi = peripherals.pins.gpio23;
    let cs = peripherals.pins.gpio15;
    let dc = peripherals.pins.gpio21;
    let mut rst = PinDriver::output(peripherals.pins.gpio22)?;

    // Hardware reset sequence
    rst.set_low()?;
    FreeRtos::delay_ms(50);
    rst.set_high()?;
    FreeRtos::delay_ms(200);

    // Configure SPI bus
    let spi_config = Config::new().baudrate(26.MHz().into());
    let spi_driver = SpiDriver::new(
        peripherals.spi2,
        sclk,
        mosi,
        None::<AnyIOPin>,
        &SpiDriverConfig::new(),
    )?;
    let spi_device = SpiDeviceDriver::new(spi_driver, Some(cs), &spi_config)?;
    let spi_wrapper = SpiWrapper { spi: spi_device };
    let dc_wrapper = DcPinWrapper {
        pin: PinDriver::output(dc.downgrade_output())?,
    };

    // Initialize display driver
    static mut DISPLAY_BUFFER: [u8; 240 * 10 * 2] = [0u8; 240 * 10 * 2];
    let di = unsafe {
        mipidsi::interface::SpiInterface::new(
            spi_wrapper,
            dc_wrapper,
            &mut *addr_of_mut!(DISPLAY_BUFFER),
        )
    };

    let mut display = Builder::new(ST7789, di)
        .display_size(DISPLAY_WIDTH as u16, DISPLAY_HEIGHT as u16)
        .display_offset(0, 0)
        .color_order(ColorOrder::Rgb)
        .invert_colors(ColorInversion::Inverted)
        .init(&mut FreeRtos)
        .map_err(|e| anyhow::anyhow!("Display initialization failed: {:?}", e))?;

    display.clear(Rgb565::BLACK).ok();
    Text::new(
        "Waiting for data...",
        Point::new(10, 30),
        MonoTextStyle::new(&FONT_10X20, Rgb565::WHITE),
    )
    .draw(&mut display)
    .ok();
    info!("Display initialized successfully");

    // === Main Loop ===
    let mut station = Station::new(settings, TcpConnector, display, std::io::stdout());
    info!("Entering main loop");

    loop {
        // A failed reconnect is not fatal; the cycle below then fails to connect and is retried.
        if let Err(e) = ensure_wifi(&mut wifi) {
            error!("WiFi reconnect failed: {}", e);
        }

        // Errors are logged by the station; the next cycle starts after the sleep.
        station.tick(&mut FreeRtos).ok();
    }
}
