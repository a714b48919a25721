use std::{sync::atomic::AtomicBool, thread, time::Duration};

use anyhow::Context;
use embedded_svc::{
    http::{client::Client as HttpClient, Headers, Method, Status},
    io::Read,
    wifi::{AuthMethod, ClientConfiguration, Configuration},
};
use esp_idf_hal::{
    adc::{
        attenuation,
        oneshot::{config::AdcChannelConfig, AdcChannelDriver, AdcDriver},
        ADC1,
    },
    gpio::{AnyIOPin, Gpio4, IOPin, Input, PinDriver, Pull},
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    http::client::{Configuration as HttpClientConfiguration, EspHttpConnection},
    io::EspIOError,
    log::EspLogger,
    nvs::EspDefaultNvsPartition,
    wifi::{BlockingWifi, EspWifi},
};
use log::{error, info, warn};

use reporter_common::{
    config::{
        BUTTON_PIN, HTTP_TIMEOUT, MAX_RESPONSE_BODY, STARTUP_DELAY, TEMP_SENSOR_CHANNEL,
        WIFI_CONNECT_TIMEOUT, WIFI_PASSWORD, WIFI_SSID,
    },
    wifi, ButtonInput, HttpReporter, Poller, ReporterConfig, Response, SensorError,
    TemperatureSensor, Transport, TransportError, WifiCredentials, WifiError, WifiLink,
};

const READ_CHUNK_SIZE: usize = 256;

/// Temperature sensor on ADC1 channel 4 (GPIO4 on the ESP32-C3).
///
/// GPIO4 is an external pin, not the chip's internal sensor. It needs an
/// analog sensor whose output follows the 0.706 V @ 27 °C, -1.721 mV/°C line
/// the conversion assumes; anything else wired there reads as garbage.
struct AdcTemperatureSensor {
    channel: AdcChannelDriver<'static, Gpio4, AdcDriver<'static, ADC1>>,
}

impl AdcTemperatureSensor {
    fn new(adc: ADC1, pin: Gpio4) -> anyhow::Result<Self> {
        let driver = AdcDriver::new(adc)?;
        let config = AdcChannelConfig {
            attenuation: attenuation::DB_11,
            ..Default::default()
        };
        let channel = AdcChannelDriver::new(driver, pin, &config)?;
        info!("temperature sensor ready on ADC1 channel {TEMP_SENSOR_CHANNEL}");
        Ok(Self { channel })
    }
}

impl TemperatureSensor for AdcTemperatureSensor {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        self.channel
            .read_raw()
            .map_err(|err| SensorError::ReadFailed(format!("{err:?}")))
    }
}

struct GpioButton {
    pin: PinDriver<'static, AnyIOPin, Input>,
}

impl GpioButton {
    fn new(pin: AnyIOPin) -> anyhow::Result<Self> {
        let mut pin = PinDriver::input(pin)?;
        pin.set_pull(Pull::Up)?;
        info!("button ready on GPIO{BUTTON_PIN} (pull-up, active low)");
        Ok(Self { pin })
    }
}

impl ButtonInput for GpioButton {
    fn is_pressed(&mut self) -> bool {
        self.pin.is_low()
    }
}

struct EspWifiLink {
    parts: Option<(Modem, EspSystemEventLoop, EspDefaultNvsPartition)>,
    wifi: Option<BlockingWifi<EspWifi<'static>>>,
}

impl EspWifiLink {
    fn new(modem: Modem, sys_loop: EspSystemEventLoop, nvs: EspDefaultNvsPartition) -> Self {
        Self {
            parts: Some((modem, sys_loop, nvs)),
            wifi: None,
        }
    }
}

impl WifiLink for EspWifiLink {
    fn init_radio(&mut self) -> Result<(), WifiError> {
        let (modem, sys_loop, nvs) = self
            .parts
            .take()
            .ok_or_else(|| WifiError::RadioInit("radio already taken".to_string()))?;

        let esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs))
            .map_err(|err| WifiError::RadioInit(format!("{err:?}")))?;
        let wifi = BlockingWifi::wrap(esp_wifi, sys_loop)
            .map_err(|err| WifiError::RadioInit(format!("{err:?}")))?;

        self.wifi = Some(wifi);
        Ok(())
    }

    fn enable_station(&mut self) -> Result<(), WifiError> {
        let wifi = self
            .wifi
            .as_mut()
            .ok_or_else(|| WifiError::StationMode("radio not initialized".to_string()))?;

        wifi.set_configuration(&Configuration::Client(ClientConfiguration::default()))
            .and_then(|()| wifi.start())
            .map_err(|err| WifiError::StationMode(format!("{err:?}")))?;

        info!("wifi station mode enabled");
        Ok(())
    }

    fn connect(
        &mut self,
        credentials: &WifiCredentials<'_>,
        timeout: Duration,
    ) -> Result<(), WifiError> {
        let connect_error = |reason: String| WifiError::Connect {
            ssid: credentials.ssid.to_string(),
            reason,
        };

        let wifi = self
            .wifi
            .as_mut()
            .ok_or_else(|| connect_error("radio not initialized".to_string()))?;

        let auth_method = if credentials.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };

        wifi.set_configuration(&Configuration::Client(ClientConfiguration {
            ssid: credentials
                .ssid
                .try_into()
                .map_err(|_| connect_error("wifi ssid too long".to_string()))?,
            password: credentials
                .password
                .try_into()
                .map_err(|_| connect_error("wifi password too long".to_string()))?,
            auth_method,
            ..Default::default()
        }))
        .map_err(|err| connect_error(format!("{err:?}")))?;

        wifi.wifi_mut()
            .connect()
            .map_err(|err| connect_error(format!("{err:?}")))?;

        if let Err(err) =
            wifi.wifi_wait_while(|| wifi.is_connected().map(|connected| !connected), Some(timeout))
        {
            warn!("wifi association did not complete: {err:?}");
            let _ = wifi.disconnect();
            return Err(WifiError::Timeout {
                ssid: credentials.ssid.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            });
        }

        wifi.wait_netif_up()
            .map_err(|err| connect_error(format!("netif up failed: {err:?}")))?;

        if let Ok(ip_info) = wifi.wifi().sta_netif().get_ip_info() {
            info!("wifi got address {}", ip_info.ip);
        }
        Ok(())
    }
}

/// HTTPS via the ESP-IDF client and the bundled CA certificates. The TLS
/// configuration and the connection are created per request and dropped when
/// `get` returns.
struct EspHttpsTransport {
    timeout: Duration,
}

impl EspHttpsTransport {
    fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Transport for EspHttpsTransport {
    fn get(&mut self, host: &str, target: &str) -> Result<Response, TransportError> {
        let url = format!("https://{host}{target}");
        let http_conf = HttpClientConfiguration {
            timeout: Some(self.timeout),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };

        let connection = EspHttpConnection::new(&http_conf).map_err(|err| {
            TransportError::Connect {
                host: host.to_string(),
                reason: format!("{err:?}"),
            }
        })?;
        let mut client = HttpClient::wrap(connection);

        let request = client
            .request(Method::Get, &url, &[("accept", "text/plain")])
            .map_err(|err| io_error(host, err))?;
        let mut response = request.submit().map_err(|err| io_error(host, err))?;

        let status = response.status();
        let content_length = response
            .header("content-length")
            .or_else(|| response.header("Content-Length"))
            .and_then(|value| value.parse::<u64>().ok());

        let mut body = Vec::new();
        let mut chunk = [0_u8; READ_CHUNK_SIZE];
        loop {
            let read = response
                .read(&mut chunk)
                .map_err(|err| io_error(host, err))?;
            if read == 0 {
                break;
            }
            let room = MAX_RESPONSE_BODY.saturating_sub(body.len());
            body.extend_from_slice(&chunk[..read.min(room)]);
        }

        Ok(Response {
            status,
            content_length,
            body: Response::body_from_bytes(body, MAX_RESPONSE_BODY),
        })
    }
}

fn io_error(host: &str, err: EspIOError) -> TransportError {
    if err.0.code() == esp_idf_svc::sys::ESP_ERR_TIMEOUT as i32 {
        TransportError::Timeout {
            host: host.to_string(),
        }
    } else {
        TransportError::Request(format!("{err:?}"))
    }
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let config = ReporterConfig::default();
    info!("reporter config: {}", config.to_json()?);

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let Peripherals {
        modem, pins, adc1, ..
    } = Peripherals::take()?;

    let sensor = AdcTemperatureSensor::new(adc1, pins.gpio4)
        .context("failed to initialize temperature sensor")?;
    let button =
        GpioButton::new(pins.gpio5.downgrade()).context("failed to initialize button input")?;

    thread::sleep(STARTUP_DELAY);

    let credentials = WifiCredentials {
        ssid: WIFI_SSID,
        password: WIFI_PASSWORD,
    };
    let mut link = EspWifiLink::new(modem, sys_loop, nvs_partition);
    wifi::bring_up(&mut link, &credentials, WIFI_CONNECT_TIMEOUT)
        .inspect_err(|err| error!("wifi startup failed: {err}"))
        .context("wifi startup failed")?;

    info!("connected, starting readings");

    // Keep the wifi driver alive for the program lifetime.
    let _wifi = link;

    let reporter = HttpReporter::new(EspHttpsTransport::new(HTTP_TIMEOUT));
    let stop = AtomicBool::new(false);
    Poller::new(sensor, button, reporter).run(&stop);

    Ok(())
}
