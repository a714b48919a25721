use std::time::Duration;

use serde::Serialize;

/// Report server. Requests go out over HTTPS.
pub const SERVER_HOST: &str = "serverpico.onrender.com";
/// Request path; the encoded message is appended as the `msg` value.
pub const PATH_PREFIX: &str = "/mensagem?msg=";

pub const WIFI_SSID: &str = match option_env!("WIFI_SSID") {
    Some(ssid) => ssid,
    None => "",
};
pub const WIFI_PASSWORD: &str = match option_env!("WIFI_PASSWORD") {
    Some(password) => password,
    None => "",
};
pub const WIFI_CONNECT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// ADC channel wired to the temperature sensor. On the ESP32-C3 this is
/// GPIO4, an external pin: an analog sensor with the 0.706 V @ 27 °C,
/// -1.721 mV/°C characteristic must be wired to it.
pub const TEMP_SENSOR_CHANNEL: u8 = 4;
/// Push-button input, pulled up, active low.
pub const BUTTON_PIN: i32 = 5;

pub const ADC_REFERENCE_VOLTS: f32 = 3.3;
pub const ADC_FULL_SCALE: f32 = 4095.0;

pub const POLL_INTERVAL: Duration = Duration::from_millis(1_000);
pub const STARTUP_DELAY: Duration = Duration::from_millis(2_000);
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Output capacity for the encoded message, terminator byte included.
pub const ENCODE_CAPACITY: usize = 512;
pub const MAX_RESPONSE_BODY: usize = 1024;

#[derive(Debug, Clone, Serialize)]
pub struct ReporterConfig {
    pub host: &'static str,
    pub path_prefix: &'static str,
    pub wifi_ssid: &'static str,
    pub wifi_connect_timeout_ms: u64,
    pub temp_sensor_channel: u8,
    pub button_pin: i32,
    pub poll_interval_ms: u64,
    pub startup_delay_ms: u64,
    pub http_timeout_ms: u64,
    pub encode_capacity: usize,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            host: SERVER_HOST,
            path_prefix: PATH_PREFIX,
            wifi_ssid: WIFI_SSID,
            wifi_connect_timeout_ms: WIFI_CONNECT_TIMEOUT.as_millis() as u64,
            temp_sensor_channel: TEMP_SENSOR_CHANNEL,
            button_pin: BUTTON_PIN,
            poll_interval_ms: POLL_INTERVAL.as_millis() as u64,
            startup_delay_ms: STARTUP_DELAY.as_millis() as u64,
            http_timeout_ms: HTTP_TIMEOUT.as_millis() as u64,
            encode_capacity: ENCODE_CAPACITY,
        }
    }
}

impl ReporterConfig {
    /// The Wi-Fi password is never part of the output.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
