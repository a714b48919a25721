use crate::{
    config::{ADC_FULL_SCALE, ADC_REFERENCE_VOLTS},
    types::{ButtonState, DisplayMode},
};

/// Sensor output at 27 °C.
const VOLTS_AT_27C: f32 = 0.706;
/// Sensor slope in volts per degree; the voltage falls as temperature rises.
const VOLTS_PER_DEGREE: f32 = 0.001721;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub raw: u16,
    pub voltage: f32,
    pub celsius: f32,
}

impl Reading {
    pub fn from_raw(raw: u16) -> Self {
        let voltage = raw_to_voltage(raw);
        Self {
            raw,
            voltage,
            celsius: voltage_to_celsius(voltage),
        }
    }

    pub fn fahrenheit(&self) -> f32 {
        celsius_to_fahrenheit(self.celsius)
    }

    pub fn in_mode(&self, mode: DisplayMode) -> f32 {
        match mode {
            DisplayMode::Celsius => self.celsius,
            DisplayMode::Fahrenheit => self.fahrenheit(),
        }
    }
}

pub fn raw_to_voltage(raw: u16) -> f32 {
    f32::from(raw) * ADC_REFERENCE_VOLTS / ADC_FULL_SCALE
}

pub fn voltage_to_celsius(voltage: f32) -> f32 {
    27.0 - (voltage - VOLTS_AT_27C) / VOLTS_PER_DEGREE
}

pub fn celsius_to_fahrenheit(temp_c: f32) -> f32 {
    temp_c * 9.0 / 5.0 + 32.0
}

pub fn temperature_message(reading: &Reading, mode: DisplayMode) -> String {
    format!("Temperature: {:.2} {}", reading.in_mode(mode), mode.unit())
}

pub fn button_message(state: ButtonState, mode: DisplayMode) -> String {
    format!("Button {} | Mode: {}", state.label(), mode.label())
}
