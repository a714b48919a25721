use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

use log::{info, warn};

use crate::{
    config::POLL_INTERVAL,
    message::{button_message, temperature_message, Reading},
    ports::{ButtonInput, MessageSender, TemperatureSensor},
    types::{ButtonState, DisplayMode},
};

/// Everything the loop remembers between iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollState {
    pub mode: DisplayMode,
    pub last_button: ButtonState,
}

/// A change of the button input, reported with the mode that is in effect
/// after the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub state: ButtonState,
    pub mode: DisplayMode,
    pub toggled: bool,
}

impl PollState {
    /// Edge detection. Only a release-to-press transition flips the mode.
    pub fn observe(self, button: ButtonState) -> (Self, Option<ButtonEvent>) {
        if button == self.last_button {
            return (self, None);
        }

        let toggled = button.is_pressed();
        let mode = if toggled {
            self.mode.toggled()
        } else {
            self.mode
        };
        let next = Self {
            mode,
            last_button: button,
        };

        (
            next,
            Some(ButtonEvent {
                state: button,
                mode,
                toggled,
            }),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub event: Option<ButtonEvent>,
    pub reading: Option<Reading>,
    pub sent: u8,
    pub failed: u8,
}

pub struct Poller<S, B, M> {
    sensor: S,
    button: B,
    sender: M,
    state: PollState,
    interval: Duration,
}

impl<S, B, M> Poller<S, B, M>
where
    S: TemperatureSensor,
    B: ButtonInput,
    M: MessageSender,
{
    pub fn new(sensor: S, button: B, sender: M) -> Self {
        Self {
            sensor,
            button,
            sender,
            state: PollState::default(),
            interval: POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn sender(&self) -> &M {
        &self.sender
    }

    /// One iteration: button edge first (with its own send), then the
    /// temperature report.
    pub fn step(&mut self) -> StepReport {
        let mut report = StepReport::default();

        let button = ButtonState::from_pressed(self.button.is_pressed());
        let (next, event) = self.state.observe(button);
        self.state = next;

        if let Some(event) = event {
            if event.toggled {
                info!("button pressed, now in {}", event.mode.label());
            }
            self.deliver(&button_message(event.state, event.mode), &mut report);
            report.event = Some(event);
        }

        match self.sensor.read_raw() {
            Ok(raw) => {
                let reading = Reading::from_raw(raw);
                self.deliver(&temperature_message(&reading, self.state.mode), &mut report);
                report.reading = Some(reading);
            }
            Err(err) => warn!("skipping temperature report: {err}"),
        }

        report
    }

    /// Poll until `stop` is set, sleeping the configured interval between
    /// iterations.
    pub fn run(&mut self, stop: &AtomicBool) {
        info!("poll loop started ({} ms interval)", self.interval.as_millis());
        while !stop.load(Ordering::Relaxed) {
            self.step();
            thread::sleep(self.interval);
        }
        info!("poll loop stopped");
    }

    fn deliver(&mut self, message: &str, report: &mut StepReport) {
        match self.sender.send(message) {
            Ok(()) => report.sent += 1,
            Err(err) => {
                warn!("failed to send `{message}`: {err}");
                report.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ports::{SendError, SensorError, TransportError};

    struct ScriptedButton {
        levels: VecDeque<bool>,
        last: bool,
    }

    impl ScriptedButton {
        fn new(levels: &[bool]) -> Self {
            Self {
                levels: levels.iter().copied().collect(),
                last: false,
            }
        }
    }

    impl ButtonInput for ScriptedButton {
        fn is_pressed(&mut self) -> bool {
            if let Some(level) = self.levels.pop_front() {
                self.last = level;
            }
            self.last
        }
    }

    struct FixedSensor {
        raw: Option<u16>,
    }

    impl TemperatureSensor for FixedSensor {
        fn read_raw(&mut self) -> Result<u16, SensorError> {
            self.raw
                .ok_or_else(|| SensorError::ReadFailed("adc timeout".to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        messages: Vec<String>,
        failing: bool,
    }

    impl MessageSender for RecordingSender {
        fn send(&mut self, message: &str) -> Result<(), SendError> {
            self.messages.push(message.to_string());
            if self.failing {
                return Err(SendError::Transport(TransportError::Request(
                    "tls handshake failed".to_string(),
                )));
            }
            Ok(())
        }
    }

    const RAW: u16 = 876;

    fn expected_temperature(mode: DisplayMode) -> String {
        temperature_message(&Reading::from_raw(RAW), mode)
    }

    fn poller(levels: &[bool]) -> Poller<FixedSensor, ScriptedButton, RecordingSender> {
        Poller::new(
            FixedSensor {
                raw: Some(RAW),
            },
            ScriptedButton::new(levels),
            RecordingSender::default(),
        )
    }

    #[test]
    fn press_toggles_mode_and_release_does_not() {
        let state = PollState::default();

        let (state, event) = state.observe(ButtonState::Pressed);
        assert_eq!(
            event,
            Some(ButtonEvent {
                state: ButtonState::Pressed,
                mode: DisplayMode::Fahrenheit,
                toggled: true,
            })
        );

        let (state, event) = state.observe(ButtonState::Released);
        assert_eq!(
            event,
            Some(ButtonEvent {
                state: ButtonState::Released,
                mode: DisplayMode::Fahrenheit,
                toggled: false,
            })
        );
        assert_eq!(state.mode, DisplayMode::Fahrenheit);
        assert_eq!(state.last_button, ButtonState::Released);
    }

    #[test]
    fn steady_input_produces_no_event() {
        let state = PollState {
            mode: DisplayMode::Fahrenheit,
            last_button: ButtonState::Pressed,
        };

        let (next, event) = state.observe(ButtonState::Pressed);

        assert_eq!(next, state);
        assert_eq!(event, None);
    }

    #[test]
    fn idle_iteration_sends_only_temperature() {
        let mut poller = poller(&[false]);

        let report = poller.step();

        assert_eq!(report.event, None);
        assert_eq!(report.sent, 1);
        assert_eq!(poller.sender().messages.len(), 1);
        assert!(poller.sender().messages[0].starts_with("Temperature: "));
        assert!(poller.sender().messages[0].ends_with(" °C"));
    }

    #[test]
    fn press_reports_new_mode_before_temperature() {
        let mut poller = poller(&[false, true, true]);

        poller.step();
        poller.step();
        poller.step();

        let messages = &poller.sender().messages;
        let button_messages: Vec<_> = messages
            .iter()
            .filter(|message| message.starts_with("Button"))
            .collect();
        assert_eq!(button_messages, vec!["Button pressed | Mode: Fahrenheit"]);

        let celsius = expected_temperature(DisplayMode::Celsius);
        let fahrenheit = expected_temperature(DisplayMode::Fahrenheit);
        assert_eq!(
            messages,
            &vec![
                celsius,
                "Button pressed | Mode: Fahrenheit".to_string(),
                fahrenheit.clone(),
                fahrenheit,
            ]
        );
    }

    #[test]
    fn full_click_toggles_once_and_reports_both_edges() {
        let mut poller = poller(&[true, false, true, false]);

        let modes: Vec<_> = (0..4)
            .map(|_| {
                poller.step();
                poller.state().mode
            })
            .collect();

        assert_eq!(
            modes,
            vec![
                DisplayMode::Fahrenheit,
                DisplayMode::Fahrenheit,
                DisplayMode::Celsius,
                DisplayMode::Celsius,
            ]
        );

        let button_messages: Vec<_> = poller
            .sender()
            .messages
            .iter()
            .filter(|message| message.starts_with("Button"))
            .cloned()
            .collect();
        assert_eq!(
            button_messages,
            vec![
                "Button pressed | Mode: Fahrenheit",
                "Button released | Mode: Fahrenheit",
                "Button pressed | Mode: Celsius",
                "Button released | Mode: Celsius",
            ]
        );
    }

    #[test]
    fn send_failures_do_not_stop_the_loop() {
        let mut poller = Poller::new(
            FixedSensor {
                raw: Some(RAW),
            },
            ScriptedButton::new(&[true, true]),
            RecordingSender {
                failing: true,
                ..RecordingSender::default()
            },
        );

        let first = poller.step();
        let second = poller.step();

        assert_eq!((first.sent, first.failed), (0, 2));
        assert_eq!((second.sent, second.failed), (0, 1));
        assert_eq!(poller.state().mode, DisplayMode::Fahrenheit);
        assert_eq!(poller.state().last_button, ButtonState::Pressed);
        assert_eq!(poller.sender().messages.len(), 3);
    }

    #[test]
    fn sensor_failure_skips_only_the_temperature_report() {
        let mut poller = Poller::new(
            FixedSensor { raw: None },
            ScriptedButton::new(&[true]),
            RecordingSender::default(),
        );

        let report = poller.step();

        assert_eq!(report.reading, None);
        assert_eq!(report.sent, 1);
        assert_eq!(
            poller.sender().messages,
            vec!["Button pressed | Mode: Fahrenheit".to_string()]
        );
    }

    #[test]
    fn run_returns_once_stop_is_set() {
        let stop = AtomicBool::new(true);
        let mut poller = poller(&[]).with_interval(Duration::ZERO);

        poller.run(&stop);

        assert!(poller.sender().messages.is_empty());
    }

    /// Sets the shared stop flag once `limit` messages have gone out.
    struct StopAfter<'a> {
        sent: usize,
        limit: usize,
        stop: &'a AtomicBool,
    }

    impl MessageSender for StopAfter<'_> {
        fn send(&mut self, _message: &str) -> Result<(), SendError> {
            self.sent += 1;
            if self.sent >= self.limit {
                self.stop.store(true, Ordering::Relaxed);
            }
            Ok(())
        }
    }

    #[test]
    fn run_stops_after_flag_is_set_mid_loop() {
        let stop = AtomicBool::new(false);
        let sender = StopAfter {
            sent: 0,
            limit: 3,
            stop: &stop,
        };
        let mut poller = Poller::new(
            FixedSensor { raw: Some(RAW) },
            ScriptedButton::new(&[]),
            sender,
        )
        .with_interval(Duration::ZERO);

        poller.run(&stop);

        // Released button: one temperature message per iteration.
        assert_eq!(poller.sender().sent, 3);
    }
}
