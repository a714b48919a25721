pub mod config;
pub mod encoding;
pub mod message;
pub mod poller;
pub mod ports;
pub mod transport;
pub mod types;
pub mod wifi;

pub use config::ReporterConfig;
pub use encoding::{decode, encode, encode_with_capacity, Encoded};
pub use message::{button_message, temperature_message, Reading};
pub use poller::{ButtonEvent, PollState, Poller, StepReport};
pub use ports::{
    ButtonInput, MessageSender, Response, SendError, SensorError, TemperatureSensor, Transport,
    TransportError, WifiCredentials, WifiError, WifiLink,
};
pub use transport::{request_target, HttpReporter};
pub use types::{ButtonState, DisplayMode};
