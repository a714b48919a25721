use std::{
    io::{ErrorKind, Read},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Context;
use tracing::info;

use reporter_common::{
    config::{
        HTTP_TIMEOUT, MAX_RESPONSE_BODY, SERVER_HOST, STARTUP_DELAY, WIFI_CONNECT_TIMEOUT,
        WIFI_PASSWORD, WIFI_SSID,
    },
    wifi, ButtonInput, HttpReporter, Poller, ReporterConfig, Response, SensorError,
    TemperatureSensor, Transport, TransportError, WifiCredentials, WifiError, WifiLink,
};

const HOST_LOOPBACK_SSID: &str = "host-loopback";

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ReporterConfig::default();
    info!("reporter config: {}", config.to_json()?);

    // REPORTER_DEV_HOST points the harness at a local plain-HTTP server;
    // without it reports go to the real server over HTTPS.
    let (host, transport) = match std::env::var("REPORTER_DEV_HOST") {
        Ok(dev_host) => {
            let dev_port = std::env::var("REPORTER_DEV_PORT")
                .ok()
                .and_then(|value| value.parse::<u16>().ok())
                .unwrap_or(8080);
            (dev_host, UreqTransport::plain(dev_port, HTTP_TIMEOUT))
        }
        Err(_) => (SERVER_HOST.to_string(), UreqTransport::https(HTTP_TIMEOUT)),
    };

    tokio::time::sleep(STARTUP_DELAY).await;

    let ssid = if WIFI_SSID.is_empty() {
        HOST_LOOPBACK_SSID
    } else {
        WIFI_SSID
    };
    let credentials = WifiCredentials {
        ssid,
        password: WIFI_PASSWORD,
    };
    wifi::bring_up(&mut LoopbackLink::default(), &credentials, WIFI_CONNECT_TIMEOUT)
        .context("wifi startup failed")?;

    info!(
        "connected, starting readings against {}",
        transport.base_url(&host)
    );

    let reporter = HttpReporter::with_host(transport, host);
    let mut poller = Poller::new(SimulatedSensor::default(), SimulatedButton::default(), reporter);

    let stop = Arc::new(AtomicBool::new(false));
    let loop_stop = stop.clone();
    let worker = tokio::task::spawn_blocking(move || poller.run(&loop_stop));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("ctrl-c received, stopping poll loop");
    stop.store(true, Ordering::Relaxed);

    worker.await.context("poll loop panicked")?;
    Ok(())
}

/// Stands in for the radio; the workstation is already online.
#[derive(Default)]
struct LoopbackLink {
    radio_up: bool,
    station: bool,
}

impl WifiLink for LoopbackLink {
    fn init_radio(&mut self) -> Result<(), WifiError> {
        self.radio_up = true;
        Ok(())
    }

    fn enable_station(&mut self) -> Result<(), WifiError> {
        if !self.radio_up {
            return Err(WifiError::StationMode("radio not initialized".to_string()));
        }
        self.station = true;
        Ok(())
    }

    fn connect(
        &mut self,
        credentials: &WifiCredentials<'_>,
        _timeout: Duration,
    ) -> Result<(), WifiError> {
        if !self.station {
            return Err(WifiError::Connect {
                ssid: credentials.ssid.to_string(),
                reason: "station mode not enabled".to_string(),
            });
        }
        Ok(())
    }
}

// Hardware integration point: the esp32 build reads the ADC and a GPIO
// instead of these simulated inputs.
#[derive(Default)]
struct SimulatedSensor {
    tick: u64,
}

impl TemperatureSensor for SimulatedSensor {
    fn read_raw(&mut self) -> Result<u16, SensorError> {
        self.tick = self.tick.wrapping_add(1);
        Ok(870 + (self.tick % 8) as u16 * 2)
    }
}

/// Holds the button down for two polls out of every ten.
#[derive(Default)]
struct SimulatedButton {
    tick: u64,
}

impl ButtonInput for SimulatedButton {
    fn is_pressed(&mut self) -> bool {
        self.tick = self.tick.wrapping_add(1);
        matches!(self.tick % 10, 5 | 6)
    }
}

/// Blocking HTTP client for the harness. Each call opens its own
/// connection (TLS included for https) and closes it before returning.
struct UreqTransport {
    agent: ureq::Agent,
    scheme: &'static str,
    port: Option<u16>,
}

impl UreqTransport {
    fn https(timeout: Duration) -> Self {
        Self::new("https", None, timeout)
    }

    fn plain(port: u16, timeout: Duration) -> Self {
        Self::new("http", Some(port), timeout)
    }

    fn new(scheme: &'static str, port: Option<u16>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .max_idle_connections(0)
            .build();
        Self {
            agent,
            scheme,
            port,
        }
    }

    fn base_url(&self, host: &str) -> String {
        match self.port {
            Some(port) => format!("{}://{host}:{port}", self.scheme),
            None => format!("{}://{host}", self.scheme),
        }
    }
}

impl Transport for UreqTransport {
    fn get(&mut self, host: &str, target: &str) -> Result<Response, TransportError> {
        let url = format!("{}{target}", self.base_url(host));

        let response = match self.agent.get(&url).set("accept", "text/plain").call() {
            Ok(response) => response,
            Err(ureq::Error::Status(_, response)) => response,
            Err(ureq::Error::Transport(err)) => return Err(transport_error(host, &err)),
        };

        let status = response.status();
        let content_length = response
            .header("content-length")
            .and_then(|value| value.trim().parse::<u64>().ok());

        let mut body = Vec::new();
        response
            .into_reader()
            .take(MAX_RESPONSE_BODY as u64)
            .read_to_end(&mut body)
            .map_err(|err| io_error(host, &err))?;

        Ok(Response {
            status,
            content_length,
            body: Response::body_from_bytes(body, MAX_RESPONSE_BODY),
        })
    }
}

fn transport_error(host: &str, err: &ureq::Transport) -> TransportError {
    let io_source = std::error::Error::source(err)
        .and_then(|source| source.downcast_ref::<std::io::Error>());
    if let Some(io) = io_source {
        if matches!(io.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) {
            return TransportError::Timeout {
                host: host.to_string(),
            };
        }
    }

    match err.kind() {
        ureq::ErrorKind::Dns | ureq::ErrorKind::ConnectionFailed => TransportError::Connect {
            host: host.to_string(),
            reason: err.to_string(),
        },
        _ => TransportError::Request(err.to_string()),
    }
}

fn io_error(host: &str, err: &std::io::Error) -> TransportError {
    match err.kind() {
        ErrorKind::TimedOut | ErrorKind::WouldBlock => TransportError::Timeout {
            host: host.to_string(),
        },
        _ => TransportError::Request(err.to_string()),
    }
}
