use std::time::Duration;

use log::info;

use crate::ports::{WifiCredentials, WifiError, WifiLink};

/// Start the radio, switch to station mode and join the network. Any
/// failure is returned as-is; the caller treats it as fatal.
pub fn bring_up<L: WifiLink>(
    link: &mut L,
    credentials: &WifiCredentials<'_>,
    timeout: Duration,
) -> Result<(), WifiError> {
    if credentials.ssid.trim().is_empty() {
        return Err(WifiError::MissingCredentials);
    }

    link.init_radio()?;
    link.enable_station()?;

    info!(
        "wifi connecting to `{}` ({} ms timeout)",
        credentials.ssid,
        timeout.as_millis()
    );
    link.connect(credentials, timeout)?;
    info!("wifi connected to `{}`", credentials.ssid);
    Ok(())
}
