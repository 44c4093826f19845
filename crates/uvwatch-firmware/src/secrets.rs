//! Build-time credentials and location, see `build.rs`

use uvwatch::config::Config;

/// Up to two networks, tried in order; empty SSIDs are skipped
pub const WIFI_NETWORKS: [(&str, &str); 2] = [
    (env!("WIFI_SSID_1"), env!("WIFI_PASS_1")),
    (env!("WIFI_SSID_2"), env!("WIFI_PASS_2")),
];

const LATITUDE: &str = env!("UVWATCH_LATITUDE");
const LONGITUDE: &str = env!("UVWATCH_LONGITUDE");

/// Defaults with the fixed location overridden when `.env` provides one
pub fn device_config() -> Config<'static> {
    let mut config = Config::DEFAULT;
    if let (Ok(latitude), Ok(longitude)) = (LATITUDE.parse::<f32>(), LONGITUDE.parse::<f32>()) {
        config.location.latitude = latitude;
        config.location.longitude = longitude;
        config.location.label = "Home";
    }
    config
}

pub fn configured_networks() -> impl Iterator<Item = (&'static str, &'static str)> {
    WIFI_NETWORKS.into_iter().filter(|(ssid, _)| !ssid.is_empty())
}
