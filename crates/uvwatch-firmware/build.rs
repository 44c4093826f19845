//! Bakes Wi-Fi credentials and the fixed location from `.env` into the binary.

const KEYS: [&str; 6] = [
    "WIFI_SSID_1",
    "WIFI_PASS_1",
    "WIFI_SSID_2",
    "WIFI_PASS_2",
    "UVWATCH_LATITUDE",
    "UVWATCH_LONGITUDE",
];

fn main() {
    println!("cargo:rerun-if-changed=.env");

    // A missing .env is fine: unset keys compile in as empty strings
    let _ = dotenvy::dotenv();

    for key in KEYS {
        println!("cargo:rerun-if-env-changed={}", key);
        let value = std::env::var(key).unwrap_or_default();
        println!("cargo:rustc-env={}={}", key, value);
    }
}
