//! Wi-Fi, HTTPS and SNTP behind [`HttpTransport`]
//!
//! The radio is only brought up by the first `connect` after a boot, so a
//! wake that never fetches never pays for association. The RTC is set over
//! SNTP right after the first successful association while it is still unset.
//!
//! `connect` takes at most two joins and two DHCP waits plus two SNTP
//! attempts, 50 s in total, which stays inside the default connect timeout.
//! TLS and HTTP only run in `get`, under the request timeout.

use alloc::boxed::Box;
use alloc::vec;
use core::net::{IpAddr, SocketAddr};

use embassy_net::Stack;
use embassy_net::dns::{DnsQueryType, DnsSocket};
use embassy_net::tcp::client::{TcpClient, TcpClientState};
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_time::{Duration, Instant, Timer, with_timeout};
use esp_hal::rng::Rng;
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiError};
use log::{debug, info, warn};
use reqwless::client::{HttpClient, TlsConfig, TlsVerify};
use reqwless::request::Method;
use sntpc::{NtpContext, NtpTimestampGenerator};
use thiserror_no_std::Error;
use uvwatch::platform::{HttpResponse, HttpTransport};

use crate::SharedRtc;
use crate::clock::{rtc_utc, set_rtc_utc};
use crate::secrets::configured_networks;

pub type TcpState = TcpClientState<1, 4096, 4096>;

const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const DHCP_TIMEOUT: Duration = Duration::from_secs(10);
const NTP_TIMEOUT: Duration = Duration::from_secs(5);

/// A full TLS record on the read side; requests are small
const TLS_READ_LEN: usize = 16_640;
const TLS_WRITE_LEN: usize = 4_096;
const RESPONSE_BUFFER_LEN: usize = 8_192;

const NTP_SERVERS: [&str; 2] = ["pool.ntp.org", "time.nist.gov"];
const NTP_PORT: u16 = 123;
const NTP_PACKET_SIZE: usize = 48;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("no configured network could be joined")]
    NotConnected,
    #[error("HTTP exchange failed: {0:?}")]
    Http(reqwless::Error),
}

pub struct WifiTransport {
    controller: WifiController<'static>,
    stack: Stack<'static>,
    tcp_state: &'static TcpState,
    rtc: &'static SharedRtc,
    rng: Rng,
    tls_read: Box<[u8]>,
    tls_write: Box<[u8]>,
    response: Box<[u8]>,
}

impl WifiTransport {
    pub fn new(
        controller: WifiController<'static>,
        stack: Stack<'static>,
        tcp_state: &'static TcpState,
        rtc: &'static SharedRtc,
    ) -> Self {
        Self {
            controller,
            stack,
            tcp_state,
            rtc,
            rng: Rng::new(),
            tls_read: vec![0; TLS_READ_LEN].into_boxed_slice(),
            tls_write: vec![0; TLS_WRITE_LEN].into_boxed_slice(),
            response: vec![0; RESPONSE_BUFFER_LEN].into_boxed_slice(),
        }
    }

    async fn ensure_connected(&mut self) -> Result<(), NetError> {
        if self.stack.is_link_up() && self.stack.config_v4().is_some() {
            return Ok(());
        }

        for (ssid, password) in configured_networks() {
            info!(" Joining {}", ssid);
            match with_timeout(JOIN_TIMEOUT, self.join(ssid, password)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(" Failed to join {}: {:?}", ssid, e);
                    continue;
                }
                Err(_) => {
                    warn!(" Timed out joining {}", ssid);
                    continue;
                }
            }

            if with_timeout(DHCP_TIMEOUT, self.wait_for_ip()).await.is_err() {
                warn!(" No DHCP lease on {}", ssid);
                continue;
            }

            self.sync_time().await;
            return Ok(());
        }

        Err(NetError::NotConnected)
    }

    async fn join(&mut self, ssid: &str, password: &str) -> Result<(), WifiError> {
        let config = ModeConfig::Client(
            ClientConfig::default()
                .with_ssid(ssid.into())
                .with_password(password.into()),
        );
        self.controller.set_config(&config)?;
        if !matches!(self.controller.is_started(), Ok(true)) {
            self.controller.start_async().await?;
        }
        self.controller.connect_async().await
    }

    async fn wait_for_ip(&self) {
        loop {
            if let Some(config) = self.stack.config_v4() {
                info!(" Got IP {}", config.address);
                return;
            }
            Timer::after(Duration::from_millis(200)).await;
        }
    }

    /// Set the RTC over SNTP if it has never been set
    async fn sync_time(&mut self) {
        if rtc_utc(self.rtc).is_some() {
            return;
        }

        let mut rx_meta = [PacketMetadata::EMPTY; 1];
        let mut rx_buffer = [0u8; NTP_PACKET_SIZE];
        let mut tx_meta = [PacketMetadata::EMPTY; 1];
        let mut tx_buffer = [0u8; NTP_PACKET_SIZE];
        let mut socket = UdpSocket::new(self.stack, &mut rx_meta, &mut rx_buffer, &mut tx_meta, &mut tx_buffer);
        if let Err(e) = socket.bind(NTP_PORT) {
            warn!(" Failed to bind SNTP socket: {:?}", e);
            return;
        }

        for server in NTP_SERVERS {
            match with_timeout(NTP_TIMEOUT, self.query_ntp(server, &socket)).await {
                Ok(true) => {
                    info!(" RTC set from {}", server);
                    return;
                }
                Ok(false) => {}
                Err(_) => warn!(" SNTP via {} timed out", server),
            }
        }
    }

    /// One DNS lookup and SNTP exchange, `true` once the RTC is set
    async fn query_ntp(&self, server: &str, socket: &UdpSocket<'_>) -> bool {
        let addrs = match self.stack.dns_query(server, DnsQueryType::A).await {
            Ok(addrs) => addrs,
            Err(e) => {
                warn!(" DNS lookup of {} failed: {:?}", server, e);
                return false;
            }
        };
        let Some(addr) = addrs.first() else {
            return false;
        };
        let addr: IpAddr = (*addr).into();

        let context = NtpContext::new(UptimeTimestamp::new());
        match sntpc::get_time(SocketAddr::new(addr, NTP_PORT), socket, context).await {
            Ok(result) => {
                let micros = ((u64::from(result.sec_fraction()) * 1_000_000) >> 32) as u32;
                set_rtc_utc(self.rtc, u64::from(result.sec()), micros);
                true
            }
            Err(e) => {
                warn!(" SNTP via {} failed: {:?}", server, e);
                false
            }
        }
    }
}

impl HttpTransport for WifiTransport {
    type Error = NetError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        self.ensure_connected().await
    }

    async fn get(&mut self, url: &str) -> Result<HttpResponse, Self::Error> {
        if !self.stack.is_link_up() || self.stack.config_v4().is_none() {
            return Err(NetError::NotConnected);
        }

        let tcp = TcpClient::new(self.stack, self.tcp_state);
        let dns = DnsSocket::new(self.stack);
        let seed = (self.rng.random() as u64) << 32 | self.rng.random() as u64;
        let tls = TlsConfig::new(seed, &mut self.tls_read, &mut self.tls_write, TlsVerify::None);
        let mut client = HttpClient::new_with_tls(&tcp, &dns, tls);

        debug!(" Sending GET {}", url);
        let mut request = client.request(Method::GET, url).await.map_err(NetError::Http)?;
        let response = request.send(&mut self.response).await.map_err(NetError::Http)?;
        let status = response.status.0;
        let body = response.body().read_to_end().await.map_err(NetError::Http)?;

        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Monotonic timestamps for the SNTP round-trip measurement
#[derive(Clone, Copy)]
struct UptimeTimestamp {
    start: Instant,
}

impl UptimeTimestamp {
    fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl NtpTimestampGenerator for UptimeTimestamp {
    fn init(&mut self) {
        self.start = Instant::now();
    }

    fn timestamp_sec(&self) -> u64 {
        self.start.elapsed().as_secs()
    }

    fn timestamp_subsec_micros(&self) -> u32 {
        (self.start.elapsed().as_micros() % 1_000_000) as u32
    }
}
