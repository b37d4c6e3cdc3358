//! Scan source backed by `iw dev <iface> scan`
//!
//! `iw` reports security as separate `capability:`, `RSN:` and `WPA:`
//! blocks. They are folded into an Android-style capabilities string such
//! as `[WPA2-PSK-CCMP][ESS]` so the encryption heuristic sees the same
//! markers a phone would report.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Command;
use tracing::{debug, info};

use detective_common::{DetectiveError, RawNetwork, ScanSource, WEAK_SIGNAL_DBM};

/// Environment variable that overrides the wireless interface.
pub const INTERFACE_ENV: &str = "DETECTIVE_IW_INTERFACE";

/// Interface used when nothing else is configured.
pub const DEFAULT_INTERFACE: &str = "wlan0";

/// Linux scan source that shells out to `iw`.
#[derive(Debug, Clone)]
pub struct IwScanSource {
    interface: String,
    /// Read cached results (`scan dump`) instead of triggering a scan.
    use_dump: bool,
}

impl IwScanSource {
    pub fn new<S: Into<String>>(interface: S) -> Self {
        Self {
            interface: interface.into(),
            use_dump: false,
        }
    }

    /// Interface from `DETECTIVE_IW_INTERFACE`, falling back to `wlan0`.
    pub fn from_env() -> Self {
        let interface = std::env::var(INTERFACE_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_INTERFACE.to_string());
        Self::new(interface)
    }

    /// Use `scan dump`, which usually works without CAP_NET_ADMIN but may be stale.
    #[must_use]
    pub fn with_dump(mut self, use_dump: bool) -> Self {
        self.use_dump = use_dump;
        self
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    fn args(&self) -> Vec<String> {
        let mut args = vec!["dev".to_string(), self.interface.clone(), "scan".to_string()];
        if self.use_dump {
            args.push("dump".to_string());
        }
        args
    }

    /// Blocking: run `iw` and parse its output.
    fn scan_blocking(&self) -> Result<Vec<RawNetwork>> {
        let args = self.args();
        let output = Command::new("iw")
            .args(&args)
            .output()
            .with_context(|| format!("Failed to run `iw {}`", args.join(" ")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DetectiveError::Scan(format!(
                "iw exited with {}: {}",
                output.status,
                stderr.trim()
            ))
            .into());
        }

        Ok(parse_iw_output(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl Default for IwScanSource {
    fn default() -> Self {
        Self::new(DEFAULT_INTERFACE)
    }
}

#[async_trait]
impl ScanSource for IwScanSource {
    async fn scan(&self) -> Result<Vec<RawNetwork>> {
        let source = self.clone();
        let networks = tokio::task::spawn_blocking(move || source.scan_blocking())
            .await
            .context("Blocking iw scan failed")??;
        debug!("iw reported {} networks on {}", networks.len(), self.interface);
        Ok(networks)
    }

    async fn start(&self) -> Result<()> {
        info!(
            "Scanning with iw on {}{}",
            self.interface,
            if self.use_dump { " (cached results)" } else { "" }
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "iw"
    }
}

/// Security block currently being read inside a stanza.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Other,
    Rsn,
    Wpa,
}

#[derive(Debug, Default)]
struct Stanza {
    bssid: String,
    ssid: String,
    signal_dbm: Option<f64>,
    ess: bool,
    privacy: bool,
    rsn: Option<Suite>,
    wpa: Option<Suite>,
}

#[derive(Debug, Default, Clone)]
struct Suite {
    auth: Vec<String>,
    ciphers: Vec<String>,
}

impl Suite {
    /// `WPA2-PSK-CCMP`, `WPA-EAP-TKIP+CCMP`, ...
    fn describe(&self, proto: &str) -> String {
        let auth = if self.auth.is_empty() {
            "PSK".to_string()
        } else {
            self.auth.iter().map(|a| auth_label(a)).collect::<Vec<_>>().join("+")
        };
        let mut text = format!("{}-{}", proto, auth);
        if !self.ciphers.is_empty() {
            text.push('-');
            text.push_str(&self.ciphers.join("+"));
        }
        text
    }
}

fn auth_label(suite: &str) -> &str {
    match suite {
        "802.1X" | "802.1X/SHA-256" => "EAP",
        "PSK" | "PSK/SHA-256" | "FT/PSK" => "PSK",
        other => other,
    }
}

impl Stanza {
    fn capabilities(&self) -> String {
        let mut caps = String::new();
        if let Some(wpa) = &self.wpa {
            caps.push_str(&format!("[{}]", wpa.describe("WPA")));
        }
        if let Some(rsn) = &self.rsn {
            caps.push_str(&format!("[{}]", rsn.describe("WPA2")));
        }
        if self.privacy && self.rsn.is_none() && self.wpa.is_none() {
            caps.push_str("[WEP]");
        }
        if self.ess {
            caps.push_str("[ESS]");
        }
        caps
    }

    fn finish(self) -> RawNetwork {
        let level = self.signal_dbm.map(|dbm| dbm.round() as i32).unwrap_or(WEAK_SIGNAL_DBM);
        let capabilities = self.capabilities();
        RawNetwork::new(self.ssid, self.bssid, level).with_capabilities(capabilities)
    }
}

/// Parse the text output of `iw dev <iface> scan [dump]`.
///
/// Stanzas start with `BSS aa:bb:cc:dd:ee:ff(on wlan0)` at column 0.
/// Lines that do not belong to a stanza are ignored.
pub fn parse_iw_output(output: &str) -> Vec<RawNetwork> {
    let mut networks = Vec::new();
    let mut current: Option<Stanza> = None;
    let mut block = Block::Other;

    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("BSS ") {
            if let Some(stanza) = current.take() {
                networks.push(stanza.finish());
            }
            block = Block::Other;

            let mac_end = rest
                .find(|c: char| !c.is_ascii_hexdigit() && c != ':')
                .unwrap_or(rest.len());
            let mac = &rest[..mac_end];
            if mac.len() == 17 {
                current = Some(Stanza {
                    bssid: mac.to_lowercase(),
                    ..Stanza::default()
                });
            }
            continue;
        }

        let Some(stanza) = current.as_mut() else {
            continue;
        };
        let trimmed = line.trim();

        // security blocks are one tab deep, their fields two
        let depth = line.chars().take_while(|c| *c == '\t').count();
        if depth <= 1 && !trimmed.starts_with('*') {
            block = Block::Other;
        }

        if let Some(rest) = trimmed.strip_prefix("SSID:") {
            stanza.ssid = unescape_ssid(rest.trim());
        } else if let Some(rest) = trimmed.strip_prefix("signal:") {
            stanza.signal_dbm = rest.split_whitespace().next().and_then(|s| s.parse().ok());
        } else if let Some(rest) = trimmed.strip_prefix("capability:") {
            stanza.ess = rest.split_whitespace().any(|w| w == "ESS");
            stanza.privacy = rest.split_whitespace().any(|w| w == "Privacy");
        } else if trimmed.starts_with("RSN:") {
            block = Block::Rsn;
            stanza.rsn.get_or_insert_with(Suite::default);
        } else if trimmed.starts_with("WPA:") {
            block = Block::Wpa;
            stanza.wpa.get_or_insert_with(Suite::default);
        } else if let Some(rest) = trimmed.strip_prefix("* Authentication suites:") {
            if let Some(suite) = suite_for(stanza, block) {
                suite.auth = rest.split_whitespace().map(str::to_string).collect();
            }
        } else if let Some(rest) = trimmed.strip_prefix("* Pairwise ciphers:") {
            if let Some(suite) = suite_for(stanza, block) {
                suite.ciphers = rest.split_whitespace().map(str::to_string).collect();
            }
        }
    }

    if let Some(stanza) = current.take() {
        networks.push(stanza.finish());
    }
    networks
}

/// Undo the `\xNN` escaping `iw` applies to non-printable SSID bytes.
/// Bytes that do not form valid UTF-8 are replaced.
fn unescape_ssid(text: &str) -> String {
    let raw = text.as_bytes();
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\\' && raw.get(i + 1) == Some(&b'x') {
            let byte = raw
                .get(i + 2..i + 4)
                .and_then(|hex| std::str::from_utf8(hex).ok())
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = byte {
                bytes.push(byte);
                i += 4;
                continue;
            }
        }
        bytes.push(raw[i]);
        i += 1;
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn suite_for(stanza: &mut Stanza, block: Block) -> Option<&mut Suite> {
    match block {
        Block::Rsn => stanza.rsn.as_mut(),
        Block::Wpa => stanza.wpa.as_mut(),
        Block::Other => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
BSS aa:bb:cc:dd:ee:ff(on wlan0)
\tfreq: 5180
\tcapability: ESS Privacy ShortSlotTime (0x0411)
\tsignal: -52.00 dBm
\tSSID: HomeNetwork
\tRSN:\t * Version: 1
\t\t * Group cipher: CCMP
\t\t * Pairwise ciphers: CCMP
\t\t * Authentication suites: PSK
\t\t * Capabilities: 16-PTKSA-RC 1-GTKSA-RC (0x000c)
BSS 11:22:33:44:55:66(on wlan0)
\tfreq: 2437
\tcapability: ESS (0x0001)
\tsignal: -71.40 dBm
\tSSID: Cafe Guest
BSS de:ad:be:ef:ca:fe(on wlan0) -- associated
\tcapability: ESS Privacy (0x0011)
\tsignal: -45.00 dBm
\tSSID: Office
\tWPA:\t * Version: 1
\t\t * Group cipher: TKIP
\t\t * Pairwise ciphers: TKIP
\t\t * Authentication suites: 802.1X
BSS 00:0a:0b:0c:0d:0e(on wlan0)
\tcapability: ESS Privacy (0x0011)
\tsignal: -88.00 dBm
\tSSID: OldRouter
";

    #[test]
    fn parse_sample_stanzas() {
        let networks = parse_iw_output(SAMPLE);
        assert_eq!(networks.len(), 4);

        assert_eq!(networks[0].ssid, "HomeNetwork");
        assert_eq!(networks[0].bssid, "aa:bb:cc:dd:ee:ff");
        assert_eq!(networks[0].level, -52);
        assert_eq!(networks[0].capabilities.as_deref(), Some("[WPA2-PSK-CCMP][ESS]"));

        assert_eq!(networks[1].ssid, "Cafe Guest");
        assert_eq!(networks[1].level, -71);
        assert_eq!(networks[1].capabilities.as_deref(), Some("[ESS]"));

        assert_eq!(networks[2].bssid, "de:ad:be:ef:ca:fe");
        assert_eq!(networks[2].capabilities.as_deref(), Some("[WPA-EAP-TKIP][ESS]"));

        assert_eq!(networks[3].capabilities.as_deref(), Some("[WEP][ESS]"));
    }

    #[test]
    fn missing_signal_and_ssid() {
        let networks = parse_iw_output("BSS 11:22:33:44:55:66(on wlan0)\n\tfreq: 2437\n");
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].ssid, "");
        assert_eq!(networks[0].level, -100);
        assert_eq!(networks[0].capabilities.as_deref(), Some(""));
    }

    #[test]
    fn empty_and_garbage_output() {
        assert!(parse_iw_output("").is_empty());
        assert!(parse_iw_output("command failed: Operation not permitted (-1)\n").is_empty());
        // malformed BSS line is skipped along with its fields
        assert!(parse_iw_output("BSS nonsense\n\tSSID: x\n").is_empty());
    }

    #[test]
    fn escaped_ssid_decoded() {
        let output = "BSS 11:22:33:44:55:66(on wlan0)\n\tSSID: Joe\\xe2\\x80\\x99s\\x20Wifi\n";
        let networks = parse_iw_output(output);
        assert_eq!(networks[0].ssid, "Joe\u{2019}s Wifi");

        assert_eq!(unescape_ssid("plain"), "plain");
        assert_eq!(unescape_ssid("bad\\xzz"), "bad\\xzz");
        assert_eq!(unescape_ssid("tail\\x4"), "tail\\x4");
    }

    #[test]
    fn args_follow_dump_flag() {
        let live = IwScanSource::new("wlp2s0");
        assert_eq!(live.args(), vec!["dev", "wlp2s0", "scan"]);
        let cached = live.with_dump(true);
        assert_eq!(cached.args(), vec!["dev", "wlp2s0", "scan", "dump"]);
        assert_eq!(cached.interface(), "wlp2s0");
    }

    #[test]
    fn default_interface() {
        assert_eq!(IwScanSource::default().interface(), DEFAULT_INTERFACE);
    }
}
