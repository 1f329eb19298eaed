// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Supply levels and alerts scraped from a printer's embedded web server.
//
// Candidate URLs are tried in order: https, https:443, http, http:80.
// Printer web UIs almost always present self-signed certificates, so
// certificate validation is off. Each page is matched against the configured
// selector patterns, most specific first; when none matches, the rendered
// text is searched for "Black: 45%" style labels.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info};

use tonerscope_core::config::{ProbeConfig, ProbeTables};
use tonerscope_core::error::{ProbeError, Result, TonerscopeError};
use tonerscope_core::types::{ProbeMethod, StatusReading};

use crate::resolver::StatusProbe;

/// Fetches a page body. Non-success HTTP statuses are errors.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<String, ProbeError>;
}

/// `HttpFetcher` over `reqwest`.
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .redirect(reqwest::redirect::Policy::limited(config.http_max_redirects))
            .danger_accept_invalid_certs(true)
            // No keep-alive: each probe opens and closes its own connection.
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| TonerscopeError::Config(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<String, ProbeError> {
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Http {
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(map_reqwest_error)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ProbeError {
    if e.is_timeout() {
        ProbeError::Timeout
    } else {
        ProbeError::Transport(e.to_string())
    }
}

/// Base URLs tried for a printer, in order.
pub fn candidate_urls(target: IpAddr) -> Vec<String> {
    let host = match target {
        IpAddr::V4(ip) => ip.to_string(),
        IpAddr::V6(ip) => format!("[{ip}]"),
    };
    [("https", ""), ("https", ":443"), ("http", ""), ("http", ":80")]
        .into_iter()
        .map(|(scheme, port)| format!("{scheme}://{host}{port}"))
        .collect()
}

struct CompiledPattern {
    name: String,
    supplies: Selector,
    alerts: Selector,
}

/// Extracts a [`StatusReading`] from status page HTML.
pub struct StatusPageParser {
    patterns: Vec<CompiledPattern>,
    channel_order: Vec<String>,
    tables: ProbeTables,
    first_number: Regex,
    labelled_percent: Regex,
}

impl StatusPageParser {
    /// Compile the selector patterns from `tables`.
    pub fn new(tables: ProbeTables) -> Result<Self> {
        let compile = |css: &str| {
            Selector::parse(css)
                .map_err(|e| TonerscopeError::Config(format!("invalid selector '{css}': {e:?}")))
        };
        let patterns = tables
            .web_patterns
            .iter()
            .map(|p| -> Result<CompiledPattern> {
                Ok(CompiledPattern {
                    name: p.name.clone(),
                    supplies: compile(&p.supplies)?,
                    alerts: compile(&p.alerts)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let regex = |pattern: &str| {
            Regex::new(pattern).map_err(|e| TonerscopeError::Config(format!("regex: {e}")))
        };

        Ok(Self {
            patterns,
            channel_order: tables.web_channel_order.clone(),
            first_number: regex(r"(\d+)\s*%?")?,
            labelled_percent: regex(r"([A-Za-z][A-Za-z0-9_-]*)\s*:\s*(\d{1,3})\s*%")?,
            tables,
        })
    }

    /// Parse a page. `None` when nothing on it looks like supply or alert data.
    pub fn parse(&self, html: &str) -> Option<StatusReading> {
        let document = Html::parse_document(html);

        for pattern in &self.patterns {
            let mut reading = StatusReading::default();

            // Channels follow the gauge's position, so an unreadable gauge
            // leaves its colour empty instead of shifting the rest.
            let levels = document
                .select(&pattern.supplies)
                .enumerate()
                .filter_map(|(position, element)| {
                    Some((position, self.extract_percent(&element_text(&element))?))
                });
            for (position, percent) in levels {
                reading.supplies.insert(self.channel_at(position), percent);
            }

            for element in document.select(&pattern.alerts) {
                let text = element_text(&element);
                if !text.is_empty() {
                    reading.push_error(text);
                }
            }

            if reading.has_data() {
                debug!(pattern = %pattern.name, supplies = reading.supplies.len(), errors = reading.errors.len(), "selector pattern matched");
                return Some(reading);
            }
        }

        let text = document.root_element().text().collect::<Vec<_>>().join(" ");
        self.parse_text(&text)
    }

    /// Free-text fallback: "{word}: NN%" where the word names a supply.
    fn parse_text(&self, text: &str) -> Option<StatusReading> {
        let mut reading = StatusReading::default();
        for capture in self.labelled_percent.captures_iter(text) {
            let word = capture[1].to_lowercase();
            let Ok(percent) = capture[2].parse::<i64>() else {
                continue;
            };
            let channel = match self.tables.color_channel(&word) {
                Some(channel) => channel.to_string(),
                None if self.tables.mentions_supply(&word) => word,
                None => continue,
            };
            if !reading.supplies.contains(&channel) {
                reading.supplies.insert(channel, percent);
            }
        }
        reading.has_data().then_some(reading)
    }

    fn extract_percent(&self, text: &str) -> Option<i64> {
        self.first_number
            .captures(text)
            .and_then(|c| c[1].parse::<i64>().ok())
    }

    fn channel_at(&self, position: usize) -> String {
        self.channel_order
            .get(position)
            .cloned()
            .unwrap_or_else(|| format!("supply_{}", position + 1))
    }
}

/// Whitespace-collapsed text content of an element.
fn element_text(element: &scraper::ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Status probe over the printer's embedded web pages.
pub struct WebProbe {
    fetcher: Arc<dyn HttpFetcher>,
    parser: StatusPageParser,
}

impl WebProbe {
    pub fn new(fetcher: Arc<dyn HttpFetcher>, tables: ProbeTables) -> Result<Self> {
        Ok(Self {
            fetcher,
            parser: StatusPageParser::new(tables)?,
        })
    }

    /// Walk the candidate URLs and return the first page with data.
    pub async fn web_status(&self, target: IpAddr) -> std::result::Result<StatusReading, ProbeError> {
        let mut reached_any = false;
        let mut last_error: Option<ProbeError> = None;

        for url in candidate_urls(target) {
            match self.fetcher.fetch(&url).await {
                Ok(body) => {
                    reached_any = true;
                    if let Some(reading) = self.parser.parse(&body) {
                        info!(
                            addr = %target,
                            url = %url,
                            supplies = reading.supplies.len(),
                            errors = reading.errors.len(),
                            "web status read"
                        );
                        return Ok(reading);
                    }
                    debug!(addr = %target, url = %url, "page has no supply or alert data");
                }
                Err(e) => {
                    debug!(addr = %target, url = %url, error = %e, "web page unavailable");
                    last_error = Some(e);
                }
            }
        }

        let reason = match (reached_any, last_error) {
            (true, _) => "pages reachable but held no supply or alert data".to_string(),
            (false, Some(e)) => format!("no page reachable (last error: {e})"),
            (false, None) => "no candidate URLs".to_string(),
        };
        Err(ProbeError::WebUnavailable(reason))
    }
}

#[async_trait]
impl StatusProbe for WebProbe {
    fn method(&self) -> ProbeMethod {
        ProbeMethod::Web
    }

    async fn read_status(
        &self,
        target: IpAddr,
        _community: &str,
    ) -> std::result::Result<StatusReading, ProbeError> {
        self.web_status(target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    use crate::testing::FakeHttp;

    const PRINTER: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7));

    fn parser() -> StatusPageParser {
        StatusPageParser::new(ProbeTables::default()).unwrap()
    }

    #[test]
    fn urls_cover_both_schemes() {
        assert_eq!(
            candidate_urls(PRINTER),
            vec![
                "https://10.0.0.7",
                "https://10.0.0.7:443",
                "http://10.0.0.7",
                "http://10.0.0.7:80",
            ]
        );
        let v6 = candidate_urls(IpAddr::V6(Ipv6Addr::LOCALHOST));
        assert_eq!(v6[0], "https://[::1]");
    }

    #[test]
    fn vendor_gauges_take_positional_channels() {
        let html = r#"<table>
            <tr><td class="SupplyGauge">85%</td></tr>
            <tr><td class="SupplyGauge">40 %</td></tr>
            <tr><td class="SupplyGauge">12%</td></tr>
            <tr><td class="SupplyGauge">--</td></tr>
            <tr><td class="SupplyGauge">3%</td></tr>
            <tr><td class="SupplyGauge">77</td></tr>
        </table>"#;
        let reading = parser().parse(html).unwrap();
        assert_eq!(reading.supplies.get("black"), Some(85));
        assert_eq!(reading.supplies.get("cyan"), Some(40));
        assert_eq!(reading.supplies.get("magenta"), Some(12));
        assert_eq!(reading.supplies.get("yellow"), None);
        assert_eq!(reading.supplies.get("supply_5"), Some(3));
        assert_eq!(reading.supplies.get("supply_6"), Some(77));
        assert!(reading.errors.is_empty());
    }

    #[test]
    fn generic_supply_level_with_alerts() {
        let html = r#"<div class="supply-level">Black 62%</div>
            <div class="error-message"> Paper Jam </div>
            <div class="error-message">Paper Jam</div>
            <div class="error-message">Tray 2   Empty</div>"#;
        let reading = parser().parse(html).unwrap();
        assert_eq!(reading.supplies.get("black"), Some(62));
        assert_eq!(reading.errors, vec!["Paper Jam", "Tray 2 Empty"]);
    }

    #[test]
    fn loose_class_match() {
        let html = r#"<span class="tonerRemain">55%</span><p class="sys-alert-text">Cover Open</p>"#;
        let reading = parser().parse(html).unwrap();
        assert_eq!(reading.supplies.get("black"), Some(55));
        assert_eq!(reading.errors, vec!["Cover Open"]);
    }

    #[test]
    fn lone_alert_short_circuits_later_patterns() {
        let html = r#"<div class="status-alert">Toner Low</div><div class="supply-level">40%</div>"#;
        let reading = parser().parse(html).unwrap();
        assert_eq!(reading.errors, vec!["Toner Low"]);
        assert!(reading.supplies.is_empty());
    }

    #[test]
    fn free_text_fallback_accepts_supply_words_only() {
        let html = "<p>Black: 45%</p><p>Cyan: 80 %</p><p>Uptime: 99%</p><p>Toner: 130%</p>";
        let reading = parser().parse(html).unwrap();
        assert_eq!(reading.supplies.get("black"), Some(45));
        assert_eq!(reading.supplies.get("cyan"), Some(80));
        assert_eq!(reading.supplies.get("toner"), Some(100));
        assert!(!reading.supplies.contains("uptime"));
    }

    #[test]
    fn page_without_data_yields_none() {
        assert!(parser().parse("<html><body><h1>Welcome</h1></body></html>").is_none());
    }

    #[test]
    fn invalid_configured_selector_is_a_config_error() {
        let mut tables = ProbeTables::default();
        tables.web_patterns[0].supplies = "td[".into();
        assert!(matches!(
            StatusPageParser::new(tables),
            Err(TonerscopeError::Config(_))
        ));
    }

    #[tokio::test]
    async fn third_candidate_supplies_the_alert() {
        let blank = "<html><body><p>Device Home</p></body></html>";
        let fake = Arc::new(
            FakeHttp::new()
                .with_page("https://10.0.0.7", blank)
                .with_page("https://10.0.0.7:443", blank)
                .with_page(
                    "http://10.0.0.7",
                    r#"<ul><li class="error-message">Paper Jam</li></ul>"#,
                ),
        );
        let probe = WebProbe::new(fake.clone(), ProbeTables::default()).unwrap();

        let reading = probe.web_status(PRINTER).await.unwrap();
        assert_eq!(reading.errors, vec!["Paper Jam"]);
        assert_eq!(fake.requested().len(), 3);
    }

    #[tokio::test]
    async fn unreachable_everywhere_is_web_unavailable() {
        let fake = Arc::new(
            FakeHttp::new().with_failure("https://10.0.0.7", ProbeError::Timeout),
        );
        let probe = WebProbe::new(fake.clone(), ProbeTables::default()).unwrap();

        let err = probe.web_status(PRINTER).await.unwrap_err();
        assert!(matches!(err, ProbeError::WebUnavailable(_)));
        assert_eq!(fake.requested().len(), 4);
    }

    #[tokio::test]
    async fn http_errors_move_to_next_candidate() {
        let fake = Arc::new(
            FakeHttp::new()
                .with_failure("https://10.0.0.7", ProbeError::Http { status: 404 })
                .with_page("https://10.0.0.7:443", r#"<div class="supply-level">20%</div>"#),
        );
        let probe = WebProbe::new(fake, ProbeTables::default()).unwrap();
        let reading = probe.web_status(PRINTER).await.unwrap();
        assert_eq!(reading.supplies.get("black"), Some(20));
    }
}
