use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use fetch_engine::{
    default_user_agent, FetchConfig, HeaderMap, HeaderName, HeaderValue, Mode,
    DEFAULT_MAX_BODY_BYTES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Markdown,
    Jsonl,
}

/// Fetch web pages as clean Markdown for AI-agent workflows.
///
/// Native Markdown is used when the server offers it, static HTML extraction
/// when it is good enough, and a headless browser otherwise.
#[derive(Debug, Parser)]
#[command(name = "agent-fetch", version, about, long_about)]
pub struct Cli {
    /// URLs to fetch; more than one runs a batch.
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// Fetch mode: auto, static, browser or raw.
    #[arg(long, default_value = "auto", value_parser = parse_mode)]
    pub mode: Mode,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
    pub format: OutputFormat,

    /// Include title/description metadata (front matter or the jsonl `meta` field).
    #[arg(long, default_value_t = true, action = ArgAction::Set, value_name = "BOOL")]
    pub meta: bool,

    /// HTTP request timeout for static/auto modes (e.g. 20s, 1m).
    #[arg(long, value_parser = parse_duration, default_value = "20s")]
    pub timeout: Duration,

    /// Page-load timeout for browser/auto modes.
    #[arg(long, value_parser = parse_duration, default_value = "30s")]
    pub browser_timeout: Duration,

    /// Quiet period after the last network activity before the page is captured.
    #[arg(long, value_parser = parse_duration, default_value = "1200ms")]
    pub network_idle: Duration,

    /// CSS selector to wait for before capturing, e.g. 'article' or '#content'.
    #[arg(long)]
    pub wait_selector: Option<String>,

    /// User-Agent header.
    #[arg(long, default_value_t = default_user_agent())]
    pub user_agent: String,

    /// Maximum response bytes to read.
    #[arg(long, default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: u64,

    /// Maximum concurrent fetches when several URLs are given.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
    pub concurrency: u32,

    /// Custom request header, repeatable: --header 'Authorization: Bearer token'.
    #[arg(long = "header", value_name = "KEY: VALUE", value_parser = parse_header)]
    pub headers: Vec<HeaderArg>,

    /// Browser executable path for browser/auto modes.
    #[arg(long)]
    pub browser_path: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// No log output at all.
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    pub fn fetch_config(&self) -> FetchConfig {
        let mut headers = HeaderMap::new();
        for header in &self.headers {
            headers.append(header.name.clone(), header.value.clone());
        }

        FetchConfig {
            mode: self.mode,
            http_timeout: self.timeout,
            browser_timeout: self.browser_timeout,
            network_idle: self.network_idle,
            wait_selector: self.wait_selector.clone(),
            user_agent: self.user_agent.clone(),
            headers,
            max_body_bytes: self.max_body_bytes,
            include_meta: self.meta,
            browser_path: self.browser_path.clone(),
            ..FetchConfig::default()
        }
        .normalized()
    }

    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            log::LevelFilter::Off
        } else {
            fetch_logging::level_for_verbosity(self.verbose)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderArg {
    pub name: HeaderName,
    pub value: HeaderValue,
}

fn parse_mode(raw: &str) -> Result<Mode, String> {
    raw.parse::<Mode>()
        .map_err(|_| format!("{raw:?}: expected auto, static, browser or raw"))
}

pub fn parse_header(raw: &str) -> Result<HeaderArg, String> {
    let (key, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("{raw:?}: expected 'Key: Value'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("{raw:?}: empty key"));
    }
    let name = HeaderName::from_bytes(key.as_bytes())
        .map_err(|err| format!("{raw:?}: invalid header name: {err}"))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|err| format!("{raw:?}: invalid header value: {err}"))?;
    Ok(HeaderArg { name, value })
}

/// Parses durations such as `1200ms`, `20s`, `1.5m`, `1h` or `1m30s`.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let input = raw.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("{input:?}: missing unit (ms, s, m or h)"))?;
        if number_len == 0 {
            return Err(format!("{input:?}: expected a number"));
        }
        let number = &rest[..number_len];
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit: u64 = match &rest[..unit_len] {
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            other => return Err(format!("{input:?}: unknown unit {other:?}")),
        };
        rest = &rest[unit_len..];

        let part = if number.contains('.') {
            let value: f64 = number
                .parse()
                .map_err(|_| format!("{input:?}: invalid number {number:?}"))?;
            Duration::try_from_secs_f64(value * nanos_per_unit as f64 / 1e9)
                .map_err(|_| format!("{input:?}: duration is out of range"))?
        } else {
            let value: u64 = number
                .parse()
                .map_err(|_| format!("{input:?}: invalid number {number:?}"))?;
            let nanos = value
                .checked_mul(nanos_per_unit)
                .ok_or_else(|| format!("{input:?}: duration is too large"))?;
            Duration::from_nanos(nanos)
        };
        total += part;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fetch_engine::{DEFAULT_BROWSER_TIMEOUT, DEFAULT_HTTP_TIMEOUT, DEFAULT_NETWORK_IDLE};
    use pretty_assertions::assert_eq;

    #[test]
    fn durations_accept_go_style_units() {
        assert_eq!(parse_duration("20s").unwrap(), Duration::from_secs(20));
        assert_eq!(parse_duration("1200ms").unwrap(), Duration::from_millis(1200));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1.5m").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn durations_reject_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("20").is_err());
        assert!(parse_duration("ten seconds").is_err());
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("99999999999999999999.5h")
            .unwrap_err()
            .contains("out of range"));
        assert!(parse_duration("99999999999h")
            .unwrap_err()
            .contains("too large"));
    }

    #[test]
    fn headers_are_trimmed_and_validated() {
        let header = parse_header(" Authorization :  Bearer abc ").unwrap();
        assert_eq!(header.name.as_str(), "authorization");
        assert_eq!(header.value, "Bearer abc");

        let empty_value = parse_header("X-Empty:").unwrap();
        assert_eq!(empty_value.value, "");

        assert!(parse_header("no-colon").unwrap_err().contains("expected 'Key: Value'"));
        assert!(parse_header(": value").unwrap_err().contains("empty key"));
    }

    #[test]
    fn defaults_match_the_engine() {
        let cli = Cli::try_parse_from(["agent-fetch", "https://example.com"]).unwrap();
        let config = cli.fetch_config();
        assert_eq!(config.mode, Mode::Auto);
        assert_eq!(config.http_timeout, DEFAULT_HTTP_TIMEOUT);
        assert_eq!(config.browser_timeout, DEFAULT_BROWSER_TIMEOUT);
        assert_eq!(config.network_idle, DEFAULT_NETWORK_IDLE);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert!(config.include_meta);
        assert_eq!(cli.concurrency, 4);
        assert_eq!(cli.format, OutputFormat::Markdown);
        assert_eq!(cli.log_level(), log::LevelFilter::Warn);
    }

    #[test]
    fn flags_flow_into_the_config() {
        let cli = Cli::try_parse_from([
            "agent-fetch",
            "--mode",
            "STATIC",
            "--format",
            "jsonl",
            "--meta",
            "false",
            "--timeout",
            "5s",
            "--header",
            "Cookie: a=1",
            "--header",
            "cookie: b=2",
            "-vv",
            "https://a.test",
            "https://b.test",
        ])
        .unwrap();
        let config = cli.fetch_config();

        assert_eq!(config.mode, Mode::Static);
        assert_eq!(cli.format, OutputFormat::Jsonl);
        assert!(!config.include_meta);
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        let cookies: Vec<_> = config.headers.get_all("cookie").iter().collect();
        assert_eq!(cookies, vec!["a=1", "b=2"]);
        assert_eq!(cli.urls.len(), 2);
        assert_eq!(cli.log_level(), log::LevelFilter::Debug);
    }

    #[test]
    fn usage_errors_are_rejected() {
        assert!(Cli::try_parse_from(["agent-fetch"]).is_err());
        assert!(Cli::try_parse_from(["agent-fetch", "--concurrency", "0", "https://a.test"]).is_err());
        assert!(Cli::try_parse_from(["agent-fetch", "--mode", "turbo", "https://a.test"]).is_err());
        assert!(Cli::try_parse_from(["agent-fetch", "--header", "bad", "https://a.test"]).is_err());
        assert!(Cli::try_parse_from(["agent-fetch", "-q", "-v", "https://a.test"]).is_err());
    }
}
