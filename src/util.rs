const LEDGER_BASE_URL: &str = "LEDGER_BASE_URL";

const DEFAULT_BASE_URL: &str = "http://localhost:8080";

pub fn get_default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

pub fn get_base_url() -> Option<String> {
    std::env::var(LEDGER_BASE_URL)
        .ok()
        .filter(|url| !url.trim().is_empty())
}

const RPS: &str = "RPS";

const DEFAULT_RPS: u32 = 10;

pub fn get_default_rps() -> u32 {
    DEFAULT_RPS
}

/// Requests per second from the environment; non-positive or garbage values are ignored
pub fn get_rps() -> Option<u32> {
    parse_positive(std::env::var(RPS).ok().as_deref())
}

const DURATION: &str = "DURATION";

const DEFAULT_DURATION: u64 = 30;

pub fn get_default_duration() -> u64 {
    DEFAULT_DURATION
}

/// Run duration in seconds from the environment
pub fn get_duration() -> Option<u64> {
    parse_positive(std::env::var(DURATION).ok().as_deref())
}

fn parse_positive<T>(value: Option<&str>) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    value
        .and_then(|raw| raw.trim().parse::<T>().ok())
        .filter(|parsed| *parsed > T::default())
}
