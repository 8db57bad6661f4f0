use super::parse_bool_env;
use std::env;

/// Sustained rate plus the burst a client may spend before being throttled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub requests_per_second: u64,
    pub burst_size: u32,
}

impl RateLimitRule {
    const fn new(requests_per_second: u64, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size,
        }
    }

    /// Milliseconds between replenished permits, as governor expects it.
    /// Rates above 1000/s are capped at one permit per millisecond.
    pub fn replenish_interval_ms(&self) -> u64 {
        (1000 / self.requests_per_second.max(1)).max(1)
    }
}

/// Per-IP limits for report reads (list/get) and writes (submit/transitions).
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub read: RateLimitRule,
    pub write: RateLimitRule,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            read: RateLimitRule::new(30, 60),
            write: RateLimitRule::new(5, 10),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.enabled = parse_bool_env("RATE_LIMIT_ENABLED", cfg.enabled);

        if let Ok(raw) = env::var("RATE_LIMIT_CONFIG") {
            match parse_rate_limit_config(&raw) {
                Ok(parsed) => cfg = cfg.apply_partial(parsed),
                Err(err) => {
                    tracing::warn!("Invalid RATE_LIMIT_CONFIG '{}': {}", raw, err);
                }
            }
        }

        cfg
    }

    fn apply_partial(mut self, parsed: PartialRateLimitConfig) -> Self {
        if let Some(rule) = parsed.global {
            self.read = rule;
            self.write = rule;
        }
        if let Some(rule) = parsed.read {
            self.read = rule;
        }
        if let Some(rule) = parsed.write {
            self.write = rule;
        }
        self
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct PartialRateLimitConfig {
    global: Option<RateLimitRule>,
    read: Option<RateLimitRule>,
    write: Option<RateLimitRule>,
}

fn parse_rate_limit_config(raw: &str) -> Result<PartialRateLimitConfig, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty value".to_string());
    }

    // "10:20" applies to both groups
    if !trimmed.contains('=') {
        let rule = parse_rule(trimmed)?;
        return Ok(PartialRateLimitConfig {
            global: Some(rule),
            ..Default::default()
        });
    }

    // "read=30:60,write=5:10"
    let mut parsed = PartialRateLimitConfig::default();
    for item in trimmed.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let (name, raw_rule) = item
            .split_once('=')
            .ok_or_else(|| format!("invalid item '{}', expected name=rate:burst", item))?;
        let rule = parse_rule(raw_rule.trim())?;
        match name.trim().to_ascii_lowercase().as_str() {
            "read" => parsed.read = Some(rule),
            "write" => parsed.write = Some(rule),
            other => {
                return Err(format!("unknown group '{}', expected read/write", other));
            }
        }
    }

    Ok(parsed)
}

fn parse_rule(raw: &str) -> Result<RateLimitRule, String> {
    let (rate_raw, burst_raw) = raw
        .split_once(':')
        .ok_or_else(|| format!("invalid rule '{}', expected rate:burst", raw))?;

    let rate: u64 = rate_raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid requests per second '{}'", rate_raw.trim()))?;
    let burst_size: u32 = burst_raw
        .trim()
        .parse()
        .map_err(|_| format!("invalid burst_size '{}'", burst_raw.trim()))?;

    if rate == 0 {
        return Err("requests per second must be > 0".to_string());
    }
    if burst_size == 0 {
        return Err("burst_size must be > 0".to_string());
    }

    Ok(RateLimitRule::new(rate, burst_size))
}
