//! User agent selection for outbound fetches.

use rand::seq::IndexedRandom;

pub const USER_AGENT: &str = concat!("engine-sidecar/", env!("CARGO_PKG_VERSION"));

/// Browser agents used when the configured agent is "impersonate".
/// Search front pages serve degraded markup to unknown agents.
pub const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
];

/// Resolve the configured agent.
/// - None => the sidecar's own agent
/// - "impersonate" => a random browser agent
/// - other => used verbatim
pub fn resolve_user_agent(configured: Option<&str>) -> String {
    match configured {
        None | Some("") => USER_AGENT.to_string(),
        Some("impersonate") => BROWSER_USER_AGENTS
            .choose(&mut rand::rng())
            .copied()
            .unwrap_or(USER_AGENT)
            .to_string(),
        Some(custom) => custom.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_agent() {
        assert!(resolve_user_agent(None).starts_with("engine-sidecar/"));
        assert!(resolve_user_agent(Some("")).starts_with("engine-sidecar/"));
    }

    #[test]
    fn test_impersonate() {
        let ua = resolve_user_agent(Some("impersonate"));
        assert!(BROWSER_USER_AGENTS.contains(&ua.as_str()));
    }

    #[test]
    fn test_custom_agent() {
        assert_eq!(resolve_user_agent(Some("MyBot/1.0")), "MyBot/1.0");
    }
}
