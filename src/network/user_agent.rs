//! Outbound request headers

use rand::seq::SliceRandom;

const FALLBACK_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Pick a realistic desktop browser user agent
pub fn generate_user_agent() -> String {
    let mut rng = rand::thread_rng();

    let chrome_versions = ["121.0.0.0", "122.0.0.0", "123.0.0.0", "124.0.0.0", "125.0.0.0"];
    let os_strings = [
        "Windows NT 10.0; Win64; x64",
        "Macintosh; Intel Mac OS X 10_15_7",
        "X11; Linux x86_64",
    ];

    match (os_strings.choose(&mut rng), chrome_versions.choose(&mut rng)) {
        (Some(os), Some(chrome)) => format!(
            "Mozilla/5.0 ({}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{} Safari/537.36",
            os, chrome
        ),
        _ => FALLBACK_USER_AGENT.to_string(),
    }
}

/// What a tool expects back from its provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    Html,
    Json,
}

impl Accept {
    pub fn header_value(self) -> &'static str {
        match self {
            Self::Html => {
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"
            }
            Self::Json => "application/json,text/javascript,*/*;q=0.01",
        }
    }
}
