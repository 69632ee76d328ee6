use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]+"#).expect("invalid url regex")
});

/// Extract http(s) URLs in order of appearance, without duplicates.
///
/// Trailing sentence punctuation is not part of the URL.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for found in URL_PATTERN.find_iter(text) {
        let url = found
            .as_str()
            .trim_end_matches(['.', ',', ';', ':', '!', '?', ')', '\'']);
        if !urls.iter().any(|existing| existing == url) {
            urls.push(url.to_string());
        }
    }
    urls
}

/// Host of `url` without a leading `www.`, lowercased.
pub fn outlet_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_urls_in_order() {
        let text = "Urgent: verify at http://suspicious-link.com/login. Or https://www.bank.example/?a=1, \
                    then again http://suspicious-link.com/login";
        assert_eq!(
            extract_urls(text),
            vec![
                "http://suspicious-link.com/login".to_string(),
                "https://www.bank.example/?a=1".to_string(),
            ]
        );
    }

    #[test]
    fn no_urls_yields_empty_list() {
        assert!(extract_urls("Earth is flat").is_empty());
    }

    #[test]
    fn outlet_domain_strips_www() {
        assert_eq!(
            outlet_domain("https://www.BBC.co.uk/news/1").as_deref(),
            Some("bbc.co.uk")
        );
        assert_eq!(outlet_domain("not a url"), None);
    }
}
