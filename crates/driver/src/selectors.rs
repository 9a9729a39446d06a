//! Selector strings for the Flow tool's pages.
//!
//! The remote UI uses generated class names, so most lookups keep a
//! text-based or attribute-based fallback next to the exact selector.

use flowgen_core::driver::ProbeStrategy;

/// User agent presented by automated sessions.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Every selector the session uses.
#[derive(Debug, Clone)]
pub struct FlowSelectors {
    /// Any one present means a signed-in account.
    pub auth_indicators: Vec<String>,
    pub new_project_button: String,
    /// XPath fallback matching the button by its label.
    pub new_project_by_text: String,
    pub prompt_textarea: String,
    pub submit_button: String,
    /// Rendered videos served from Google storage.
    pub generated_video: String,
}

impl Default for FlowSelectors {
    fn default() -> Self {
        Self {
            auth_indicators: [
                r#"img[alt*="profile"]"#,
                "[data-ogsr-up]",
                ".gb_d",
                r#"[aria-label*="Account"]"#,
                ".gb_D",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            new_project_button: "button.sc-7d2e2cf5-1.hoBDwb.sc-e877996-0.eCyFgY".into(),
            new_project_by_text: "//button[contains(normalize-space(.), 'New project')]".into(),
            prompt_textarea: "#PINHOLE_TEXT_AREA_ELEMENT_ID".into(),
            submit_button: "button.sc-7d2e2cf5-1.hwJkVV.sc-408537d4-2.gdXWm".into(),
            generated_video: r#"video[src*="storage.googleapis.com"]"#.into(),
        }
    }
}

/// Progress probes in priority order: the exact percentage label first, then
/// anything whose class mentions progress or percentage.
pub fn default_probe_strategies() -> Vec<ProbeStrategy> {
    vec![
        ProbeStrategy::new("percentage_label", ".sc-dd6abb21-1.iEQNVH"),
        ProbeStrategy::new("progress_class", r#"[class*="progress"]"#),
        ProbeStrategy::new("percentage_class", r#"[class*="percentage"]"#),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_order_is_exact_label_first() {
        let names: Vec<_> = default_probe_strategies()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, ["percentage_label", "progress_class", "percentage_class"]);
    }

    #[test]
    fn default_selectors_cover_every_auth_indicator() {
        let selectors = FlowSelectors::default();
        assert_eq!(selectors.auth_indicators.len(), 5);
        assert!(selectors.generated_video.contains("storage.googleapis.com"));
    }
}
