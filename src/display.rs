//! Display model: the named values the dashboard renders.
//!
//! Handlers never touch the terminal. They write formatted strings into
//! [`Display`] under stable element ids (`cpu_usage`, `diskrs`, ...), plus
//! an optional detail string per id, and the UI reads them back.

use std::collections::BTreeMap;

/// Suffix appended to the monitored host name in the page title.
pub const TITLE_SUFFIX: &str = "PyroScope Monitoring";

/// Everything currently shown on the dashboard, keyed by element id.
#[derive(Clone, Debug, Default)]
pub struct Display {
    texts: BTreeMap<String, String>,
    titles: BTreeMap<String, String>,
    page_title: Option<String>,
    heartbeat: bool,
    error_banner: Option<String>,
}

impl Display {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_text(&mut self, id: impl Into<String>, text: impl Into<String>) {
        self.texts.insert(id.into(), text.into());
    }

    /// Set the secondary detail (the tooltip) for an element.
    pub fn set_title(&mut self, id: impl Into<String>, title: impl Into<String>) {
        self.titles.insert(id.into(), title.into());
    }

    pub fn text(&self, id: &str) -> Option<&str> {
        self.texts.get(id).map(String::as_str)
    }

    pub fn title(&self, id: &str) -> Option<&str> {
        self.titles.get(id).map(String::as_str)
    }

    /// Text of `id`, or a placeholder while nothing was received yet.
    pub fn text_or_dash(&self, id: &str) -> &str {
        self.text(id).unwrap_or("-")
    }

    /// Ids starting with `prefix`, in sorted order.
    pub fn texts_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.texts
            .range(prefix.to_string()..)
            .take_while(move |(id, _)| id.starts_with(prefix))
            .map(|(id, text)| (id.as_str(), text.as_str()))
    }

    pub fn set_host(&mut self, fqdn: &str) {
        self.page_title = Some(format!("{} - {}", fqdn, TITLE_SUFFIX));
    }

    pub fn page_title(&self) -> &str {
        self.page_title.as_deref().unwrap_or(TITLE_SUFFIX)
    }

    pub fn set_heartbeat(&mut self, on: bool) {
        self.heartbeat = on;
    }

    pub fn heartbeat(&self) -> bool {
        self.heartbeat
    }

    pub fn show_error(&mut self, banner: impl Into<String>) {
        self.error_banner = Some(banner.into());
    }

    pub fn clear_error(&mut self) {
        self.error_banner = None;
    }

    pub fn error_banner(&self) -> Option<&str> {
        self.error_banner.as_deref()
    }
}
