//! The loading indicator.
//!
//! [`LoadStatus`] is what should be shown; a [`StatusDisplay`] shows it. On the web
//! that is the page element with id `loading`, natively it goes to the log.

/// Text shown for any load failure. The reason itself only goes to the log.
pub const FAILURE_TEXT: &str = "Load failed";

pub const LOADING_TEXT: &str = "Loading...";

/// Id of the page element used on the web.
pub const STATUS_ELEMENT_ID: &str = "loading";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Hidden,
    /// Loading, with a percentage once the model download size is known.
    Loading(Option<u8>),
    Failed { reason: String },
}

impl LoadStatus {
    pub fn is_visible(&self) -> bool {
        !matches!(self, LoadStatus::Hidden)
    }

    pub fn text(&self) -> String {
        match self {
            LoadStatus::Hidden => String::new(),
            LoadStatus::Loading(None) => LOADING_TEXT.to_string(),
            LoadStatus::Loading(Some(percent)) => format!("{LOADING_TEXT} {percent}%"),
            LoadStatus::Failed { .. } => FAILURE_TEXT.to_string(),
        }
    }
}

pub trait StatusDisplay {
    fn show(&mut self, status: &LoadStatus);
}

/// Keeps only the latest status. Handy where nothing is rendered, e.g. in tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStatus {
    pub current: Option<LoadStatus>,
    pub updates: usize,
}

impl StatusDisplay for MemoryStatus {
    fn show(&mut self, status: &LoadStatus) {
        self.current = Some(status.clone());
        self.updates += 1;
    }
}

/// Reports status changes through `log`.
#[derive(Debug, Clone, Default)]
pub struct LogStatus {
    last: Option<LoadStatus>,
}

impl StatusDisplay for LogStatus {
    fn show(&mut self, status: &LoadStatus) {
        if self.last.as_ref() == Some(status) {
            return;
        }
        match status {
            LoadStatus::Hidden => log::info!("loading finished"),
            LoadStatus::Loading(_) => log::info!("{}", status.text()),
            LoadStatus::Failed { reason } => log::warn!("{} ({reason})", status.text()),
        }
        self.last = Some(status.clone());
    }
}

/// Drives the `loading` element of the page.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone)]
pub struct DomStatus {
    element: Option<web_sys::HtmlElement>,
}

#[cfg(target_arch = "wasm32")]
impl DomStatus {
    pub fn new() -> Self {
        use wasm_bindgen::JsCast;

        let element = web_sys::window()
            .and_then(|window| window.document())
            .and_then(|document| document.get_element_by_id(STATUS_ELEMENT_ID))
            .and_then(|element| element.dyn_into::<web_sys::HtmlElement>().ok());
        if element.is_none() {
            log::warn!("no #{STATUS_ELEMENT_ID} element on the page, status will not be shown");
        }
        Self { element }
    }
}

#[cfg(target_arch = "wasm32")]
impl StatusDisplay for DomStatus {
    fn show(&mut self, status: &LoadStatus) {
        let Some(element) = &self.element else {
            return;
        };
        let display = if status.is_visible() { "block" } else { "none" };
        if let Err(e) = element.style().set_property("display", display) {
            log::warn!("could not update status visibility: {e:?}");
        }
        if status.is_visible() {
            element.set_text_content(Some(&status.text()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texts() {
        assert_eq!(LoadStatus::Loading(None).text(), "Loading...");
        assert_eq!(LoadStatus::Loading(Some(42)).text(), "Loading... 42%");
        assert_eq!(LoadStatus::Hidden.text(), "");
    }

    #[test]
    fn failure_text_does_not_leak_the_reason() {
        let status = LoadStatus::Failed {
            reason: "failed to fetch ./img/green-apple3d/apple02.obj".to_string(),
        };
        assert_eq!(status.text(), FAILURE_TEXT);
        assert!(status.is_visible());
    }

    #[test]
    fn memory_status_keeps_the_latest() {
        let mut display = MemoryStatus::default();
        display.show(&LoadStatus::Loading(None));
        display.show(&LoadStatus::Loading(Some(10)));
        display.show(&LoadStatus::Hidden);
        assert_eq!(display.current, Some(LoadStatus::Hidden));
        assert_eq!(display.updates, 3);
    }
}
