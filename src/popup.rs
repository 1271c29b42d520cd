/// Opens authorization URLs for the user.
pub trait Popup: Send + Sync {
    /// Returns `None` when the window could not be opened (blocked).
    fn open(&self, url: &str) -> Option<Box<dyn PopupWindow>>;
}

/// A window opened by a [`Popup`].
pub trait PopupWindow: Send + Sync {
    fn is_closed(&self) -> bool;

    fn close(&self);
}

/// Opens the system browser.
///
/// A browser tab gives no handle back, so its window never reports closed
/// and closing it is a no-op; the link timeout ends abandoned handshakes.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserPopup;

struct BrowserTab;

impl PopupWindow for BrowserTab {
    fn is_closed(&self) -> bool {
        false
    }

    fn close(&self) {}
}

impl Popup for BrowserPopup {
    fn open(&self, url: &str) -> Option<Box<dyn PopupWindow>> {
        match webbrowser::open(url) {
            Ok(_) => {
                tracing::info!("opened {} in your browser", url);
                Some(Box::new(BrowserTab))
            }
            Err(err) => {
                tracing::warn!(
                    "failed to open a browser: {}. Please navigate here manually: {}",
                    err,
                    url
                );
                None
            }
        }
    }
}
