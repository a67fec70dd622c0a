//! Element locators for the extension popup and Google Scholar pages.

use crate::driver::Locator;

/// Id of the iframe the patched extension renders its popup into.
pub const POPUP_FRAME: &str = "bibquery-popup";

/// Placeholder the popup shows while the extension is still parsing.
pub const LOADING_SENTINEL: &str = "Loading page...";

pub fn popup_frame() -> Locator {
    Locator::xpath(format!("//iframe[@id='{}']", POPUP_FRAME))
}

pub fn result_textarea() -> Locator {
    Locator::xpath("//textarea[@id='textToCopy']")
}

pub fn search_input() -> Locator {
    Locator::name("q")
}

pub fn search_button() -> Locator {
    Locator::name("btnG")
}

/// "Cite" link of the first search result.
pub fn citation_link() -> Locator {
    Locator::xpath("//a[@aria-controls='gs_cit']")
}

/// reCAPTCHA widget shown instead of results when Scholar suspects automation.
pub fn challenge_frame() -> Locator {
    Locator::xpath("//iframe[contains(@src, 'recaptcha') or contains(@title, 'reCAPTCHA')]")
}

pub fn bibtex_link() -> Locator {
    Locator::xpath("//a[contains(text(), 'BibTeX')]")
}

/// Plain-text BibTeX as rendered by the browser.
pub fn bibtex_body() -> Locator {
    Locator::xpath("/html/body/pre")
}
