//! Site selectors.
//!
//! These mirror the recruiting site's current markup and break whenever it is
//! redesigned. Nothing outside this file should spell a selector.

use crate::driver::webdriver::Locator;

/// Login entry in the header; its presence also marks the landing page as loaded.
pub const LOGIN_ENTRY: &str = "//*[@id='header']/div[1]/div[3]/div/a";
/// External identity provider button on the login panel.
pub const IDENTITY_PROVIDER_BUTTON: &str =
    "//*[@id='wrap']/div/div[2]/div[2]/div[2]/div[1]/div[4]/a";
/// Identity provider logo shown while the QR confirmation is pending.
pub const IDENTITY_PROVIDER_MARKER: &str =
    "//*[@id='wrap']/div/div[2]/div[2]/div[1]/div[2]/div[1]/img";
/// Header entry that only exists for a logged-in user.
pub const LOGGED_IN_MARKER: &str = "//*[@id='header']/div[1]/div[3]/ul/li[2]/a";

pub const FILTER_SHORTCUTS: &str = "//*[@class='recommend-job-btn has-tooltip']";
pub const FILTER_DROPDOWN_TRIGGER: &str = "//*[@id='wrap']/div[2]/div[1]/div/div[1]/div";
pub const FILTER_DROPDOWN_PANEL: &str = "ul.dropdown-expect-list";

pub const JOB_DESCRIPTION: &str = "//*[@id='wrap']/div[2]/div[2]/div/div/div[2]/div/div[2]/p";
pub const CONTACT_LABEL: &str = ".op-btn.op-btn-chat";
pub const CONTACT_BUTTON: &str =
    "//*[@id='wrap']/div[2]/div[2]/div/div/div[2]/div/div[1]/div[2]/a[2]";
pub const CHAT_INPUT: &str = "//*[@id='chat-input']";

pub fn login_entry() -> Locator {
    Locator::xpath(LOGIN_ENTRY)
}

pub fn identity_provider_button() -> Locator {
    Locator::xpath(IDENTITY_PROVIDER_BUTTON)
}

pub fn identity_provider_marker() -> Locator {
    Locator::xpath(IDENTITY_PROVIDER_MARKER)
}

pub fn logged_in_marker() -> Locator {
    Locator::xpath(LOGGED_IN_MARKER)
}

pub fn filter_shortcuts() -> Locator {
    Locator::xpath(FILTER_SHORTCUTS)
}

pub fn filter_dropdown_trigger() -> Locator {
    Locator::xpath(FILTER_DROPDOWN_TRIGGER)
}

pub fn filter_dropdown_panel() -> Locator {
    Locator::css(FILTER_DROPDOWN_PANEL)
}

/// Dropdown entry whose text contains `label`.
pub fn filter_option(label: &str) -> Locator {
    Locator::xpath(format!("//li[contains(text(), {})]", xpath_literal(label)))
}

/// Posting at 1-based `index` in the recommendation list.
pub fn posting_at(index: usize) -> Locator {
    Locator::xpath(format!(
        "//*[@id='wrap']/div[2]/div[2]/div/div/div[1]/ul/li[{index}]"
    ))
}

pub fn job_description() -> Locator {
    Locator::xpath(JOB_DESCRIPTION)
}

pub fn contact_label() -> Locator {
    Locator::css(CONTACT_LABEL)
}

pub fn contact_button() -> Locator {
    Locator::xpath(CONTACT_BUTTON)
}

pub fn chat_input() -> Locator {
    Locator::xpath(CHAT_INPUT)
}

/// Quotes `value` as an XPath 1.0 string literal. XPath has no escape syntax,
/// so a value containing both quote kinds is built with `concat()`.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{value}'")
    } else if !value.contains('"') {
        format!("\"{value}\"")
    } else {
        let parts: Vec<String> = value
            .split('\'')
            .map(|part| format!("'{part}'"))
            .collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xpath_literal_plain() {
        assert_eq!(xpath_literal("iOS（深圳）"), "'iOS（深圳）'");
    }

    #[test]
    fn test_xpath_literal_with_single_quote() {
        assert_eq!(xpath_literal("Women's Health"), "\"Women's Health\"");
    }

    #[test]
    fn test_xpath_literal_with_both_quotes() {
        assert_eq!(
            xpath_literal(r#"a'b"c"#),
            r#"concat('a', "'", 'b"c')"#
        );
    }

    #[test]
    fn test_filter_option_and_posting_locators() {
        assert_eq!(
            filter_option("iOS (City X)").value(),
            "//li[contains(text(), 'iOS (City X)')]"
        );
        assert!(posting_at(3).value().ends_with("/ul/li[3]"));
    }
}
