//! Redaction: deterministic scrubbing of customer data from text.
//!
//! Turns a filled proposal back into a blank template by replacing values
//! that identify a customer or a deal with bracketed tags:
//!
//! | Rule | Matches | Tag |
//! |------|---------|-----|
//! | 1 | `1/2/24`, `01-02-2024` | `[DATE]` |
//! | 2 | `jean@x.com` | `[EMAIL]` |
//! | 3 | `01 23 45 67 89`, `0123456789` | `[PHONE]` |
//! | 4 | `+33 1 23 45 67` | `[PHONE]` |
//! | 5 | `12,50 €`, `1 200 EUR` | `[AMOUNT]` |
//!
//! Amounts run last so a date followed by a currency sign is tagged as a
//! date. The rule set is re-applied until the text stops changing, which
//! makes [`redact`] idempotent. Every match contains a digit or an `@` and no
//! tag does, so the loop always terminates.

use once_cell::sync::Lazy;
use regex::Regex;

pub const DATE_TAG: &str = "[DATE]";
pub const EMAIL_TAG: &str = "[EMAIL]";
pub const PHONE_TAG: &str = "[PHONE]";
pub const AMOUNT_TAG: &str = "[AMOUNT]";

/// Every tag [`redact`] can emit.
pub const TAGS: [&str; 4] = [DATE_TAG, EMAIL_TAG, PHONE_TAG, AMOUNT_TAG];

/// Replace dates, e-mail addresses, phone numbers and amounts by their tags.
///
/// Total over any input; never panics.
pub fn redact(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let next = redact_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

/// `true` when the whole trimmed text is exactly one redaction tag.
pub fn is_tag(text: &str) -> bool {
    TAGS.contains(&text.trim())
}

fn redact_once(input: &str) -> String {
    let s = redact_dates(input);
    let s = redact_emails(&s);
    let s = redact_national_phones(&s);
    let s = redact_international_phones(&s);
    redact_amounts(&s)
}

// ── Rule 1: Dates ────────────────────────────────────────────────────────────

static RE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b").unwrap());

fn redact_dates(input: &str) -> String {
    RE_DATE.replace_all(input, DATE_TAG).into_owned()
}

// ── Rule 2: E-mail addresses ─────────────────────────────────────────────────

static RE_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
});

fn redact_emails(input: &str) -> String {
    RE_EMAIL.replace_all(input, EMAIL_TAG).into_owned()
}

// ── Rule 3: National phone numbers ───────────────────────────────────────────

/// Trunk prefix `0`, a non-zero digit, then four two-digit groups.
static RE_PHONE_NATIONAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b0[1-9](?:[ \u{00A0}]?\d{2}){4}\b").unwrap());

fn redact_national_phones(input: &str) -> String {
    RE_PHONE_NATIONAL.replace_all(input, PHONE_TAG).into_owned()
}

// ── Rule 4: International phone numbers ──────────────────────────────────────

static RE_PHONE_INTERNATIONAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+\d{1,3}(?:[ \u{00A0}]?\d{1,4}){1,4}\b").unwrap());

fn redact_international_phones(input: &str) -> String {
    RE_PHONE_INTERNATIONAL
        .replace_all(input, PHONE_TAG)
        .into_owned()
}

// ── Rule 5: Amounts ──────────────────────────────────────────────────────────

/// Digits with optional space/comma/dot grouping, then `€` or `EUR`.
/// Separators are horizontal only so an amount never spans two lines.
static RE_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d+(?:[ \u{00A0}\u{202F},.]\d+)*[ \u{00A0}\u{202F}]?(?:€|EUR\b)").unwrap()
});

fn redact_amounts(input: &str) -> String {
    RE_AMOUNT.replace_all(input, AMOUNT_TAG).into_owned()
}

// ── Tests ────────────────────────────────────────────────────────────────────
