//! PII masking.
//!
//! Each masker rewrites matches with an explicit replacement token and
//! reports how many substitutions were made. Patterns are compiled
//! once and shared; they are read-only and safe across threads.
use lazy_static::lazy_static;
use regex::Regex;

pub const EMAIL_TOKEN: &str = "|||EMAIL_ADDRESS|||";
pub const PHONE_TOKEN: &str = "|||PHONE_NUMBER|||";
pub const IP_TOKEN: &str = "|||IP_ADDRESS|||";

lazy_static! {
    static ref EMAIL: Regex =
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap();
    // North-American forms: bare 10 digits, (nnn) nnn nnnn, nnn-nnn-nnnn
    static ref PHONE: Regex =
        Regex::new(r"\d{10}|\(\d{3}\)[ -]?\d{3}[ -]?\d{4}|\d{3}[ -]?\d{3}[ -]?\d{4}").unwrap();
    // international form: optional +CC or (+CC), then nnn-nnnn-nnnn
    static ref PHONE_INTL: Regex =
        Regex::new(r"(?:(?:\+\d{1,3}|\(\+\d{1,3}\))[ -]?)?\d{3}[ -]?\d{4}[ -]?\d{4}").unwrap();
    // octet ranges deliberately unvalidated: 999.999.999.999 matches
    static ref IPV4: Regex = Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap();
}

/// Mask email addresses. Returns the rewritten text and the number of
/// substitutions.
pub fn mask_email(text: &str) -> (String, usize) {
    substitute(&EMAIL, text, EMAIL_TOKEN)
}

/// Mask phone numbers, North-American forms first, then international
/// ones. Matches inside longer digit runs are rejected.
pub fn mask_phone_numbers(text: &str) -> (String, usize) {
    let (text, na) = substitute_digit_guarded(&PHONE, text, PHONE_TOKEN);
    let (text, intl) = substitute_digit_guarded(&PHONE_INTL, &text, PHONE_TOKEN);
    (text, na + intl)
}

/// Mask IPv4-shaped dotted quads.
pub fn mask_ip_addresses(text: &str) -> (String, usize) {
    substitute(&IPV4, text, IP_TOKEN)
}

fn substitute(pattern: &Regex, text: &str, replacement: &str) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut count = 0;
    for found in pattern.find_iter(text) {
        out.push_str(&text[copied..found.start()]);
        out.push_str(replacement);
        copied = found.end();
        count += 1;
    }
    out.push_str(&text[copied..]);
    (out, count)
}

/// Substitution with the lookaround semantics of `(?<!\d)…(?!\d)`:
/// a candidate surrounded by further digits is skipped, and the scan
/// resumes one byte later so an overlapping valid match is still seen.
fn substitute_digit_guarded(pattern: &Regex, text: &str, replacement: &str) -> (String, usize) {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;
    let mut count = 0;
    let mut at = 0;

    while let Some(found) = pattern.find_at(text, at) {
        let clean_before = found.start() == 0 || !bytes[found.start() - 1].is_ascii_digit();
        let clean_after = found.end() == bytes.len() || !bytes[found.end()].is_ascii_digit();

        if clean_before && clean_after {
            out.push_str(&text[copied..found.start()]);
            out.push_str(replacement);
            copied = found.end();
            at = found.end();
            count += 1;
        } else {
            // rejected candidates start with a digit, '(' or '+', all
            // one byte wide, so bumping by one stays on a char boundary
            at = found.start() + 1;
        }
    }

    out.push_str(&text[copied..]);
    (out, count)
}
