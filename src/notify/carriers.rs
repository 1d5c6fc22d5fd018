//! Carrier email-to-SMS gateway domains.

use tracing::warn;

pub const DEFAULT_SMS_DOMAIN: &str = "vtext.com";

const CARRIER_DOMAINS: &[(&str, &str)] = &[
    ("att", "txt.att.net"),
    ("tmobile", "tmomail.net"),
    ("verizon", "vtext.com"),
    ("sprint", "messaging.sprintpcs.com"),
    ("boost", "sms.myboostmobile.com"),
    ("cricket", "sms.cricketwireless.net"),
    ("uscellular", "email.uscc.net"),
    ("metro", "mymetropcs.com"),
    ("virgin", "vmobl.com"),
    // Xfinity Mobile rides on Verizon.
    ("xfinity", "vtext.com"),
    // Canada
    ("rogers", "pcs.rogers.com"),
    ("bell", "txt.bell.ca"),
    ("telus", "msg.telus.com"),
];

/// Gateway domain for a carrier name. "AT&T", "T-Mobile" and "tmobile" all
/// resolve, since only ASCII letters and digits are compared.
pub fn carrier_domain(carrier: &str) -> Option<&'static str> {
    let key: String = carrier
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();

    CARRIER_DOMAINS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, domain)| *domain)
}

/// `<digits>@<domain>` for a recipient; unknown carriers use `default_domain`.
pub fn sms_address(phone_number: &str, carrier: &str, default_domain: &str) -> String {
    let digits: String = phone_number.chars().filter(char::is_ascii_digit).collect();
    let domain = carrier_domain(carrier).unwrap_or_else(|| {
        warn!(carrier, default_domain, "Unknown carrier, using default SMS domain");
        default_domain
    });
    format!("{digits}@{domain}")
}
