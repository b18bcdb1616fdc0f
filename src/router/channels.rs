//! Outreach channel ranking

use crate::signals::ExtractedSignals;

pub const CHANNEL_EMAIL: &str = "email";
pub const CHANNEL_PHONE: &str = "phone";
pub const CHANNEL_STOREFRONT: &str = "storefront";
pub const CHANNEL_CONTACT_FORM: &str = "contact_form";
pub const CHANNEL_PLATFORM_INBOX: &str = "platform_inbox";
pub const CHANNEL_LINKEDIN: &str = "linkedin";

/// Returned when a lead exposes no contact surface at all
pub const DEFAULT_CHANNELS: [&str; 3] = [CHANNEL_CONTACT_FORM, CHANNEL_EMAIL, CHANNEL_LINKEDIN];

/// Contact surfaces detected on a lead's page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelHints {
    pub email: bool,
    pub phone: bool,
    /// Active cart or a recognized storefront platform
    pub storefront: bool,
    pub contact_form: bool,
    /// Messaging links or social profiles
    pub platform_inbox: bool,
}

impl ChannelHints {
    pub fn from_signals(signals: &ExtractedSignals) -> Self {
        Self {
            email: !signals.emails.is_empty(),
            phone: !signals.phones.is_empty(),
            storefront: signals.has_cart || !signals.platforms.is_empty(),
            contact_form: signals.has_contact_form,
            platform_inbox: !signals.messaging_links.is_empty() || !signals.social_profiles.is_empty(),
        }
    }
}

/// Pluggable channel ordering, e.g. a learned ranking
///
/// An empty answer falls back to the built-in heuristic.
pub trait ChannelRanker: Send + Sync {
    fn rank(&self, hints: &ChannelHints) -> Vec<String>;
}

/// Available surfaces in fixed preference order, never empty
pub fn heuristic_channels(hints: &ChannelHints) -> Vec<String> {
    let ordered = [
        (hints.email, CHANNEL_EMAIL),
        (hints.phone, CHANNEL_PHONE),
        (hints.storefront, CHANNEL_STOREFRONT),
        (hints.contact_form, CHANNEL_CONTACT_FORM),
        (hints.platform_inbox, CHANNEL_PLATFORM_INBOX),
    ];

    let channels: Vec<String> = ordered
        .iter()
        .filter(|(available, _)| *available)
        .map(|(_, name)| name.to_string())
        .collect();

    if channels.is_empty() {
        DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect()
    } else {
        channels
    }
}
