//! Deterministic subject lines for drafts that arrive without one.

use crate::domain::CustomerEvent;
use crate::id::stable_digest;

const SUBJECT_TEMPLATES: [&str; 5] = [
    "{name}, Enhance Your Home Protection",
    "Additional Protection Options for Your Home, {name}",
    "{name}, Here's How We Can Better Protect Your Home",
    "Recommended Service Upgrade for {name}",
    "{name}, Take Your Pest Protection to the Next Level",
];

/// Pick a subject keyed on the customer, so reruns of one event agree.
pub fn fallback_subject(event: &CustomerEvent) -> String {
    let name = event.first_name();
    let key = event.customer_key().unwrap_or_default();
    let digest = stable_digest(&[key, name]);
    let index = u64::from_str_radix(&digest[..8], 16).unwrap_or(0) as usize % SUBJECT_TEMPLATES.len();
    SUBJECT_TEMPLATES[index].replace("{name}", name)
}
