//! The built-in probes.
//!
//! Each probe answers one question about the page: is ad-shaped content being
//! hidden, stripped, or kept from loading? All of them insert their bait
//! through a [`ProbeScope`](crate::probe::ProbeScope), so cleanup happens in
//! the runner rather than in each probe.

pub mod bait_class;
pub mod bait_element;
pub mod container;
pub mod enhanced;
pub mod real_content;
pub mod script_load;

pub use bait_class::BaitClassProbe;
pub use bait_element::BaitElementProbe;
pub use container::ContainerMutationProbe;
pub use enhanced::EnhancedProbe;
pub use real_content::RealContentProbe;
pub use script_load::ScriptLoadProbe;

use std::time::Duration;

/// Style for bait that should render as a 1x1 box off screen.
pub(crate) const OFFSCREEN_BAIT_STYLE: &str =
    "position:absolute;left:-10000px;top:-1000px;width:1px;height:1px;";

/// Script every ad-network probe points at.
pub(crate) const AD_SCRIPT_URL: &str =
    "https://pagead2.googlesyndication.com/pagead/js/adsbygoogle.js";

/// Wait for blocker stylesheets and mutation observers to act on new bait.
pub(crate) async fn settle(delay: Duration) {
    tokio::time::sleep(delay).await;
}

/// Milliseconds as a JSON-friendly integer.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
