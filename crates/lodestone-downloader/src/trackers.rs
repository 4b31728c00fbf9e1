//! Built-in tracker set announced for every torrent.

/// Public trackers announced when the operator configures none.
pub const DEFAULT_TRACKERS: [&str; 8] = [
    "udp://tracker.opentrackr.org:1337/announce",
    "udp://tracker.openbittorrent.com:6969/announce",
    "udp://open.stealth.si:80/announce",
    "udp://exodus.desync.com:6969/announce",
    "http://tracker.opentrackr.org:1337/announce",
    "http://tracker.openbittorrent.com:80/announce",
    "udp://tracker.torrent.eu.org:451/announce",
    "udp://tracker.moeking.me:6969/announce",
];

/// The default tracker list as owned strings.
#[must_use]
pub fn default_trackers() -> Vec<String> {
    DEFAULT_TRACKERS.iter().map(ToString::to_string).collect()
}
