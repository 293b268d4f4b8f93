//! Text rendering for the control panel.

use std::fmt::Write as _;

use whale_core::{Notice, NoticeLevel, RenderFrame, Ring, Snapshot};
use whale_proto::PeerId;

/// Multi-line status report for `/status`.
pub fn format_status(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "connection  {}", snapshot.connection.label());
    let _ = writeln!(out, "color       {} ({})", snapshot.color, snapshot.color.to_hex());
    let _ = writeln!(out, "pattern     {}", snapshot.pattern);
    for peer in PeerId::ALL {
        let state = if snapshot.is_responding(peer) { "responding" } else { "idle" };
        let _ = writeln!(out, "{:<11} {state}", peer.as_str());
    }
    let stats = snapshot.stats;
    let _ = writeln!(
        out,
        "touches     sent {} received {}",
        stats.touches_sent, stats.touches_received
    );
    let _ = write!(out, "reconnects  {}", stats.reconnects);
    out
}

/// One notice line with a level tag.
pub fn format_notice(notice: &Notice) -> String {
    let tag = match notice.level {
        NoticeLevel::Info => "info",
        NoticeLevel::Success => " ok ",
        NoticeLevel::Warning => "warn",
        NoticeLevel::Error => "err ",
    };
    format!("[{tag}] {notice}")
}

/// One ring as 24-bit ANSI colored cells.
///
/// Active cells are drawn filled, the rest hollow.
pub fn format_ring(ring: &Ring) -> String {
    let mut out = format!("{:<8}", ring.peer.as_str());
    for indicator in &ring.indicators {
        let glyph = if indicator.active { '●' } else { '○' };
        let c = indicator.color;
        let _ = write!(out, "\x1b[38;2;{};{};{}m{glyph}\x1b[0m", c.r, c.g, c.b);
    }
    out
}

/// Both rings plus the pattern, one line each.
pub fn format_frame(frame: &RenderFrame) -> String {
    let mut lines: Vec<String> = frame.rings.iter().map(format_ring).collect();
    lines.push(format!("pattern {}", frame.pattern));
    lines.join("\n")
}
