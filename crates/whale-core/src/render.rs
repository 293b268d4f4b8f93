//! Indicator rendering.
//!
//! A frame is a pure function of wall-clock time and a [`Snapshot`]. Nothing
//! carries over between frames, so a renderer can skip or repeat ticks
//! freely.
//!
//! A responding ring pulses the shared color with brightness
//! `0.5 + 0.5 * sin(t / period)` and blinks its `active` flag every period.
//! An idle ring shows the dim idle color. The pattern is carried along for
//! displays that want to show it; it does not change the pixels here.

use std::time::Duration;

use whale_proto::{Pattern, PeerId, Rgb};

use crate::session::Snapshot;

/// Rendering parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    /// Indicator cells per ring
    pub indicator_count: usize,
    /// Pulse and blink period
    pub pulse_period: Duration,
    /// Color of a ring that is not responding
    pub idle_color: Rgb,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            indicator_count: 12,
            pulse_period: Duration::from_millis(300),
            idle_color: Rgb::IDLE,
        }
    }
}

/// One indicator cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Indicator {
    /// Display color
    pub color: Rgb,
    /// Blink phase; only ever true on a responding ring
    pub active: bool,
}

/// Indicator ring of one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ring {
    /// Owner
    pub peer: PeerId,
    /// Whether the peer is responding
    pub responding: bool,
    /// Cells in display order
    pub indicators: Vec<Indicator>,
}

/// Both rings at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenderFrame {
    /// Wall clock the frame was computed for, unix milliseconds
    pub wall_ms: u64,
    /// Current shared pattern
    pub pattern: Pattern,
    /// One ring per peer, in [`PeerId::ALL`] order
    pub rings: Vec<Ring>,
}

impl RenderFrame {
    /// Ring of `peer`.
    pub fn ring(&self, peer: PeerId) -> Option<&Ring> {
        self.rings.iter().find(|ring| ring.peer == peer)
    }
}

fn period_ms(config: &RenderConfig) -> f64 {
    // Zero period would divide by zero; treat it as one millisecond.
    (config.pulse_period.as_secs_f64() * 1000.0).max(1.0)
}

/// Pulse brightness in `[0, 1]` at `wall_ms`.
#[allow(clippy::cast_precision_loss)]
pub fn brightness(wall_ms: u64, config: &RenderConfig) -> f64 {
    0.5 + 0.5 * (wall_ms as f64 / period_ms(config)).sin()
}

/// Blink phase at `wall_ms`: true during even periods.
#[allow(clippy::cast_precision_loss)]
pub fn active_phase(wall_ms: u64, config: &RenderConfig) -> bool {
    (wall_ms as f64 / period_ms(config)) % 2.0 < 1.0
}

/// Render one peer's ring.
pub fn render_ring(
    peer: PeerId,
    responding: bool,
    color: Rgb,
    wall_ms: u64,
    config: &RenderConfig,
) -> Ring {
    let indicator = if responding {
        Indicator {
            color: color.scale(brightness(wall_ms, config)),
            active: active_phase(wall_ms, config),
        }
    } else {
        Indicator { color: config.idle_color, active: false }
    };

    Ring { peer, responding, indicators: vec![indicator; config.indicator_count] }
}

/// Render both rings from `snapshot` at `wall_ms`.
pub fn render_frame(snapshot: &Snapshot, wall_ms: u64, config: &RenderConfig) -> RenderFrame {
    RenderFrame {
        wall_ms,
        pattern: snapshot.pattern,
        rings: PeerId::ALL
            .iter()
            .map(|&peer| {
                render_ring(peer, snapshot.is_responding(peer), snapshot.color, wall_ms, config)
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{coordinator::SessionStats, connection::ConnectionState};

    fn snapshot(responding: [bool; 2]) -> Snapshot {
        Snapshot {
            connection: ConnectionState::Connected,
            color: Rgb::new(255, 100, 200),
            pattern: Pattern::Pulse,
            responding,
            stats: SessionStats::default(),
        }
    }

    #[test]
    fn responding_ring_at_time_zero() {
        let config = RenderConfig::default();
        let ring = render_ring(PeerId::Whale2, true, Rgb::new(255, 100, 200), 0, &config);

        assert_eq!(ring.indicators.len(), 12);
        assert_eq!(ring.indicators[0], Indicator { color: Rgb::new(127, 50, 100), active: true });
    }

    #[test]
    fn active_flag_alternates_each_period() {
        let config = RenderConfig::default();
        assert!(active_phase(0, &config));
        assert!(active_phase(299, &config));
        assert!(!active_phase(300, &config));
        assert!(!active_phase(599, &config));
        assert!(active_phase(600, &config));
    }

    #[test]
    fn idle_ring_is_dim_and_inactive() {
        let frame = render_frame(&snapshot([false, true]), 0, &RenderConfig::default());

        let idle = frame.ring(PeerId::Whale1).unwrap();
        assert!(!idle.responding);
        assert!(idle.indicators.iter().all(|i| *i == Indicator { color: Rgb::IDLE, active: false }));
        assert_eq!(Rgb::IDLE.to_hex(), "#112233");

        assert!(frame.ring(PeerId::Whale2).unwrap().responding);
    }

    #[test]
    fn frame_carries_pattern() {
        let mut snap = snapshot([false, false]);
        snap.pattern = Pattern::Rainbow;
        assert_eq!(render_frame(&snap, 5, &RenderConfig::default()).pattern, Pattern::Rainbow);
    }

    proptest! {
        #[test]
        fn pulse_never_exceeds_base_color(t in any::<u64>(), r: u8, g: u8, b: u8) {
            let config = RenderConfig::default();
            let ring = render_ring(PeerId::Whale1, true, Rgb::new(r, g, b), t, &config);
            let c = ring.indicators[0].color;
            prop_assert!(c.r <= r && c.g <= g && c.b <= b);
        }

        #[test]
        fn frames_are_pure(t in any::<u64>()) {
            let config = RenderConfig::default();
            let snap = snapshot([true, false]);
            prop_assert_eq!(render_frame(&snap, t, &config), render_frame(&snap, t, &config));
        }
    }
}
