use super::session::Session;
use super::MonitorEvent;
use crate::settings::DummySettings;
use crate::structs::DeviceHandle;

use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt};
use rand::Rng;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio::time::{self, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const DUMMY_DEVICE_ID: &str = "dummy";
pub const DUMMY_DEVICE_NAME: &str = "Dummy Heart Rate Monitor";
/// Fastest the dummy will tick, whatever `bpm_speed` says
const MIN_TICK: Duration = Duration::from_millis(1);

/// Encodes a BPM value the way a Heart Rate Measurement notification carries it.
pub fn encode_hrm(bpm: u16, force_u16: bool) -> Vec<u8> {
    if force_u16 || bpm > u8::MAX as u16 {
        let [lsb, msb] = bpm.to_le_bytes();
        vec![0x01, lsb, msb]
    } else {
        vec![0x00, bpm as u8]
    }
}

struct DummyMonitor {
    interval: Interval,
    bpm: u16,
    low_bpm: u16,
    high_bpm: u16,
    jitter_bpm: u16,
    positive_direction: bool,
    loops: u16,
    loops_before_dc: u16,
    use_u16_format: bool,
}

impl DummyMonitor {
    fn new(settings: &DummySettings) -> Self {
        let bpm_update_per_sec = Duration::from_secs_f32(1.0 / settings.bpm_speed.max(0.01))
            .max(MIN_TICK);
        let mut interval = time::interval(bpm_update_per_sec);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Leave room above `low_bpm` so the sweep always has somewhere to go
        let low_bpm = settings.low_bpm.min(settings.high_bpm).min(u16::MAX - 1);
        let high_bpm = settings.high_bpm.max(low_bpm + 1);
        Self {
            interval,
            bpm: low_bpm,
            low_bpm,
            high_bpm,
            jitter_bpm: settings.jitter_bpm,
            positive_direction: true,
            loops: 0,
            loops_before_dc: settings.loops_before_dc,
            use_u16_format: settings.use_u16_format,
        }
    }
    /// Waits for the next tick and returns its payload, or `None` when simulating a lost link.
    async fn next_payload(&mut self) -> Option<Vec<u8>> {
        self.interval.tick().await;
        let bound = if self.positive_direction {
            self.bpm = self.bpm.saturating_add(1);
            self.high_bpm
        } else {
            self.bpm = self.bpm.saturating_sub(1);
            self.low_bpm
        };
        if self.bpm == bound {
            self.positive_direction = !self.positive_direction;
            self.loops += 1;
        }
        if self.loops_before_dc != 0 && self.loops >= self.loops_before_dc.saturating_mul(2) {
            info!("Dummy: simulating lost connection");
            return None;
        }
        let jitter = if self.jitter_bpm > 0 {
            rand::thread_rng().gen_range(0..=self.jitter_bpm)
        } else {
            0
        };
        Some(encode_hrm(self.bpm.saturating_add(jitter), self.use_u16_format))
    }
    fn into_stream(self) -> BoxStream<'static, Vec<u8>> {
        stream::unfold(self, |mut monitor| async move {
            let payload = monitor.next_payload().await?;
            Some((payload, monitor))
        })
        .boxed()
    }
}

/// Starts a session fed by a synthetic heart rate monitor instead of a BLE device.
pub fn connect(
    dummy_settings: &DummySettings,
    event_tx: Sender<MonitorEvent>,
    no_packet_timeout: Duration,
    parent_token: &CancellationToken,
) -> Session {
    info!("Starting Dummy heart rate source");
    let device = DeviceHandle::new(DUMMY_DEVICE_ID, Some(DUMMY_DEVICE_NAME.into()));
    let notifications = DummyMonitor::new(dummy_settings).into_stream();
    let teardown = async {
        info!("Dummy heart rate source stopped");
    }
    .boxed();
    Session::spawn(
        device,
        notifications,
        teardown,
        no_packet_timeout,
        event_tx,
        parent_token,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heart_rate::measurement::parse_hrm;
    use tokio::sync::mpsc;

    fn fast_settings(loops_before_dc: u16) -> DummySettings {
        DummySettings {
            enabled: true,
            low_bpm: 60,
            high_bpm: 63,
            bpm_speed: 200.0,
            jitter_bpm: 0,
            loops_before_dc,
            use_u16_format: false,
        }
    }

    #[test]
    fn encoding_round_trips_through_decoder() {
        assert_eq!(encode_hrm(72, false), vec![0x00, 72]);
        assert_eq!(encode_hrm(72, true), vec![0x01, 72, 0x00]);
        assert_eq!(encode_hrm(511, false), vec![0x01, 0xFF, 0x01]);
        assert_eq!(parse_hrm(&encode_hrm(300, false)), Ok(300));
    }

    #[tokio::test]
    async fn sawtooth_between_bounds() {
        let mut monitor = DummyMonitor::new(&fast_settings(0));
        let mut seen = Vec::new();
        for _ in 0..8 {
            let payload = monitor.next_payload().await.unwrap();
            seen.push(parse_hrm(&payload).unwrap());
        }
        assert_eq!(seen, vec![61, 62, 63, 62, 61, 60, 61, 62]);
    }

    #[tokio::test]
    async fn simulated_disconnect_ends_session() {
        let (event_tx, mut event_rx) = mpsc::channel(64);
        let session = connect(
            &fast_settings(1),
            event_tx,
            Duration::from_secs(5),
            &CancellationToken::new(),
        );
        let id = session.id();
        let mut samples = 0;
        loop {
            match event_rx.recv().await {
                Some(MonitorEvent::Sample { session, .. }) => {
                    assert_eq!(session, id);
                    samples += 1;
                }
                Some(MonitorEvent::Disconnected { session }) => {
                    assert_eq!(session, id);
                    break;
                }
                None => panic!("channel closed before disconnect"),
            }
        }
        // 61..=63 then back down, dropping the link instead of sending 60
        assert_eq!(samples, 5);
        assert_eq!(session.device().name, DUMMY_DEVICE_NAME);
    }

    #[tokio::test]
    async fn extreme_speed_is_clamped() {
        for bpm_speed in [f32::INFINITY, 1e30, f32::NAN] {
            let settings = DummySettings {
                bpm_speed,
                ..fast_settings(0)
            };
            let monitor = DummyMonitor::new(&settings);
            assert!(monitor.interval.period() >= MIN_TICK);
        }
    }

    #[tokio::test]
    async fn sweep_at_the_top_of_the_range() {
        let settings = DummySettings {
            low_bpm: u16::MAX,
            high_bpm: u16::MAX,
            ..fast_settings(0)
        };
        let mut monitor = DummyMonitor::new(&settings);
        let mut seen = Vec::new();
        for _ in 0..4 {
            let payload = monitor.next_payload().await.unwrap();
            seen.push(parse_hrm(&payload).unwrap());
        }
        assert_eq!(seen, vec![u16::MAX, u16::MAX - 1, u16::MAX, u16::MAX - 1]);
    }
}
