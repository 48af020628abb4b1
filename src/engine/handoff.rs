//! Lock-free coefficient hand-off between a control thread and the audio thread
//!
//! The controller maps parameters on its own thread and pushes complete
//! [`Coefficients`] snapshots into a wait-free SPSC ring. The engine drains
//! the ring at each block boundary and keeps only the newest snapshot, so a
//! block always runs on one consistent coefficient set.

use crate::dsp::mapper::{Coefficients, ParameterMapper};
use crate::dsp::params::{ParamUpdate, ReverbParams};
use crate::error::{ReverieError, Result};
use rtrb::{Consumer, Producer, PushError, RingBuffer};

/// Snapshots in flight before the controller starts deferring
pub const HANDOFF_CAPACITY: usize = 8;

/// Outcome of a publication
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The snapshot is queued for the audio thread
    Published,
    /// The ring was full; the snapshot is held until [`ReverbController::flush`]
    Pending,
}

/// Create a connected controller/inbox pair
pub(crate) fn channel(
    mapper: ParameterMapper,
    params: ReverbParams,
) -> (ReverbController, CoefficientInbox) {
    let (producer, consumer) = RingBuffer::new(HANDOFF_CAPACITY);
    (
        ReverbController {
            producer,
            mapper,
            params,
            pending: None,
        },
        CoefficientInbox { consumer },
    )
}

// ============================================================================
// Audio Side
// ============================================================================

/// Receiving end, owned by the engine
pub(crate) struct CoefficientInbox {
    consumer: Consumer<Coefficients>,
}

impl CoefficientInbox {
    /// Drain the ring and return the newest snapshot, if any
    #[inline]
    pub(crate) fn latest(&mut self) -> Option<Coefficients> {
        let mut latest = None;
        while let Ok(coeffs) = self.consumer.pop() {
            latest = Some(coeffs);
        }
        latest
    }
}

impl std::fmt::Debug for CoefficientInbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoefficientInbox")
            .field("queued", &self.consumer.slots())
            .finish()
    }
}

// ============================================================================
// Control Side
// ============================================================================

/// Parameter control handle for a non-real-time thread
///
/// Obtained from [`Reverb::controller`](crate::dsp::Reverb::controller). It
/// keeps its own copy of the parameter record; partial updates merge into that
/// copy. Only one controller is attached to an engine at a time: requesting a
/// new one, reconfiguring or dropping the engine detaches this one.
pub struct ReverbController {
    producer: Producer<Coefficients>,
    mapper: ParameterMapper,
    params: ReverbParams,
    /// Newest snapshot not yet accepted by the ring
    pending: Option<Coefficients>,
}

impl ReverbController {
    /// Current parameter record as seen by this controller
    pub fn params(&self) -> &ReverbParams {
        &self.params
    }

    /// Merge a partial record and publish the resulting snapshot
    pub fn update(&mut self, update: &ParamUpdate) -> Result<Delivery> {
        self.ensure_attached()?;
        self.params.apply(update);
        self.pending = Some(self.mapper.map(&self.params));
        self.flush()
    }

    /// Replace the whole parameter record and publish
    pub fn set_params(&mut self, params: ReverbParams) -> Result<Delivery> {
        self.update(&ParamUpdate::from(params))
    }

    /// Retry a snapshot deferred by a full ring
    ///
    /// Returns [`Delivery::Published`] when nothing is pending.
    pub fn flush(&mut self) -> Result<Delivery> {
        self.ensure_attached()?;
        let Some(coeffs) = self.pending.take() else {
            return Ok(Delivery::Published);
        };
        match self.producer.push(coeffs) {
            Ok(()) => {
                log::debug!(
                    "Published reverb coefficients (feedback gain {:.4})",
                    coeffs.fdn.feedback_gain
                );
                Ok(Delivery::Published)
            }
            Err(PushError::Full(coeffs)) => {
                log::warn!("Coefficient queue full, deferring update until flush");
                self.pending = Some(coeffs);
                Ok(Delivery::Pending)
            }
        }
    }

    /// True while a deferred snapshot waits for room in the ring
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// False once the engine dropped its end of the ring
    pub fn is_attached(&self) -> bool {
        !self.producer.is_abandoned()
    }

    fn ensure_attached(&self) -> Result<()> {
        if self.is_attached() {
            Ok(())
        } else {
            Err(ReverieError::EngineDetached)
        }
    }
}

impl std::fmt::Debug for ReverbController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReverbController")
            .field("params", &self.params)
            .field("pending", &self.pending.is_some())
            .field("attached", &self.is_attached())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::params::Mode;

    fn pair() -> (ReverbController, CoefficientInbox) {
        channel(ParameterMapper::new(48000.0, 3), ReverbParams::default())
    }

    #[test]
    fn test_newest_snapshot_wins() {
        let (mut controller, mut inbox) = pair();
        assert!(inbox.latest().is_none());

        controller.update(&ParamUpdate::new().decay(1.0)).unwrap();
        controller.update(&ParamUpdate::new().decay(4.0)).unwrap();
        controller.update(&ParamUpdate::new().mode(Mode::Room)).unwrap();

        let latest = inbox.latest().unwrap();
        assert_eq!(latest.params.decay, 4.0);
        assert_eq!(latest.params.mode, Mode::Room);
        assert!(inbox.latest().is_none());
    }

    #[test]
    fn test_partial_updates_merge_into_controller_copy() {
        let (mut controller, _inbox) = pair();
        controller.update(&ParamUpdate::new().mix(0.9)).unwrap();
        controller.update(&ParamUpdate::new().size(0.1)).unwrap();
        assert_eq!(controller.params().mix, 0.9);
        assert_eq!(controller.params().size, 0.1);
        assert_eq!(controller.params().decay, ReverbParams::default().decay);
    }

    #[test]
    fn test_full_ring_defers_until_flush() {
        let (mut controller, mut inbox) = pair();
        for i in 0..HANDOFF_CAPACITY {
            let delivery = controller
                .update(&ParamUpdate::new().decay(1.0 + i as f32))
                .unwrap();
            assert_eq!(delivery, Delivery::Published);
        }

        let delivery = controller.update(&ParamUpdate::new().decay(20.0)).unwrap();
        assert_eq!(delivery, Delivery::Pending);
        assert!(controller.has_pending());

        // Engine drains, controller retries
        assert_eq!(inbox.latest().unwrap().params.decay, HANDOFF_CAPACITY as f32);
        assert_eq!(controller.flush().unwrap(), Delivery::Published);
        assert!(!controller.has_pending());
        assert_eq!(inbox.latest().unwrap().params.decay, 20.0);
    }

    #[test]
    fn test_dropped_inbox_detaches() {
        let (mut controller, inbox) = pair();
        assert!(controller.is_attached());
        drop(inbox);
        assert!(!controller.is_attached());
        let err = controller.update(&ParamUpdate::new().mix(0.5)).unwrap_err();
        assert_eq!(err.error_code(), "ENGINE_DETACHED");
    }

    #[test]
    fn test_set_params_replaces_record() {
        let (mut controller, mut inbox) = pair();
        let params = ReverbParams {
            mix: 1.0,
            mode: Mode::Plate,
            ..Default::default()
        };
        controller.set_params(params).unwrap();
        assert_eq!(*controller.params(), params);
        assert_eq!(inbox.latest().unwrap().params, params);
    }
}
