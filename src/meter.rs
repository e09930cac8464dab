//! Meter module.
//!
//! A meter node terminates damage into a bounded resource such as health or
//! shields. Each pack reaching the meter transfers value according to its
//! mode, leaves any unspent remainder on the pack, and fires threshold
//! events when the meter reaches zero or its maximum.

use crate::node::{NodeId, NodeParams};
use crate::pack::{Pack, PackMode};
use crate::signal::{MeterListener, Signal};
use std::fmt;
use tracing::{debug, warn};

/// Maximum used when none (or a non-positive one) is given.
pub const DEFAULT_VALUE_MAX: f64 = 100.0;

/// The numeric state of a meter.
///
/// `value` always lies in `[0, value_max]`.
///
/// # Examples
///
/// ```rust
/// use damage_pipeline::{Meter, Pack, PackMode};
///
/// let mut shield = Meter::new(Some(10.0), 50.0);
/// let mut hit = Pack::new(25.0);
/// shield.transfer(&mut hit);
///
/// assert_eq!(shield.value(), 0.0);
/// assert_eq!(hit.value(), 15.0); // the shield broke with 15 left over
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Meter {
    value: f64,
    value_max: f64,
    value_last: f64,
}

impl Meter {
    /// Create a meter. The value defaults to `value_max` and is clamped
    /// into range; a non-positive maximum falls back to 100.
    pub fn new(value: Option<f64>, value_max: f64) -> Self {
        let value_max = if value_max > 0.0 && value_max.is_finite() {
            value_max
        } else {
            warn!(value_max, "Meter maximum must be positive; using {}", DEFAULT_VALUE_MAX);
            DEFAULT_VALUE_MAX
        };
        let value = clamp_value(value.unwrap_or(value_max), value_max);
        Self {
            value,
            value_max,
            value_last: value,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Assign a value, clamped into `[0, value_max]`.
    pub fn set_value(&mut self, value: f64) {
        self.value = clamp_value(value, self.value_max);
    }

    pub fn value_max(&self) -> f64 {
        self.value_max
    }

    /// Change the maximum. Non-positive maximums are ignored; the current
    /// value is clamped to the new maximum.
    pub fn set_value_max(&mut self, value_max: f64) {
        if value_max > 0.0 && value_max.is_finite() {
            self.value_max = value_max;
            self.value = clamp_value(self.value, value_max);
        } else {
            warn!(value_max, "Ignoring non-positive meter maximum");
        }
    }

    /// Value before the most recent pack was applied.
    pub fn value_last(&self) -> f64 {
        self.value_last
    }

    /// `value / value_max`, in `[0, 1]`.
    pub fn value_normalized(&self) -> f64 {
        self.value / self.value_max
    }

    /// Assign from a fraction of the maximum, clamped into `[0, 1]`.
    pub fn set_value_normalized(&mut self, fraction: f64) {
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        self.value = fraction * self.value_max;
    }

    pub fn is_empty(&self) -> bool {
        self.value == 0.0
    }

    pub fn is_full(&self) -> bool {
        self.value == self.value_max
    }

    /// Move value between the pack and the meter according to the pack's
    /// mode. Whatever the meter cannot absorb stays on the pack.
    ///
    /// - `Subtract`: drain the meter by up to the pack's value.
    /// - `Add`: fill the meter by up to the pack's value.
    /// - `Set`: set the meter to the pack's value; anything above the
    ///   maximum is left on the pack as an overflow-like remainder.
    pub fn transfer(&mut self, pack: &mut Pack) {
        let amount = pack.value();
        match pack.mode() {
            PackMode::Subtract => {
                if amount <= self.value {
                    self.value -= amount;
                    pack.set_value(0.0);
                } else {
                    pack.set_value(amount - self.value);
                    self.value = 0.0;
                }
            }
            PackMode::Add => {
                let room = self.value_max - self.value;
                if amount <= room {
                    self.value += amount;
                    pack.set_value(0.0);
                } else {
                    pack.set_value(amount - room);
                    self.value = self.value_max;
                }
            }
            PackMode::Set => {
                if amount > self.value_max {
                    pack.set_value(amount - self.value_max);
                    self.value = self.value_max;
                } else {
                    self.value = amount;
                    pack.set_value(0.0);
                }
            }
        }
    }
}

fn clamp_value(value: f64, value_max: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, value_max)
    }
}

/// Callback invoked with the meter and the pack being applied.
pub type MeterHook = Box<dyn FnMut(&mut Meter, &mut Pack)>;

/// Overridable meter callbacks. `None` means the default behavior: the
/// standard transfer for `on_receive`, nothing for the thresholds.
#[derive(Default)]
pub struct MeterHooks {
    /// Replaces [`Meter::transfer`].
    pub on_receive: Option<MeterHook>,
    /// The meter rose to its maximum from below.
    pub on_max: Option<MeterHook>,
    /// The meter is full and an `Add` pack still has value left.
    pub on_overflow: Option<MeterHook>,
    /// The meter dropped to zero from above.
    pub on_zero: Option<MeterHook>,
    /// The meter is empty and a `Subtract` pack still has value left.
    pub on_break: Option<MeterHook>,
}

impl fmt::Debug for MeterHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeterHooks")
            .field("on_receive", &self.on_receive.is_some())
            .field("on_max", &self.on_max.is_some())
            .field("on_overflow", &self.on_overflow.is_some())
            .field("on_zero", &self.on_zero.is_some())
            .field("on_break", &self.on_break.is_some())
            .finish()
    }
}

/// Construction parameters for a meter node.
///
/// There is no operation field: a meter's per-pack logic is its transfer
/// and threshold detection, customized only through [`MeterHooks`].
#[derive(Debug, Default)]
pub struct MeterParams {
    pub node: NodeParams,
    /// Initial value; defaults to `value_max`.
    pub value: Option<f64>,
    /// Maximum; defaults to 100.
    pub value_max: Option<f64>,
    pub hooks: MeterHooks,
}

impl MeterParams {
    /// Default parameters with the given node name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            node: NodeParams::named(name),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_value_max(mut self, value_max: f64) -> Self {
        self.value_max = Some(value_max);
        self
    }
}

/// The meter behavior of a pipeline node: state, hooks and signals.
pub struct MeterNode {
    meter: Meter,
    hooks: MeterHooks,

    /// Fired after every transfer.
    pub on_receive: Signal<MeterListener>,
    /// Fired when the meter rises to its maximum.
    pub on_max: Signal<MeterListener>,
    /// Fired when a full meter is offered more `Add` value.
    pub on_overflow: Signal<MeterListener>,
    /// Fired when the meter drops to zero.
    pub on_zero: Signal<MeterListener>,
    /// Fired when an empty meter is offered more `Subtract` value.
    pub on_break: Signal<MeterListener>,
}

impl MeterNode {
    pub(crate) fn new(value: Option<f64>, value_max: Option<f64>, hooks: MeterHooks) -> Self {
        Self {
            meter: Meter::new(value, value_max.unwrap_or(DEFAULT_VALUE_MAX)),
            hooks,
            on_receive: Signal::new(),
            on_max: Signal::new(),
            on_overflow: Signal::new(),
            on_zero: Signal::new(),
            on_break: Signal::new(),
        }
    }

    pub fn meter(&self) -> &Meter {
        &self.meter
    }

    pub fn meter_mut(&mut self) -> &mut Meter {
        &mut self.meter
    }

    pub fn value(&self) -> f64 {
        self.meter.value()
    }

    pub fn hooks_mut(&mut self) -> &mut MeterHooks {
        &mut self.hooks
    }

    /// Apply one pack and fire threshold events.
    ///
    /// The four threshold checks are independent and run in a fixed order:
    /// max, overflow, zero, break.
    pub(crate) fn operate(&mut self, node: NodeId, pack: &mut Pack) {
        self.meter.value_last = self.meter.value;

        match self.hooks.on_receive.as_mut() {
            Some(hook) => hook(&mut self.meter, pack),
            None => self.meter.transfer(pack),
        }
        self.on_receive.emit(node, &self.meter);

        if self.meter.is_full() && self.meter.value_last != self.meter.value_max {
            debug!(%node, value = self.meter.value, "Meter reached maximum");
            if let Some(hook) = self.hooks.on_max.as_mut() {
                hook(&mut self.meter, pack);
            }
            self.on_max.emit(node, &self.meter);
        }

        if self.meter.is_full() && pack.value() > 0.0 && pack.mode() == PackMode::Add {
            debug!(%node, remainder = pack.value(), "Meter overflowed");
            if let Some(hook) = self.hooks.on_overflow.as_mut() {
                hook(&mut self.meter, pack);
            }
            self.on_overflow.emit(node, &self.meter);
        }

        if self.meter.is_empty() && self.meter.value_last != 0.0 {
            debug!(%node, "Meter reached zero");
            if let Some(hook) = self.hooks.on_zero.as_mut() {
                hook(&mut self.meter, pack);
            }
            self.on_zero.emit(node, &self.meter);
        }

        if self.meter.is_empty() && pack.value() > 0.0 && pack.mode() == PackMode::Subtract {
            debug!(%node, remainder = pack.value(), "Meter broke");
            if let Some(hook) = self.hooks.on_break.as_mut() {
                hook(&mut self.meter, pack);
            }
            self.on_break.emit(node, &self.meter);
        }
    }
}

impl fmt::Debug for MeterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeterNode")
            .field("meter", &self.meter)
            .field("hooks", &self.hooks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_defaults() {
        let meter = Meter::new(None, DEFAULT_VALUE_MAX);
        assert_eq!(meter.value(), 100.0);
        assert_eq!(meter.value_last(), 100.0);
        assert!(meter.is_full());
    }

    #[test]
    fn test_meter_initial_value_clamped() {
        assert_eq!(Meter::new(Some(150.0), 100.0).value(), 100.0);
        assert_eq!(Meter::new(Some(-5.0), 100.0).value(), 0.0);
    }

    #[test]
    fn test_meter_sanitizes_out_of_range_state() {
        let meter = Meter::new(Some(500.0), -1.0);
        assert_eq!(meter.value_max(), DEFAULT_VALUE_MAX);
        assert_eq!(meter.value(), DEFAULT_VALUE_MAX);
        assert_eq!(meter.value_normalized(), 1.0);

        let meter = Meter::new(Some(f64::NAN), f64::INFINITY);
        assert_eq!(meter.value_max(), DEFAULT_VALUE_MAX);
        assert_eq!(meter.value(), 0.0);
    }

    #[test]
    fn test_meter_rejects_non_positive_max() {
        let meter = Meter::new(Some(20.0), 0.0);
        assert_eq!(meter.value_max(), DEFAULT_VALUE_MAX);
        assert_eq!(meter.value(), 20.0);
    }

    #[test]
    fn test_normalized() {
        let mut meter = Meter::new(Some(25.0), 50.0);
        assert_eq!(meter.value_normalized(), 0.5);
        meter.set_value_normalized(0.2);
        assert_eq!(meter.value(), 10.0);
        meter.set_value_normalized(3.0);
        assert_eq!(meter.value(), 50.0);
        meter.set_value_normalized(-1.0);
        assert_eq!(meter.value(), 0.0);
    }

    #[test]
    fn test_set_value_max_clamps_value() {
        let mut meter = Meter::new(None, 100.0);
        meter.set_value_max(40.0);
        assert_eq!(meter.value(), 40.0);
        meter.set_value_max(-1.0);
        assert_eq!(meter.value_max(), 40.0);
    }

    #[test]
    fn test_transfer_subtract_within_meter() {
        let mut meter = Meter::new(Some(50.0), 100.0);
        let mut pack = Pack::new(20.0);
        meter.transfer(&mut pack);
        assert_eq!(meter.value(), 30.0);
        assert_eq!(pack.value(), 0.0);
        assert!(pack.is_exhausted());
    }

    #[test]
    fn test_transfer_subtract_leaves_remainder() {
        let mut meter = Meter::new(Some(10.0), 100.0);
        let mut pack = Pack::new(30.0);
        meter.transfer(&mut pack);
        assert_eq!(meter.value(), 0.0);
        assert_eq!(pack.value(), 20.0);
    }

    #[test]
    fn test_transfer_add_caps_at_max() {
        let mut meter = Meter::new(Some(50.0), 100.0);
        let mut pack = Pack::new(60.0).with_mode(PackMode::Add);
        meter.transfer(&mut pack);
        assert_eq!(meter.value(), 100.0);
        assert_eq!(pack.value(), 10.0);
    }

    #[test]
    fn test_transfer_set_within_max() {
        let mut meter = Meter::new(Some(80.0), 100.0);
        let mut pack = Pack::new(30.0).with_mode(PackMode::Set);
        meter.transfer(&mut pack);
        assert_eq!(meter.value(), 30.0);
        assert!(pack.is_exhausted());
    }

    #[test]
    fn test_transfer_set_above_max_leaves_remainder() {
        let mut meter = Meter::new(Some(10.0), 100.0);
        let mut pack = Pack::new(130.0).with_mode(PackMode::Set);
        meter.transfer(&mut pack);
        assert_eq!(meter.value(), 100.0);
        assert_eq!(pack.value(), 30.0);
    }

    #[test]
    fn test_meter_params_builder() {
        let params = MeterParams::named("hp").with_value(10.0).with_value_max(20.0);
        assert_eq!(params.node.name, "hp");
        assert_eq!(params.value, Some(10.0));
        assert_eq!(params.value_max, Some(20.0));
    }
}
