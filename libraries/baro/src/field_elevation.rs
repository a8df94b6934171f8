//! Field elevation: the absolute elevation the altitude baseline refers to
//!
//! The user value is a request; the active value is what altitudes are
//! computed against. Changes are only accepted while disarmed.

use crate::config::FieldElevationConfig;

/// Outcome of one controller step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldElevationAction {
    None,
    /// The active value changed; the baseline must be re-derived
    Adopted { elevation: f32, from_origin: bool },
    /// A request arrived while armed and was reverted to the active value
    Rejected { reverted_to: f32 },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FieldElevation {
    active: f32,
    requested: f32,
    last_update_ms: u32,
}

impl FieldElevation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> f32 {
        self.active
    }

    pub fn requested(&self) -> f32 {
        self.requested
    }

    /// Record a user request. Applied by the next `step`.
    pub fn request(&mut self, elevation: f32) {
        self.requested = elevation;
    }

    /// Clear a value persisted by a previous boot. Returns true when the
    /// stored value was non-zero and must be overwritten in storage.
    pub fn reset_on_boot(&mut self, stored: f32) -> bool {
        self.active = 0.0;
        self.requested = 0.0;
        stored != 0.0
    }

    /// Run the controller. `origin` is only queried when the baseline was
    /// never set.
    pub fn step(
        &mut self,
        now_ms: u32,
        armed: bool,
        origin: impl FnOnce() -> Option<f32>,
        config: &FieldElevationConfig,
    ) -> FieldElevationAction {
        if !config.enabled || now_ms.wrapping_sub(self.last_update_ms) < config.interval_ms {
            return FieldElevationAction::None;
        }

        let mut action = FieldElevationAction::None;
        // exact zero means "never set", not "set to sea level"
        if self.active == 0.0 && self.requested == 0.0 {
            if !armed {
                if let Some(elevation) = origin() {
                    self.active = elevation;
                    action = FieldElevationAction::Adopted {
                        elevation,
                        from_origin: true,
                    };
                }
            }
        } else if (self.active - self.requested).abs() > config.deadband_m && self.requested != 0.0 {
            if armed {
                self.requested = self.active;
                return FieldElevationAction::Rejected {
                    reverted_to: self.active,
                };
            }
            self.active = self.requested;
            action = FieldElevationAction::Adopted {
                elevation: self.active,
                from_origin: false,
            };
        }

        if matches!(action, FieldElevationAction::Adopted { .. }) {
            self.last_update_ms = now_ms;
        }
        action
    }
}
