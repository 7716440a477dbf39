//! Visual status indicator boundary.
//!
//! The board has two lamps, one per link. Which pins they live on and how
//! they are driven is board code; the protocol core only computes lamp
//! states and hands them across this seam.

/// Desired state of the two activity lamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Lamps {
    /// Microcomputer-link lamp.
    pub micro: bool,
    /// Host-link lamp.
    pub host: bool,
}

impl Lamps {
    pub const OFF: Lamps = Lamps {
        micro: false,
        host: false,
    };
    pub const MICRO: Lamps = Lamps {
        micro: true,
        host: false,
    };
    pub const HOST: Lamps = Lamps {
        micro: false,
        host: true,
    };
    /// Both lamps on; the idle pattern.
    pub const IDLE: Lamps = Lamps {
        micro: true,
        host: true,
    };

    /// Combine two lamp states.
    pub const fn union(self, other: Lamps) -> Lamps {
        Lamps {
            micro: self.micro || other.micro,
            host: self.host || other.host,
        }
    }

    pub const fn is_off(self) -> bool {
        !self.micro && !self.host
    }
}

/// Capability that drives the lamps.
pub trait StatusIndicator {
    fn set(&mut self, lamps: Lamps);
}

impl<T: StatusIndicator + ?Sized> StatusIndicator for &mut T {
    fn set(&mut self, lamps: Lamps) {
        (**self).set(lamps)
    }
}

/// Indicator for boards (and code paths) with no lamps to drive.
pub struct NullIndicator;

impl StatusIndicator for NullIndicator {
    fn set(&mut self, _lamps: Lamps) {}
}
