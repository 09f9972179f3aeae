//! Time units

/// Hertz
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hertz(pub u32);

impl Hertz {
    pub const fn hz(hertz: u32) -> Self {
        Self(hertz)
    }

    pub const fn khz(kilohertz: u32) -> Self {
        Self(kilohertz * 1_000)
    }
}
