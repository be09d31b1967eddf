mod floor;
mod hotspot;
mod overlay;
mod region;

pub use floor::FloorRule;
pub use hotspot::HotspotRule;
pub use overlay::OverlayRule;
pub use region::RegionRule;

/// Lower bound on any multiplicative factor a rule applies.
pub const MIN_FACTOR: f64 = 0.01;

/// `1 + change`, never below [`MIN_FACTOR`].
pub fn bounded_factor(change: f64) -> f64 {
    (1.0 + change).max(MIN_FACTOR)
}
