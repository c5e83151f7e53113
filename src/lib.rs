pub mod click; // Trigger events and the synthesis seam
pub mod engine; // Lookahead scheduling and lifecycle
pub mod io;
pub mod timing; // Beat arithmetic and validated parameters

/// How far ahead of the audio clock the scheduler keeps clicks committed, in
/// seconds. Triggers inside this window are never re-timed by parameter
/// changes.
pub const LOOKAHEAD_SECS: f64 = 0.1;

/// Length of one synthesized click, in seconds.
pub(crate) const CLICK_SECS: f32 = 0.1;
