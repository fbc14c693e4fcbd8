// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free numeric transforms over close-price slices.

pub mod ema;
pub mod rsi;
