// =============================================================================
// Output Sinks
// =============================================================================
//
// csv_export — merged table plus BUY / SELL subsets
// chart      — two-panel HTML chart
// =============================================================================

pub mod chart;
pub mod csv_export;
