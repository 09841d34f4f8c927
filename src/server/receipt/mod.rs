//! receipt core: money arithmetic, totals, presentations and QR links

pub(crate) mod calculator;
pub(crate) mod money;
pub(crate) mod qr;
pub(crate) mod render;
