pub mod check;
pub mod classify;
pub mod data;
pub mod fill;
pub mod gaps;
pub mod record;
pub mod report;
pub mod score;
