// handlers/root/mod.rs - Platform administration, main surface only
pub mod tenant;
