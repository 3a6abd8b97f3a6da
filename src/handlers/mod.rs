// handlers/mod.rs - Handler tiers
//
// platform: no tenant resolution (/, /health)
// tenant:   resolved tenant surface, known tenants only (/api/tenant)
// root:     platform administration, main surface only (/api/root/*)
pub mod platform;
pub mod root;
pub mod tenant;
