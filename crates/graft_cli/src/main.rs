//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `graft_core` linkage.
//! - Keep output deterministic for quick local sanity checks.

use graft_core::{ResourceLocator, RestrictedOrigin};

fn main() {
    println!("graft_core version={}", graft_core::core_version());

    let origin = RestrictedOrigin::new("/agent/graft.pack");
    let probe = ResourceLocator::parse("/agent/graft.pack!/a/B.unit");
    println!(
        "graft_core origin_probe foreign={}",
        origin.is_foreign(&probe)
    );
}
