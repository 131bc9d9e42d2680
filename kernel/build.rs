// =============================================================================
// ferropi - Kernel Build Script
// =============================================================================
// Applies the bare-metal linker script when building for the board. Host
// builds (tests run against the BSP crate) never reach this binary.
// =============================================================================

use std::env;

fn main() {
    let target_arch = env::var("CARGO_CFG_TARGET_ARCH").unwrap();
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();

    if target_arch == "aarch64" {
        println!("cargo:rerun-if-changed=linker.ld");
        println!("cargo:rustc-link-arg=-T{}/linker.ld", manifest_dir);
        println!("cargo:rustc-link-arg=-nostartfiles");
    }
}
