fn main() -> std::io::Result<()> {
    // Linker script only matters for the STM32F411 target.
    #[cfg(feature = "hardware")]
    {
        use std::env;
        use std::fs;
        use std::path::PathBuf;

        // Put `memory.x` in our output directory and ensure it's on the linker search path.
        let out = env::var_os("OUT_DIR")
            .map(PathBuf::from)
            .ok_or_else(|| std::io::Error::other("OUT_DIR not set"))?;
        fs::write(out.join("memory.x"), include_bytes!("../../memory.x"))?;

        println!("cargo:rustc-link-search={}", out.display());
        println!("cargo:rerun-if-changed=../../memory.x");
    }

    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
