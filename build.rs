fn main() {
    // The core library builds without the desktop shell; only the Tauri
    // application needs the generated context.
    #[cfg(feature = "desktop")]
    tauri_build::build()
}
