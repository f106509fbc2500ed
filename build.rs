fn main() {
    // Only the ESP-IDF build needs the toolchain environment; host builds
    // (simulator, tests) have nothing to generate.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
