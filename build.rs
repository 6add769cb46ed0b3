fn main() {
    // Only the device build needs the ESP-IDF environment; host builds
    // (tests, simulation) skip it.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
