fn main() {
    #[cfg(feature = "cli")]
    oxidepth::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("oxidepth: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
