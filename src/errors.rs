use color_eyre::Result;

/// Installs the eyre report handler and a panic hook: detailed backtraces in debug
/// builds, a crash report file in release builds.
pub fn init_errors() -> Result<()> {
    #[cfg(debug_assertions)]
    {
        color_eyre::install()?;
        better_panic::Settings::auto()
            .most_recent_first(false)
            .lineno_suffix(true)
            .install();
    }

    #[cfg(not(debug_assertions))]
    {
        color_eyre::config::HookBuilder::default()
            .display_env_section(false)
            .install()?;
        human_panic::setup_panic!();
    }

    Ok(())
}
