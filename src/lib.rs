pub mod api;
pub mod core;
pub mod models;
pub mod pipeline;

pub fn init_logging() {
    #[cfg(target_os = "android")]
    {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Debug)
                .with_tag("tread_lib_rust"),
        );
    }

    #[cfg(not(target_os = "android"))]
    {
        // logging handled by android_logger on Android
        // can add simple_logger or env_logger if needed
    }
}
