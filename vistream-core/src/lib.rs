pub mod carousel;
pub mod config;
pub mod display;
pub mod error;
pub mod loading_bar;
pub mod navigation;
pub mod paths;
pub mod playback;
pub mod probe;
pub mod progress;
pub mod time;

pub use carousel::{
    CarouselEffect, CarouselHandle, CarouselInput, CarouselState, NavKey, ScrollTarget,
    TrailerState,
};
pub use config::{
    build_config_template, CarouselConfig, LoadingBarConfig, LoggingConfig, NavigationConfig,
    PlaybackConfig, ProbesConfig, VistreamConfig,
};

/// Re-export toml error type for config parsing error handling
pub use toml::de::Error as TomlParseError;
pub use display::{render, BarFrame};
pub use error::{CoreError, Result};
pub use loading_bar::{LoadingBar, LoadingBarEvent, LoadingTrigger};
pub use navigation::{
    MemoryRouter, NavigateOptions, NavigateWithLoading, NavigationTrigger, RouteLocation, Router,
};
pub use paths::{
    config_dir, config_path, log_file_path, CONFIG_DIR_NAME, CONFIG_FILE_NAME, LOG_FILE_NAME,
};
pub use playback::{
    MediaDiagnostics, MediaElement, MediaEvent, PlaybackFailure, PlaybackHandle, PlaybackState,
    PlaybackStatus,
};
pub use probe::{candidate_paths, resolve_source, SourceProbe};
pub use progress::{ProgressEvent, ProgressState};
pub use time::{format_video_duration, DurationExt};
