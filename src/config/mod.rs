mod settings;

pub use settings::{BatchConfig, LogFormat, LoggingConfig, RenderConfig, Settings, TemplatesConfig};
