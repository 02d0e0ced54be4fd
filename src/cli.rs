//! Command-line arguments.

use clap::{Parser, ValueEnum};

#[derive(Debug, Parser)]
#[command(version, about = "Fund directory search and price history API")]
pub struct Args {
    /// Log output format.
    #[arg(long, value_enum, default_value_t = TracingFormat::default())]
    pub tracing: TracingFormat,

    /// Services to run; defaults to all of them.
    #[arg(long = "service", value_enum)]
    pub services: Vec<ServiceName>,
}

impl Args {
    pub fn enabled_services(&self) -> Vec<ServiceName> {
        if self.services.is_empty() {
            ServiceName::all()
        } else {
            self.services.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TracingFormat {
    Pretty,
    Json,
}

impl Default for TracingFormat {
    /// Human-readable output in debug builds, JSON lines in release builds.
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ServiceName {
    Web,
    Refresher,
}

impl ServiceName {
    pub fn all() -> Vec<ServiceName> {
        vec![ServiceName::Web, ServiceName::Refresher]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::Web => "web",
            ServiceName::Refresher => "refresher",
        }
    }
}
