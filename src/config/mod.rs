pub mod flavor;
pub mod logger;
pub mod settings;

pub use settings::ProxySettings;
