pub mod app_config;
pub mod flag_client;
pub mod hotel_client;
pub mod retry;
pub mod telemetry;

pub use app_config::Config;
pub use flag_client::FliptClient;
pub use hotel_client::HotelServiceClient;
pub use retry::RetryPolicy;
pub use telemetry::Telemetry;
