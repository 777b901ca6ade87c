pub mod csv_store;
pub mod ini_settings;

pub use csv_store::CsvStore;
pub use ini_settings::RunSettings;
