//! Utility functions.

pub mod meteo;
pub mod slug;
pub mod time;

pub use meteo::{degrees_to_compass, round_windspeed, wmo_weather};
pub use slug::slugify;
pub use time::{current_season, local_date_string, local_now};
