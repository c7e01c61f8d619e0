//! External collaborators: weather and geocoding.
//!
//! Both are infallible from the pipeline's point of view. A weather source
//! that cannot answer reports all zeros; a geocoder that cannot answer
//! reports an empty location.

use crate::request::RawRequest;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Current conditions at a location
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub temp: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub rain: f64,
}

impl WeatherReading {
    /// Copy the reading into a request
    pub fn apply_to(&self, request: &mut RawRequest) {
        request.temp = self.temp;
        request.humidity = self.humidity;
        request.pressure = self.pressure;
        request.wind_speed = self.wind_speed;
        request.rain = self.rain;
    }
}

/// Geocoded pincode; display only, never a model input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub city: Option<String>,
    pub state: Option<String>,
}

pub trait WeatherSource: Send + Sync {
    /// Weather for `location`; all zeros when unavailable.
    fn current(&self, location: &Location) -> WeatherReading;
}

pub trait Geocoder: Send + Sync {
    /// Resolve a pincode; every field `None` when unavailable.
    fn locate(&self, pincode: &str) -> Location;
}

/// Weather source that never has data
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWeather;

impl WeatherSource for NoWeather {
    fn current(&self, _location: &Location) -> WeatherReading {
        WeatherReading::default()
    }
}

/// Weather source returning one fixed reading
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticWeather(pub WeatherReading);

impl WeatherSource for StaticWeather {
    fn current(&self, _location: &Location) -> WeatherReading {
        self.0
    }
}

/// Geocoder that never resolves
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGeocoder;

impl Geocoder for NoGeocoder {
    fn locate(&self, _pincode: &str) -> Location {
        Location::default()
    }
}

/// Geocoder backed by a fixed pincode table
#[derive(Debug, Clone, Default)]
pub struct StaticGeocoder {
    entries: HashMap<String, Location>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, pincode: impl Into<String>, location: Location) -> Self {
        self.entries.insert(pincode.into(), location);
        self
    }
}

impl Geocoder for StaticGeocoder {
    fn locate(&self, pincode: &str) -> Location {
        self.entries.get(pincode.trim()).cloned().unwrap_or_default()
    }
}
