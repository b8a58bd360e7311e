//! Best-effort user location, used to enrich search requests.
//!
//! Resolution never fails: it walks platform geolocation, reverse geocoding and
//! two IP lookup services in turn and settles for an empty [`Location`] when
//! none of them answers.
//!
//! [`Location`]: crate::models::location::Location
pub mod geolocator;
pub mod resolver;
