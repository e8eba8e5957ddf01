use std::net::IpAddr;

use randping_types::models::CountryCode;

/// IP-to-country lookup.
pub trait CountryLookup: Send + Sync {
    fn country_for(&self, ip: Option<IpAddr>) -> Option<CountryCode>;
}

/// Answers the same country (or none) for every address.
pub struct FixedCountry(pub Option<CountryCode>);

impl CountryLookup for FixedCountry {
    fn country_for(&self, _ip: Option<IpAddr>) -> Option<CountryCode> {
        self.0.clone()
    }
}
