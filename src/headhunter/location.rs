use std::{collections::BTreeMap, fs, io, path::Path};

use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("There is no country as: {}", title_case(.0))]
    UnknownCountry(String),
    #[error("There is no city as: {}", title_case(.0))]
    UnknownCity(String),
    #[error("invalid location URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("failed to read location table: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse location table: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryInfo {
    /// Top level domain of the country's HeadHunter site, e.g. `ru`.
    pub domain: String,
    /// City subdomains.
    pub cities: Vec<String>,
}

/// Countries and cities with a HeadHunter site, keyed by lowercase country name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationTable {
    countries: BTreeMap<String, CountryInfo>,
}

impl Default for LocationTable {
    fn default() -> Self {
        let country = |domain: &str, cities: &[&str]| CountryInfo {
            domain: domain.to_string(),
            cities: cities.iter().map(|city| city.to_string()).collect(),
        };
        let countries = BTreeMap::from([
            (
                "russia".to_string(),
                country(
                    "ru",
                    &[
                        "spb",
                        "ekaterinburg",
                        "novosibirsk",
                        "kazan",
                        "nn",
                        "krasnodar",
                        "samara",
                        "rostov",
                    ],
                ),
            ),
            (
                "kazakhstan".to_string(),
                country("kz", &["almaty", "astana", "karaganda", "shymkent"]),
            ),
            (
                "uzbekistan".to_string(),
                country("uz", &["tashkent", "samarkand"]),
            ),
        ]);
        Self { countries }
    }
}

impl LocationTable {
    /// Loads a table from a JSON object of `{"country": {"domain": ..., "cities": [...]}}`.
    pub fn from_path(path: &Path) -> Result<Self, LocationError> {
        let json = fs::read_to_string(path)?;
        let table: LocationTable = serde_json::from_str(&json)?;
        Ok(Self {
            countries: table
                .countries
                .into_iter()
                .map(|(country, info)| (country.trim().to_lowercase(), info))
                .collect(),
        })
    }

    pub fn countries(&self) -> impl Iterator<Item = (&str, &CountryInfo)> {
        self.countries
            .iter()
            .map(|(country, info)| (country.as_str(), info))
    }

    /// Root URL of the HeadHunter site for `city` in `country`.
    pub fn url_from_location(&self, country: &str, city: &str) -> Result<Url, LocationError> {
        let country = country.trim().to_lowercase();
        let city = city.trim().to_lowercase();
        let info = self
            .countries
            .get(&country)
            .ok_or(LocationError::UnknownCountry(country))?;
        if !info
            .cities
            .iter()
            .any(|known| known.eq_ignore_ascii_case(&city))
        {
            return Err(LocationError::UnknownCity(city));
        }
        Ok(Url::parse(&format!("https://{city}.hh.{}", info.domain))?)
    }
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_city_subdomain_url() {
        let table = LocationTable::default();
        let url = table.url_from_location("Russia", " SPB ").unwrap();
        assert_eq!(url.as_str(), "https://spb.hh.ru/");

        let url = table.url_from_location("kazakhstan", "almaty").unwrap();
        assert_eq!(url.host_str(), Some("almaty.hh.kz"));
    }

    #[test]
    fn unknown_country_is_rejected() {
        let err = LocationTable::default()
            .url_from_location("new zealand", "auckland")
            .unwrap_err();
        assert!(matches!(err, LocationError::UnknownCountry(_)));
        assert_eq!(err.to_string(), "There is no country as: New Zealand");
    }

    #[test]
    fn unknown_city_is_rejected() {
        let err = LocationTable::default()
            .url_from_location("russia", "paris")
            .unwrap_err();
        assert!(matches!(err, LocationError::UnknownCity(_)));
        assert_eq!(err.to_string(), "There is no city as: Paris");
    }

    #[test]
    fn table_loads_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locations.json");
        fs::write(
            &path,
            r#"{"Belarus": {"domain": "by", "cities": ["minsk"]}}"#,
        )
        .unwrap();

        let table = LocationTable::from_path(&path).unwrap();
        assert_eq!(table.countries().count(), 1);
        assert_eq!(
            table.url_from_location("belarus", "minsk").unwrap().as_str(),
            "https://minsk.hh.by/"
        );
    }

    #[test]
    fn broken_table_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locations.json");
        fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(
            LocationTable::from_path(&path),
            Err(LocationError::Json(_))
        ));
    }
}
