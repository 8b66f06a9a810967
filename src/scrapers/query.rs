use serde::{Deserialize, Serialize};
use url::form_urlencoded;

pub const BASE_URL: &str = "https://turbo.az";

/// Filter criteria for a single car search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    /// Car make as free text (e.g. "BMW", "Toyota")
    pub make: Option<String>,
    /// Car model as free text (e.g. "X5", "Camry")
    pub model: Option<String>,
    /// Minimum price (AZN)
    pub price_min: Option<u32>,
    /// Maximum price (AZN)
    pub price_max: Option<u32>,
    /// Minimum year of manufacture
    pub year_min: Option<u32>,
    /// Maximum year of manufacture
    pub year_max: Option<u32>,
    /// Fuel type as free text; unknown values apply no filter
    pub fuel_type: Option<String>,
    /// Transmission as free text; unknown values apply no filter
    pub transmission: Option<String>,
    /// Maximum number of result rows to return
    pub limit: usize,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            make: None,
            model: None,
            price_min: None,
            price_max: None,
            year_min: None,
            year_max: None,
            fuel_type: None,
            transmission: None,
            limit: 20,
        }
    }
}

/// Fuel types the site recognizes, with their internal filter ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuelType {
    Benzin,
    Dizel,
    Qaz,
    Elektrik,
    Hibrid,
    PluginHibrid,
}

impl FuelType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "benzin" => Some(Self::Benzin),
            "dizel" => Some(Self::Dizel),
            "qaz" => Some(Self::Qaz),
            "elektrik" => Some(Self::Elektrik),
            "hibrid" => Some(Self::Hibrid),
            "plug-in hibrid" => Some(Self::PluginHibrid),
            _ => None,
        }
    }

    pub fn site_id(self) -> u8 {
        match self {
            Self::Benzin => 1,
            Self::Dizel => 2,
            Self::Qaz => 3,
            Self::Elektrik => 6,
            Self::Hibrid => 7,
            Self::PluginHibrid => 8,
        }
    }
}

/// Transmission types the site recognizes, with their internal filter ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transmission {
    Mexaniki,
    Avtomat,
    Robot,
    Variator,
}

impl Transmission {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "mexaniki" => Some(Self::Mexaniki),
            "avtomat" => Some(Self::Avtomat),
            "robot" => Some(Self::Robot),
            "variator" => Some(Self::Variator),
            _ => None,
        }
    }

    pub fn site_id(self) -> u8 {
        match self {
            Self::Mexaniki => 1,
            Self::Avtomat => 2,
            Self::Robot => 3,
            Self::Variator => 4,
        }
    }
}

/// A fully-populated search query: the site's complete parameter schema in
/// its canonical order, plus the URL derived from it.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub params: Vec<(&'static str, String)>,
    pub url: String,
}

impl SearchQuery {
    /// Overlay `criteria` and any resolved identifiers onto the site's full
    /// parameter template. Unset fields keep their default/empty values so
    /// the serialized query always carries every site-recognized key.
    pub fn build(
        criteria: &FilterCriteria,
        make_id: Option<&str>,
        model_id: Option<&str>,
    ) -> Self {
        let opt_num = |v: Option<u32>| v.map(|n| n.to_string()).unwrap_or_default();
        let fuel_id = criteria
            .fuel_type
            .as_deref()
            .and_then(FuelType::from_name)
            .map(|f| f.site_id().to_string())
            .unwrap_or_default();
        let transmission_id = criteria
            .transmission
            .as_deref()
            .and_then(Transmission::from_name)
            .map(|t| t.site_id().to_string())
            .unwrap_or_default();

        // The site's form serializes q[model][] with a leading empty slot.
        let params: Vec<(&'static str, String)> = vec![
            ("q[sort]", String::new()),
            ("q[make][]", make_id.unwrap_or_default().to_string()),
            ("q[model][]", String::new()),
            ("q[model][]", model_id.unwrap_or_default().to_string()),
            ("q[used]", String::new()),
            ("q[region][]", String::new()),
            ("q[price_from]", opt_num(criteria.price_min)),
            ("q[price_to]", opt_num(criteria.price_max)),
            ("q[currency]", "azn".to_string()),
            ("q[loan]", "0".to_string()),
            ("q[barter]", "0".to_string()),
            ("q[category][]", String::new()),
            ("q[year_from]", opt_num(criteria.year_min)),
            ("q[year_to]", opt_num(criteria.year_max)),
            ("q[color][]", String::new()),
            ("q[fuel_type][]", fuel_id),
            ("q[gear][]", String::new()),
            ("q[transmission][]", transmission_id),
            ("q[engine_volume_from]", String::new()),
            ("q[engine_volume_to]", String::new()),
            ("q[power_from]", String::new()),
            ("q[power_to]", String::new()),
            ("q[mileage_from]", String::new()),
            ("q[mileage_to]", String::new()),
            ("q[only_shops]", String::new()),
            ("q[prior_owners_count][]", String::new()),
            ("q[seats_count][]", String::new()),
            ("q[market][]", String::new()),
            ("q[crashed]", "1".to_string()),
            ("q[painted]", "1".to_string()),
            ("q[for_spare_parts]", "0".to_string()),
            ("q[availability_status]", String::new()),
        ];

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &params {
            serializer.append_pair(key, value);
        }
        let url = format!("{BASE_URL}/autos?{}", serializer.finish());

        Self { params, url }
    }
}

/// Accept either a bare listing id or a full detail-page URL.
pub fn detail_url(listing: &str) -> String {
    if listing.starts_with("http") {
        listing.to_string()
    } else {
        format!("{BASE_URL}/autos/{listing}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(key_value: &str) -> String {
        // q[make][]=48 -> q%5Bmake%5D%5B%5D=48, the form the URL actually carries
        key_value.replace('[', "%5B").replace(']', "%5D")
    }

    #[test]
    fn build_is_deterministic() {
        let criteria = FilterCriteria {
            make: Some("toyota".into()),
            price_min: Some(20_000),
            price_max: Some(40_000),
            ..Default::default()
        };
        let a = SearchQuery::build(&criteria, Some("48"), None);
        let b = SearchQuery::build(&criteria, Some("48"), None);
        assert_eq!(a.url, b.url);
    }

    #[test]
    fn build_overlays_resolved_ids_and_ranges() {
        let criteria = FilterCriteria {
            make: Some("toyota".into()),
            model: Some("camry".into()),
            price_min: Some(20_000),
            price_max: Some(40_000),
            limit: 10,
            ..Default::default()
        };
        let query = SearchQuery::build(&criteria, Some("48"), Some("193"));
        assert!(query.url.contains(&encoded("q[make][]=48")));
        assert!(query.url.contains(&encoded("q[model][]=193")));
        assert!(query.url.contains(&encoded("q[price_from]=20000")));
        assert!(query.url.contains(&encoded("q[price_to]=40000")));
    }

    #[test]
    fn build_without_model_leaves_model_slots_empty() {
        let query = SearchQuery::build(&FilterCriteria::default(), Some("48"), None);
        let model_values: Vec<&str> = query
            .params
            .iter()
            .filter(|(k, _)| *k == "q[model][]")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(model_values, vec!["", ""]);
    }

    #[test]
    fn fuel_and_transmission_names_map_to_site_ids() {
        let criteria = FilterCriteria {
            fuel_type: Some("Dizel".into()),
            transmission: Some("AVTOMAT".into()),
            ..Default::default()
        };
        let query = SearchQuery::build(&criteria, None, None);
        assert!(query.url.contains(&encoded("q[fuel_type][]=2")));
        assert!(query.url.contains(&encoded("q[transmission][]=2")));
    }

    #[test]
    fn unknown_fuel_name_applies_no_filter() {
        let criteria = FilterCriteria {
            fuel_type: Some("steam".into()),
            ..Default::default()
        };
        let query = SearchQuery::build(&criteria, None, None);
        assert!(query.url.contains(&encoded("q[fuel_type][]=")));
        assert!(!query.url.contains(&encoded("q[fuel_type][]=1")));
    }

    #[test]
    fn plug_in_hybrid_maps_to_its_own_id() {
        assert_eq!(
            FuelType::from_name("Plug-in Hibrid").map(FuelType::site_id),
            Some(8)
        );
    }

    #[test]
    fn detail_url_accepts_bare_id_or_full_url() {
        assert_eq!(detail_url("1234567"), "https://turbo.az/autos/1234567");
        assert_eq!(
            detail_url("https://turbo.az/autos/1234567-bmw-x5"),
            "https://turbo.az/autos/1234567-bmw-x5"
        );
    }
}
