//! Human-readable address derived from a coordinate

use serde::{Deserialize, Serialize};

/// Address parts picked from a reverse-geocoding response
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddressInfo {
    pub area: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub full_text: Option<String>,
}

impl AddressInfo {
    /// Build an address from its parts, deriving `full_text` from the present ones
    #[must_use]
    pub fn from_parts(
        area: Option<String>,
        city: Option<String>,
        state: Option<String>,
        postal_code: Option<String>,
    ) -> Self {
        let joined = [&area, &city, &state, &postal_code]
            .into_iter()
            .flatten()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            area,
            city,
            state,
            postal_code,
            full_text: (!joined.is_empty()).then_some(joined),
        }
    }

    /// Placeholder address carrying only a display string
    #[must_use]
    pub fn unavailable(text: &str) -> Self {
        Self {
            full_text: Some(text.to_string()),
            ..Self::default()
        }
    }

    /// Best short label for cache keys and weather snapshots
    #[must_use]
    pub fn locality(&self) -> Option<&str> {
        self.city
            .as_deref()
            .or(self.area.as_deref())
            .or(self.state.as_deref())
    }
}
