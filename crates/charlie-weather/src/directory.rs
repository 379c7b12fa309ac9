//! Municipality directory used for city lookup and autocomplete.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::client::ProviderClient;
use crate::types::{Municipality, WeatherError};
use crate::units::normalize_city;

#[derive(Debug, Deserialize)]
struct RegistryRecord {
    id: u64,
    nome: String,
    microrregiao: Microrregiao,
}

#[derive(Debug, Deserialize)]
struct Microrregiao {
    mesorregiao: Mesorregiao,
}

#[derive(Debug, Deserialize)]
struct Mesorregiao {
    #[serde(rename = "UF")]
    uf: FederativeUnit,
}

#[derive(Debug, Deserialize)]
struct FederativeUnit {
    nome: String,
}

/// Both projections of the municipality registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    /// Lowercase city names, in registry order
    pub names: Vec<String>,
    pub municipalities: Vec<Municipality>,
}

impl Directory {
    fn from_records(records: Vec<RegistryRecord>) -> Self {
        let names = records.iter().map(|r| r.nome.to_lowercase()).collect();
        let municipalities = records
            .into_iter()
            .map(|r| Municipality {
                id: r.id,
                city: r.nome,
                state: r.microrregiao.mesorregiao.uf.nome,
            })
            .collect();

        Self {
            names,
            municipalities,
        }
    }

    pub fn len(&self) -> usize {
        self.municipalities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.municipalities.is_empty()
    }

    /// Exact lookup ignoring case and accents.
    pub fn find(&self, city: &str) -> Option<&Municipality> {
        let wanted = search_key(city);
        self.municipalities
            .iter()
            .find(|m| search_key(&m.city) == wanted)
    }

    /// Autocomplete candidates for `query`, ignoring case and accents.
    ///
    /// Prefix matches come first, then other substring matches, each group in
    /// registry order.
    pub fn suggest(&self, query: &str, limit: usize) -> Vec<&Municipality> {
        let wanted = search_key(query);
        if wanted.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut prefix = Vec::new();
        let mut inner = Vec::new();
        for municipality in &self.municipalities {
            let key = search_key(&municipality.city);
            if key.starts_with(&wanted) {
                prefix.push(municipality);
            } else if key.contains(&wanted) {
                inner.push(municipality);
            }
        }

        prefix.into_iter().chain(inner).take(limit).collect()
    }
}

fn search_key(name: &str) -> String {
    normalize_city(name).to_lowercase()
}

impl ProviderClient {
    /// Fetch the full municipality registry in one request.
    #[instrument(skip(self), level = "info")]
    pub async fn load_directory(&self) -> Result<Directory, WeatherError> {
        let response = self.get(self.directory_url(), &[] as &[(&str, &str)]).await?;
        let records: Vec<RegistryRecord> = Self::handle_response(response).await?;
        let directory = Directory::from_records(records);

        tracing::info!("Loaded {} municipalities", directory.len());
        Ok(directory)
    }
}
