//! # Relations
//!
//! Relation model shared with the host, plus the two relation interfaces the
//! UDR consumes: the `database` requirer and the `nrf` interface.

use crate::error::{OperatorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Flat key/value data bag of one side of a relation
pub type RelationData = BTreeMap<String, String>;

pub const DATABASE_RELATION: &str = "database";
pub const NRF_RELATION: &str = "nrf";

/// A relation between this application and a remote application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub id: u32,
    pub name: String,
    pub remote_app: String,
    #[serde(default)]
    pub remote_units: Vec<String>,
    /// Application data published by the remote side
    #[serde(default)]
    pub remote_app_data: RelationData,
    /// Application data published by this side
    #[serde(default)]
    pub local_app_data: RelationData,
}

/// Host-owned view of this unit: identity, leadership and relations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitModel {
    pub app_name: String,
    pub model_name: String,
    #[serde(default)]
    pub leader: bool,
    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl UnitModel {
    pub fn new(app_name: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            model_name: model_name.into(),
            leader: false,
            relations: Vec::new(),
        }
    }

    /// First relation with the given name
    pub fn get_relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn relations_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Relation> + 'a {
        self.relations.iter().filter(move |r| r.name == name)
    }

    pub fn relation(&self, id: u32) -> Result<&Relation> {
        self.relations
            .iter()
            .find(|r| r.id == id)
            .ok_or(OperatorError::UnknownRelation(id))
    }

    pub fn relation_mut(&mut self, id: u32) -> Result<&mut Relation> {
        self.relations
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(OperatorError::UnknownRelation(id))
    }

    /// Create a relation and return its id
    pub fn add_relation(&mut self, name: &str, remote_app: &str) -> u32 {
        let id = self.relations.iter().map(|r| r.id + 1).max().unwrap_or(0);
        self.relations.push(Relation {
            id,
            name: name.to_string(),
            remote_app: remote_app.to_string(),
            remote_units: Vec::new(),
            remote_app_data: RelationData::new(),
            local_app_data: RelationData::new(),
        });
        id
    }

    pub fn add_relation_unit(&mut self, id: u32, unit: &str) -> Result<()> {
        let relation = self.relation_mut(id)?;
        if !relation.remote_units.iter().any(|u| u == unit) {
            relation.remote_units.push(unit.to_string());
        }
        Ok(())
    }

    /// Merge key/values into the remote application data bag.
    /// An empty value removes the key.
    pub fn update_remote_app_data<I, K, V>(&mut self, id: u32, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let relation = self.relation_mut(id)?;
        for (key, value) in values {
            let (key, value) = (key.into(), value.into());
            if value.is_empty() {
                relation.remote_app_data.remove(&key);
            } else {
                relation.remote_app_data.insert(key, value);
            }
        }
        Ok(())
    }

    pub fn remove_relation(&mut self, id: u32) -> Result<Relation> {
        let index = self
            .relations
            .iter()
            .position(|r| r.id == id)
            .ok_or(OperatorError::UnknownRelation(id))?;
        Ok(self.relations.remove(index))
    }
}

/// Readiness of a dependency relation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationState<T> {
    /// Relation not established
    Absent,
    /// Relation established, data not yet published
    Pending,
    Ready(T),
}

impl<T> RelationState<T> {
    pub fn is_established(&self) -> bool {
        !matches!(self, RelationState::Absent)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            RelationState::Ready(data) => Some(data),
            _ => None,
        }
    }
}

/// Connection data published by the database provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseData {
    /// Comma-separated connection strings, in provider order
    pub uris: String,
    pub username: String,
    pub password: String,
}

impl DatabaseData {
    /// First entry of the connection string list
    pub fn primary_uri(&self) -> &str {
        self.uris.split(',').next().unwrap_or_default().trim()
    }
}

/// Requirer side of the `database` interface
#[derive(Debug, Clone)]
pub struct DatabaseRequires {
    pub relation_name: String,
    pub database_name: String,
    pub extra_user_roles: String,
}

impl DatabaseRequires {
    pub fn new(relation_name: &str, database_name: &str, extra_user_roles: &str) -> Self {
        Self {
            relation_name: relation_name.to_string(),
            database_name: database_name.to_string(),
            extra_user_roles: extra_user_roles.to_string(),
        }
    }

    /// Publish the database request. Only the leader writes application data.
    pub fn on_relation_joined(&self, model: &mut UnitModel, relation_id: u32) -> Result<()> {
        if !model.leader {
            debug!("Not leader, skipping database request on relation {}", relation_id);
            return Ok(());
        }
        let Ok(relation) = model.relation_mut(relation_id) else {
            debug!("Relation {} is gone, skipping database request", relation_id);
            return Ok(());
        };
        relation
            .local_app_data
            .insert("database".to_string(), self.database_name.clone());
        relation
            .local_app_data
            .insert("extra-user-roles".to_string(), self.extra_user_roles.clone());
        info!(
            "Requested database {} on relation {}",
            self.database_name, relation_id
        );
        Ok(())
    }

    fn data_of(relation: &Relation) -> Option<DatabaseData> {
        let data = &relation.remote_app_data;
        let username = data.get("username")?;
        let password = data.get("password")?;
        let uris = data.get("uris").filter(|u| !u.trim().is_empty())?;
        Some(DatabaseData {
            uris: uris.clone(),
            username: username.clone(),
            password: password.clone(),
        })
    }

    /// Whether the given relation just carried a complete set of credentials
    pub fn resource_created_in(&self, relation: &Relation) -> bool {
        relation.name == self.relation_name && Self::data_of(relation).is_some()
    }

    /// Connection data of the first database relation, if published
    pub fn fetch_relation_data(&self, model: &UnitModel) -> Option<DatabaseData> {
        model.get_relation(&self.relation_name).and_then(Self::data_of)
    }

    pub fn state(&self, model: &UnitModel) -> RelationState<DatabaseData> {
        match model.get_relation(&self.relation_name) {
            None => RelationState::Absent,
            Some(relation) => match Self::data_of(relation) {
                Some(data) => RelationState::Ready(data),
                None => RelationState::Pending,
            },
        }
    }
}

/// Requirer side of the `nrf` interface
#[derive(Debug, Clone)]
pub struct NrfRequires {
    pub relation_name: String,
}

impl NrfRequires {
    pub fn new(relation_name: &str) -> Self {
        Self {
            relation_name: relation_name.to_string(),
        }
    }

    /// URL carried by a changed relation, if any
    pub fn url_from_changed(&self, relation: &Relation) -> Option<String> {
        if relation.name != self.relation_name {
            return None;
        }
        relation.remote_app_data.get("url").cloned()
    }

    /// URL published by the first NRF relation with non-empty remote data
    pub fn get_nrf_url(&self, model: &UnitModel) -> Option<String> {
        model
            .relations_named(&self.relation_name)
            .find(|r| !r.remote_app_data.is_empty())
            .and_then(|r| r.remote_app_data.get("url").cloned())
    }

    pub fn state(&self, model: &UnitModel) -> RelationState<String> {
        if model.get_relation(&self.relation_name).is_none() {
            return RelationState::Absent;
        }
        match self.get_nrf_url(model) {
            Some(url) if !url.is_empty() => RelationState::Ready(url),
            _ => RelationState::Pending,
        }
    }
}

/// Provider side of the `nrf` interface
#[derive(Debug, Clone)]
pub struct NrfProvides {
    pub relation_name: String,
}

impl NrfProvides {
    pub fn new(relation_name: &str) -> Self {
        Self {
            relation_name: relation_name.to_string(),
        }
    }

    /// Publish the NRF url on every relation of this interface
    pub fn set_info(&self, model: &mut UnitModel, url: &str) {
        for relation in model
            .relations
            .iter_mut()
            .filter(|r| r.name == self.relation_name)
        {
            relation
                .local_app_data
                .insert("url".to_string(), url.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn database() -> DatabaseRequires {
        DatabaseRequires::new(DATABASE_RELATION, "free5gc", "admin")
    }

    #[test]
    fn test_database_state_progression() {
        let mut model = UnitModel::new("udr", "whatever");
        assert_eq!(database().state(&model), RelationState::Absent);

        let id = model.add_relation(DATABASE_RELATION, "mongodb");
        assert_eq!(database().state(&model), RelationState::Pending);

        model
            .update_remote_app_data(id, [("username", "banana"), ("password", "pizza")])
            .unwrap();
        assert_eq!(database().state(&model), RelationState::Pending);

        model
            .update_remote_app_data(id, [("uris", "http://2.2.2.2,http://3.3.3.3")])
            .unwrap();
        let data = database().fetch_relation_data(&model).unwrap();
        assert_eq!(data.primary_uri(), "http://2.2.2.2");
        assert!(matches!(database().state(&model), RelationState::Ready(_)));
    }

    #[test]
    fn test_database_request_written_only_by_leader() {
        let mut model = UnitModel::new("udr", "whatever");
        let id = model.add_relation(DATABASE_RELATION, "mongodb");

        database().on_relation_joined(&mut model, id).unwrap();
        assert!(model.relation(id).unwrap().local_app_data.is_empty());

        model.leader = true;
        database().on_relation_joined(&mut model, id).unwrap();
        let local = &model.relation(id).unwrap().local_app_data;
        assert_eq!(local.get("database"), Some(&"free5gc".to_string()));
        assert_eq!(local.get("extra-user-roles"), Some(&"admin".to_string()));
    }

    #[test]
    fn test_database_request_on_removed_relation_is_noop() {
        let mut model = UnitModel::new("udr", "whatever");
        model.leader = true;
        let id = model.add_relation(DATABASE_RELATION, "mongodb");
        model.remove_relation(id).unwrap();

        database().on_relation_joined(&mut model, id).unwrap();
        assert!(model.relations.is_empty());
    }

    #[test]
    fn test_nrf_url_from_first_populated_relation() {
        let mut model = UnitModel::new("udr", "whatever");
        let nrf = NrfRequires::new(NRF_RELATION);
        let first = model.add_relation(NRF_RELATION, "nrf-a");
        let second = model.add_relation(NRF_RELATION, "nrf-b");
        assert_eq!(nrf.state(&model), RelationState::Pending);

        model
            .update_remote_app_data(second, [("url", "http://2.2.2.2")])
            .unwrap();
        assert_eq!(nrf.get_nrf_url(&model), Some("http://2.2.2.2".to_string()));

        model
            .update_remote_app_data(first, [("url", "http://1.1.1.1")])
            .unwrap();
        assert_eq!(nrf.state(&model), RelationState::Ready("http://1.1.1.1".to_string()));
    }

    #[test]
    fn test_nrf_provides_sets_url_on_all_relations() {
        let mut model = UnitModel::new("nrf", "whatever");
        model.add_relation(NRF_RELATION, "udr");
        model.add_relation(NRF_RELATION, "amf");
        model.add_relation(DATABASE_RELATION, "mongodb");

        NrfProvides::new(NRF_RELATION).set_info(&mut model, "http://nrf:29510");

        for relation in model.relations_named(NRF_RELATION) {
            assert_eq!(relation.local_app_data.get("url"), Some(&"http://nrf:29510".to_string()));
        }
        assert!(model.get_relation(DATABASE_RELATION).unwrap().local_app_data.is_empty());
    }

    #[test]
    fn test_unknown_relation_id() {
        let mut model = UnitModel::new("udr", "whatever");
        let err = model.update_remote_app_data(7, [("url", "x")]).unwrap_err();
        assert!(matches!(err, OperatorError::UnknownRelation(7)));
    }
}
